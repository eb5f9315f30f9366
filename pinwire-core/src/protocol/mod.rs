//! I2C protocol engine
//!
//! Frames transactions out of line primitives:
//!
//! ```text
//! write:  S | addr+W A | reg A | d0 A | d1 A | ... | P
//! read:   S | addr+W A | reg A | Sr | addr+R A | d0 A | ... | dn N | P
//! probe:  S | addr+W A/N | P
//! ```
//!
//! Data changes only while SCL is low and is sampled while SCL is high.
//! Every release of SCL waits for the line to actually rise, so a device
//! may stretch the clock on any bit.

mod engine;
mod phase;

pub use engine::Engine;
pub use phase::Phase;

use pinwire_hal::Level;

/// Acknowledge bit (9th clock)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// Receiver pulled SDA low
    Ack,
    /// SDA stayed high
    Nack,
}

impl Ack {
    pub fn is_ack(self) -> bool {
        self == Ack::Ack
    }

    pub fn is_nack(self) -> bool {
        self == Ack::Nack
    }

    /// SDA level that encodes this bit (released for NACK)
    pub fn level(self) -> Level {
        match self {
            Ack::Ack => Level::Low,
            Ack::Nack => Level::High,
        }
    }
}

impl From<Level> for Ack {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => Ack::Ack,
            Level::High => Ack::Nack,
        }
    }
}
