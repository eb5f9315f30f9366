//! I2C bus-level definitions
//!
//! Speed grades, transfer direction and 7-bit address framing shared by the
//! protocol engine and anything that talks to it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest 7-bit device address
pub const MAX_ADDRESS: u8 = 0x7F;

/// Bus speed grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpeedGrade {
    /// Standard mode (100 kHz)
    #[default]
    Standard,
    /// Fast mode (400 kHz)
    Full,
}

impl SpeedGrade {
    /// Nominal clock frequency in Hz
    pub const fn frequency_hz(self) -> u32 {
        match self {
            SpeedGrade::Standard => 100_000,
            SpeedGrade::Full => 400_000,
        }
    }
}

/// Frequency that does not match any supported speed grade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedGradeError(pub u32);

impl TryFrom<u32> for SpeedGrade {
    type Error = SpeedGradeError;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            100_000 => Ok(SpeedGrade::Standard),
            400_000 => Ok(SpeedGrade::Full),
            other => Err(SpeedGradeError(other)),
        }
    }
}

/// Transfer direction encoded in the R/W bit of the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Controller transmits (R/W = 0)
    Write,
    /// Controller receives (R/W = 1)
    Read,
}

impl Direction {
    /// Value of the R/W bit
    pub const fn bit(self) -> u8 {
        match self {
            Direction::Write => 0,
            Direction::Read => 1,
        }
    }
}

/// Build the first byte of a frame: 7-bit address followed by the R/W bit
///
/// The address must already be validated against [`MAX_ADDRESS`]; the top bit
/// is discarded.
pub const fn address_byte(address: u8, direction: Direction) -> u8 {
    ((address & MAX_ADDRESS) << 1) | direction.bit()
}
