//! Host-side I2C bus simulator
//!
//! A bit-level model of an open-drain bus for exercising the driver
//! without hardware:
//!
//! ```text
//!   SimLine (SCL) ──┐                  ┌── SimDevice 0x1C
//!   SimLine (SDA) ──┼── SimBus ────────┼── SimDevice 0x68
//!   SimDelay ───────┘  (wired-AND,     └── faults: stuck SDA/SCL
//!                       virtual time)
//! ```
//!
//! Line levels are the wired-AND of everything pulling them down. Devices
//! see edges and START/STOP conditions the moment a line changes. Time only
//! moves when the driver sleeps through [`SimDelay`], so clock stretching
//! is deterministic.

mod bus;
mod delay;
mod device;
mod line;
mod resolver;

pub use bus::SimBus;
pub use delay::SimDelay;
pub use device::SimDevice;
pub use line::{SimLine, Wire};
pub use resolver::SimResolver;
