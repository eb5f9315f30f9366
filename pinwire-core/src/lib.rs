//! Bit-banged I2C master protocol engine
//!
//! This crate contains everything between "a pin can be pulled low or
//! released" and "read three bytes from register 0x10 of device 0x1C":
//!
//! - Line controller (open-drain SCL/SDA pair)
//! - Timing engine (phase sleeps, clock-stretch wait)
//! - Protocol engine (START, address, register, data, repeated START, STOP)
//! - Bus scanner
//! - Recovery (nine-pulse bus reset)
//! - Statistics and configuration registry
//!
//! The single entry point is [`Driver`], which owns the process-wide bus
//! state. [`SharedDriver`] adds a whole-transaction lock for hosts that
//! expose the bus to several callers.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod logging;

pub mod config;
pub mod driver;
pub mod eh;
pub mod error;
pub mod line;
pub mod protocol;
pub mod recovery;
pub mod scan;
pub mod shared;
pub mod stats;
pub mod timing;

pub use config::{BusConfiguration, DriverConfig};
pub use driver::Driver;
pub use error::BusError;
pub use line::{Line, LinePair};
pub use protocol::{Ack, Phase};
pub use recovery::{BusCondition, RECOVERY_PULSES};
pub use scan::{PresenceMap, SCAN_ADDRESSES};
pub use shared::SharedDriver;
pub use stats::{Counter, Statistics};
pub use timing::{TimingParameters, WaitOutcome};

pub use pinwire_hal::{Direction, Level, OpenDrainLine, PinError, PinId, PinResolver, SpeedGrade};
