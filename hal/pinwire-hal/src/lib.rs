//! Pinwire Hardware Abstraction Layer
//!
//! This crate defines the small set of hardware capabilities the Pinwire
//! protocol engine consumes. A platform crate (or the host simulator)
//! implements them; the engine never touches registers directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Binding layer / application            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pinwire-core (protocol engine)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pinwire-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ embedded-hal  │       │  pinwire-sim  │
//! │  GPIO pins    │       │  (host tests) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OpenDrainLine`] - Drive low, release, sample
//! - [`pins::PinResolver`] - Turn a pin number into a line
//!
//! Delays use [`embedded_hal::delay::DelayNs`] directly.

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod i2c;
pub mod pins;

// Re-export key items at crate root for convenience
pub use gpio::{EhLine, Level, OpenDrainLine};
pub use i2c::{address_byte, Direction, SpeedGrade, SpeedGradeError, MAX_ADDRESS};
pub use pins::{PinAllocator, PinError, PinId, PinResolver};
