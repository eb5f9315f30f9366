//! Pin resolution for config-driven line assignment
//!
//! The driver is configured with plain pin numbers. A platform supplies a
//! [`PinResolver`] that checks the board, claims the pins and hands back
//! open-drain lines for them.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::gpio::OpenDrainLine;

/// GPIO pin number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinId(pub u8);

impl PinId {
    /// Raw pin number
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl From<u8> for PinId {
    fn from(n: u8) -> Self {
        PinId(n)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Error when resolving a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number out of range for this platform
    InvalidPin,
    /// Pin already claimed
    AlreadyTaken,
    /// Pin reserved for a special function
    Reserved,
    /// Board revision unknown, so the pin map cannot be determined
    UnknownPlatform,
    /// GPIO block could not be accessed (permissions, mapping failure)
    Unavailable,
}

/// Source of open-drain lines for pin numbers
///
/// # Example
///
/// ```ignore
/// let revision = resolver.revision()?;
/// let sda = resolver.resolve(PinId(2))?;
/// let scl = resolver.resolve(PinId(3))?;
/// ```
pub trait PinResolver {
    /// Line type produced for a resolved pin
    type Line: OpenDrainLine;

    /// Board revision; fails if the pin map for this host is unknown
    fn revision(&mut self) -> Result<u32, PinError>;

    /// Claim a pin and configure it as an open-drain line
    fn resolve(&mut self, pin: PinId) -> Result<Self::Line, PinError>;

    /// Give a previously resolved pin back
    fn free(&mut self, pin: PinId, line: Self::Line) {
        let _ = (pin, line);
    }
}

/// Tracks which pins have been claimed (up to 64 pins)
#[derive(Debug, Clone, Default)]
pub struct PinAllocator {
    /// Bitmask of allocated pins
    allocated: u64,
}

impl PinAllocator {
    /// Number of pins this allocator can track
    pub const CAPACITY: u8 = 64;

    /// Create an allocator with every pin free
    pub const fn new() -> Self {
        Self { allocated: 0 }
    }

    /// Claim a pin
    pub fn allocate(&mut self, pin: PinId) -> Result<(), PinError> {
        if pin.0 >= Self::CAPACITY {
            return Err(PinError::InvalidPin);
        }
        let mask = 1u64 << pin.0;
        if self.allocated & mask != 0 {
            return Err(PinError::AlreadyTaken);
        }
        self.allocated |= mask;
        Ok(())
    }

    /// Release a pin
    pub fn release(&mut self, pin: PinId) {
        if pin.0 < Self::CAPACITY {
            self.allocated &= !(1u64 << pin.0);
        }
    }

    /// Check if a pin is claimed
    pub fn is_allocated(&self, pin: PinId) -> bool {
        if pin.0 >= Self::CAPACITY {
            return false;
        }
        self.allocated & (1u64 << pin.0) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let mut pins = PinAllocator::new();
        assert!(pins.allocate(PinId(2)).is_ok());
        assert!(pins.is_allocated(PinId(2)));
        assert_eq!(pins.allocate(PinId(2)), Err(PinError::AlreadyTaken));

        pins.release(PinId(2));
        assert!(!pins.is_allocated(PinId(2)));
        assert!(pins.allocate(PinId(2)).is_ok());
    }

    #[test]
    fn test_out_of_range() {
        let mut pins = PinAllocator::new();
        assert_eq!(pins.allocate(PinId(64)), Err(PinError::InvalidPin));
        assert!(!pins.is_allocated(PinId(200)));
        // Releasing an invalid pin is a no-op
        pins.release(PinId(200));
    }

    #[test]
    fn test_pin_number() {
        assert_eq!(PinId::from(4).number(), 4);
        assert!(PinId(2) < PinId(3));
    }
}
