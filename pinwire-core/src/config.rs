//! Driver and bus configuration types

use pinwire_hal::{PinId, SpeedGrade};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default clock-stretch timeout (µs)
pub const DEFAULT_CLOCK_STRETCH_TIMEOUT_US: u32 = 500_000;

/// Default per-phase cost of a line transition (ns)
pub const DEFAULT_TRANSITION_OVERHEAD_NS: u32 = 250;

/// Pin assignment and speed grade chosen by `configure`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfiguration {
    /// Data line
    pub sda: PinId,
    /// Clock line
    pub scl: PinId,
    /// Bus speed
    pub speed: SpeedGrade,
}

/// Tunables that apply to every bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriverConfig {
    /// How long a device may hold SCL low before the transfer is abandoned
    pub clock_stretch_timeout_us: u32,
    /// Estimated time spent in one drive/sample call, subtracted from each
    /// clock phase. Tune per platform.
    pub transition_overhead_ns: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            clock_stretch_timeout_us: DEFAULT_CLOCK_STRETCH_TIMEOUT_US,
            transition_overhead_ns: DEFAULT_TRANSITION_OVERHEAD_NS,
        }
    }
}

impl DriverConfig {
    /// Override the clock-stretch timeout
    pub const fn with_clock_stretch_timeout_us(mut self, timeout_us: u32) -> Self {
        self.clock_stretch_timeout_us = timeout_us;
        self
    }

    /// Override the transition overhead estimate
    pub const fn with_transition_overhead_ns(mut self, overhead_ns: u32) -> Self {
        self.transition_overhead_ns = overhead_ns;
        self
    }
}
