//! Timing engine
//!
//! Converts a speed grade into the sleep values used for every clock phase
//! and condition margin, and provides the blocking waits the protocol engine
//! is built on.
//!
//! # Phase calculation
//!
//! ```text
//!   half period  = 1 / (2 * f)
//!   phase sleep  = ceil(half period - transition overhead)   [µs, >= 1]
//!   achieved f   = 1 / (low + high + 2 * overhead)
//! ```
//!
//! Sleeps are whole microseconds, so the achieved frequency is at or below
//! the nominal one and never above it.

use embedded_hal::delay::DelayNs;
use pinwire_hal::{OpenDrainLine, SpeedGrade};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NS_PER_US: u32 = 1_000;
const NS_PER_S: u64 = 1_000_000_000;

/// UM10204 minimum condition timings for one speed grade (ns)
struct Margins {
    start_hold_ns: u32,
    repeated_start_setup_ns: u32,
    stop_setup_ns: u32,
    bus_free_ns: u32,
}

const STANDARD_MARGINS: Margins = Margins {
    start_hold_ns: 4_000,
    repeated_start_setup_ns: 4_700,
    stop_setup_ns: 4_000,
    bus_free_ns: 4_700,
};

const FULL_MARGINS: Margins = Margins {
    start_hold_ns: 600,
    repeated_start_setup_ns: 600,
    stop_setup_ns: 600,
    bus_free_ns: 1_300,
};

/// Round nanoseconds up to whole microseconds, never below 1
const fn ceil_us(ns: u32) -> u32 {
    let us = ns.div_ceil(NS_PER_US);
    if us == 0 {
        1
    } else {
        us
    }
}

/// Timing constants derived from a speed grade
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingParameters {
    /// Speed grade these values were computed for
    pub speed: SpeedGrade,
    /// SCL low-phase sleep (µs)
    pub low_sleep_us: u32,
    /// SCL high-phase sleep (µs)
    pub high_sleep_us: u32,
    /// Hold time after a START before SCL is pulled low (µs)
    pub start_hold_us: u32,
    /// Setup time before a repeated START (µs)
    pub repeated_start_setup_us: u32,
    /// Setup time before a STOP (µs)
    pub stop_setup_us: u32,
    /// Bus free time between STOP and the next START (µs)
    pub bus_free_us: u32,
    /// Resulting clock frequency after quantization (Hz, diagnostic)
    pub achieved_frequency_hz: f32,
}

impl TimingParameters {
    /// Compute the timing set for a speed grade
    ///
    /// # Arguments
    /// - `speed`: Target speed grade
    /// - `overhead_ns`: Estimated cost of one line transition, taken off
    ///   each clock phase
    pub fn compute(speed: SpeedGrade, overhead_ns: u32) -> Self {
        let half_period_ns = (NS_PER_S / (2 * speed.frequency_hz() as u64)) as u32;
        let phase_us = ceil_us(half_period_ns.saturating_sub(overhead_ns));

        let period_ns =
            2 * phase_us as u64 * NS_PER_US as u64 + 2 * overhead_ns as u64;
        let achieved_frequency_hz = NS_PER_S as f32 / period_ns as f32;

        let margins = match speed {
            SpeedGrade::Standard => &STANDARD_MARGINS,
            SpeedGrade::Full => &FULL_MARGINS,
        };

        Self {
            speed,
            low_sleep_us: phase_us,
            high_sleep_us: phase_us,
            start_hold_us: ceil_us(margins.start_hold_ns),
            repeated_start_setup_us: ceil_us(margins.repeated_start_setup_ns),
            stop_setup_us: ceil_us(margins.stop_setup_ns),
            bus_free_us: ceil_us(margins.bus_free_ns),
            achieved_frequency_hz,
        }
    }

    /// Full clock period spent sleeping (µs)
    pub fn period_sleep_us(&self) -> u32 {
        self.low_sleep_us + self.high_sleep_us
    }
}

/// Result of waiting for a released line to rise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitOutcome {
    /// Line is high; `waited_us > 0` means a device was stretching the clock
    Ready { waited_us: u32 },
    /// Line still low when the timeout elapsed
    TimedOut,
}

impl WaitOutcome {
    /// The line was held low for some time before rising (or never rose)
    pub fn was_stretched(self) -> bool {
        match self {
            WaitOutcome::Ready { waited_us } => waited_us > 0,
            WaitOutcome::TimedOut => true,
        }
    }
}

/// Blocking waits for one bus, bound to its timing parameters
pub struct Clock<'a, D> {
    delay: &'a mut D,
    params: TimingParameters,
    stretch_timeout_us: u32,
}

impl<'a, D: DelayNs> Clock<'a, D> {
    pub fn new(delay: &'a mut D, params: TimingParameters, stretch_timeout_us: u32) -> Self {
        Self {
            delay,
            params,
            stretch_timeout_us,
        }
    }

    pub fn params(&self) -> &TimingParameters {
        &self.params
    }

    pub fn stretch_timeout_us(&self) -> u32 {
        self.stretch_timeout_us
    }

    /// Block for at least `us` microseconds
    pub fn sleep_micros(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    /// SCL low period
    pub fn low_phase(&mut self) {
        self.sleep_micros(self.params.low_sleep_us);
    }

    /// SCL high period
    pub fn high_phase(&mut self) {
        self.sleep_micros(self.params.high_sleep_us);
    }

    /// Poll `line` until it reads high or `timeout_us` has elapsed
    ///
    /// Polls at the high-phase interval, so the achieved timeout may exceed
    /// the requested one by up to one interval.
    pub fn wait_for_high<L: OpenDrainLine>(&mut self, line: &mut L, timeout_us: u32) -> WaitOutcome {
        let step = self.params.high_sleep_us.max(1);
        let mut waited_us = 0u32;
        loop {
            if line.is_high() {
                return WaitOutcome::Ready { waited_us };
            }
            if waited_us >= timeout_us {
                return WaitOutcome::TimedOut;
            }
            self.sleep_micros(step);
            waited_us = waited_us.saturating_add(step);
        }
    }
}
