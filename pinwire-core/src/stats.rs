//! Lifetime bus statistics
//!
//! Counters only go up. They are bumped by the protocol engine and the
//! recovery routine in the same call that performs the bus activity, and
//! cleared only by a full driver state reset.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies one statistics counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Counter {
    StartConditions,
    RepeatedStartConditions,
    StopConditions,
    BytesWritten,
    BytesRead,
    AddressNacks,
    RegisterNacks,
    TransferNacks,
    RepeatedStartNacks,
    BusResets,
    UnknownBusErrors,
    BusLockups,
    FailedStarts,
    FailedStops,
    DeviceHung,
    ClockStretchTimeouts,
    ClockStretches,
}

impl Counter {
    /// Every counter, in report order
    pub const ALL: [Counter; 17] = [
        Counter::StartConditions,
        Counter::RepeatedStartConditions,
        Counter::StopConditions,
        Counter::BytesWritten,
        Counter::BytesRead,
        Counter::AddressNacks,
        Counter::RegisterNacks,
        Counter::TransferNacks,
        Counter::RepeatedStartNacks,
        Counter::BusResets,
        Counter::UnknownBusErrors,
        Counter::BusLockups,
        Counter::FailedStarts,
        Counter::FailedStops,
        Counter::DeviceHung,
        Counter::ClockStretchTimeouts,
        Counter::ClockStretches,
    ];

    /// Short snake_case name for reports
    pub const fn name(self) -> &'static str {
        match self {
            Counter::StartConditions => "start_conditions",
            Counter::RepeatedStartConditions => "repeated_start_conditions",
            Counter::StopConditions => "stop_conditions",
            Counter::BytesWritten => "bytes_written",
            Counter::BytesRead => "bytes_read",
            Counter::AddressNacks => "address_nacks",
            Counter::RegisterNacks => "register_nacks",
            Counter::TransferNacks => "transfer_nacks",
            Counter::RepeatedStartNacks => "repeated_start_nacks",
            Counter::BusResets => "bus_resets",
            Counter::UnknownBusErrors => "unknown_bus_errors",
            Counter::BusLockups => "bus_lockups",
            Counter::FailedStarts => "failed_starts",
            Counter::FailedStops => "failed_stops",
            Counter::DeviceHung => "device_hung",
            Counter::ClockStretchTimeouts => "clock_stretch_timeouts",
            Counter::ClockStretches => "clock_stretches",
        }
    }
}

/// Snapshot of all bus counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Statistics {
    /// START conditions issued
    pub start_conditions: u32,
    /// Repeated START conditions issued
    pub repeated_start_conditions: u32,
    /// STOP conditions issued
    pub stop_conditions: u32,
    /// Data bytes acknowledged by a device
    pub bytes_written: u32,
    /// Data bytes clocked in from a device
    pub bytes_read: u32,
    /// Address not acknowledged
    pub address_nacks: u32,
    /// Register address not acknowledged
    pub register_nacks: u32,
    /// Data byte not acknowledged
    pub transfer_nacks: u32,
    /// Address not acknowledged after repeated START
    pub repeated_start_nacks: u32,
    /// Nine-pulse resets performed
    pub bus_resets: u32,
    /// Resets that did not free SDA
    pub unknown_bus_errors: u32,
    /// Lockups detected before a START
    pub bus_lockups: u32,
    /// START conditions that did not take
    pub failed_starts: u32,
    /// STOP conditions that left the bus busy
    pub failed_stops: u32,
    /// Device holding SDA low outside a transfer
    pub device_hung: u32,
    /// Clock stretches that exceeded the timeout
    pub clock_stretch_timeouts: u32,
    /// Clock stretches observed (including timeouts)
    pub clock_stretches: u32,
}

impl Statistics {
    /// All counters at zero
    pub const fn new() -> Self {
        Self {
            start_conditions: 0,
            repeated_start_conditions: 0,
            stop_conditions: 0,
            bytes_written: 0,
            bytes_read: 0,
            address_nacks: 0,
            register_nacks: 0,
            transfer_nacks: 0,
            repeated_start_nacks: 0,
            bus_resets: 0,
            unknown_bus_errors: 0,
            bus_lockups: 0,
            failed_starts: 0,
            failed_stops: 0,
            device_hung: 0,
            clock_stretch_timeouts: 0,
            clock_stretches: 0,
        }
    }

    /// Read one counter
    pub fn get(&self, counter: Counter) -> u32 {
        match counter {
            Counter::StartConditions => self.start_conditions,
            Counter::RepeatedStartConditions => self.repeated_start_conditions,
            Counter::StopConditions => self.stop_conditions,
            Counter::BytesWritten => self.bytes_written,
            Counter::BytesRead => self.bytes_read,
            Counter::AddressNacks => self.address_nacks,
            Counter::RegisterNacks => self.register_nacks,
            Counter::TransferNacks => self.transfer_nacks,
            Counter::RepeatedStartNacks => self.repeated_start_nacks,
            Counter::BusResets => self.bus_resets,
            Counter::UnknownBusErrors => self.unknown_bus_errors,
            Counter::BusLockups => self.bus_lockups,
            Counter::FailedStarts => self.failed_starts,
            Counter::FailedStops => self.failed_stops,
            Counter::DeviceHung => self.device_hung,
            Counter::ClockStretchTimeouts => self.clock_stretch_timeouts,
            Counter::ClockStretches => self.clock_stretches,
        }
    }

    /// Increment one counter (saturating)
    pub(crate) fn bump(&mut self, counter: Counter) {
        let slot = self.slot_mut(counter);
        *slot = slot.saturating_add(1);
    }

    fn slot_mut(&mut self, counter: Counter) -> &mut u32 {
        match counter {
            Counter::StartConditions => &mut self.start_conditions,
            Counter::RepeatedStartConditions => &mut self.repeated_start_conditions,
            Counter::StopConditions => &mut self.stop_conditions,
            Counter::BytesWritten => &mut self.bytes_written,
            Counter::BytesRead => &mut self.bytes_read,
            Counter::AddressNacks => &mut self.address_nacks,
            Counter::RegisterNacks => &mut self.register_nacks,
            Counter::TransferNacks => &mut self.transfer_nacks,
            Counter::RepeatedStartNacks => &mut self.repeated_start_nacks,
            Counter::BusResets => &mut self.bus_resets,
            Counter::UnknownBusErrors => &mut self.unknown_bus_errors,
            Counter::BusLockups => &mut self.bus_lockups,
            Counter::FailedStarts => &mut self.failed_starts,
            Counter::FailedStops => &mut self.failed_stops,
            Counter::DeviceHung => &mut self.device_hung,
            Counter::ClockStretchTimeouts => &mut self.clock_stretch_timeouts,
            Counter::ClockStretches => &mut self.clock_stretches,
        }
    }

    /// Sum of the four NACK counters
    pub fn total_nacks(&self) -> u32 {
        self.address_nacks
            .saturating_add(self.register_nacks)
            .saturating_add(self.transfer_nacks)
            .saturating_add(self.repeated_start_nacks)
    }

    /// Counters that increased between `earlier` and `self`
    pub fn delta(&self, earlier: &Statistics) -> Statistics {
        let mut out = Statistics::new();
        for counter in Counter::ALL {
            *out.slot_mut(counter) = self.get(counter).saturating_sub(earlier.get(counter));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_each_counter() {
        let mut stats = Statistics::new();
        for (i, counter) in Counter::ALL.iter().enumerate() {
            for _ in 0..=i {
                stats.bump(*counter);
            }
        }
        for (i, counter) in Counter::ALL.iter().enumerate() {
            assert_eq!(stats.get(*counter), i as u32 + 1, "{}", counter.name());
        }
    }

    #[test]
    fn test_saturates() {
        let mut stats = Statistics {
            bus_resets: u32::MAX,
            ..Statistics::new()
        };
        stats.bump(Counter::BusResets);
        assert_eq!(stats.bus_resets, u32::MAX);
    }

    #[test]
    fn test_total_nacks() {
        let mut stats = Statistics::new();
        stats.bump(Counter::AddressNacks);
        stats.bump(Counter::RegisterNacks);
        stats.bump(Counter::RepeatedStartNacks);
        assert_eq!(stats.total_nacks(), 3);
    }

    #[test]
    fn test_delta() {
        let mut before = Statistics::new();
        before.bump(Counter::StartConditions);
        let mut after = before;
        after.bump(Counter::StartConditions);
        after.bump(Counter::StopConditions);

        let delta = after.delta(&before);
        assert_eq!(delta.start_conditions, 1);
        assert_eq!(delta.stop_conditions, 1);
        assert_eq!(delta.bytes_written, 0);
    }

    #[test]
    fn test_names_unique() {
        for (i, a) in Counter::ALL.iter().enumerate() {
            for b in &Counter::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }
}
