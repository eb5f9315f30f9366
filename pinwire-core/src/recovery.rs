//! Bus fault detection and the nine-pulse reset
//!
//! A device that lost track of a transfer (controller reset mid-byte, noise
//! on SCL) can sit on SDA waiting for clocks that never come. Clocking SCL
//! nine times lets it finish whatever byte it thinks it is in, after which a
//! STOP returns every device to idle.

use embedded_hal::delay::DelayNs;
use pinwire_hal::{Level, OpenDrainLine};

use crate::error::BusError;
use crate::line::{Line, LinePair};
use crate::protocol::Engine;
use crate::stats::Counter;
use crate::timing::WaitOutcome;

/// Clock pulses issued by every reset
pub const RECOVERY_PULSES: u8 = 9;

/// Line levels as seen from the controller with both lines released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusCondition {
    /// Both lines high
    Idle,
    /// SDA low, SCL high: a device is stuck mid-transfer
    DataHeld,
    /// SCL low, SDA high: a device is stretching (or hung on) the clock
    ClockHeld,
    /// Both lines low
    BothHeld,
}

impl BusCondition {
    /// Sample both lines
    pub fn diagnose<L: OpenDrainLine>(lines: &mut LinePair<L>) -> Self {
        let sda = lines.sample(Line::Data);
        let scl = lines.sample(Line::Clock);
        match (sda, scl) {
            (Level::High, Level::High) => BusCondition::Idle,
            (Level::Low, Level::High) => BusCondition::DataHeld,
            (Level::High, Level::Low) => BusCondition::ClockHeld,
            (Level::Low, Level::Low) => BusCondition::BothHeld,
        }
    }

    pub fn is_idle(self) -> bool {
        self == BusCondition::Idle
    }
}

impl<'a, L, D> Engine<'a, L, D>
where
    L: OpenDrainLine,
    D: DelayNs,
{
    /// Nine clock pulses with SDA released, then a STOP
    ///
    /// Always issues exactly [`RECOVERY_PULSES`] pulses. Fails with
    /// `BusLockup` if SDA is still low afterwards.
    pub fn force_reset(&mut self) -> Result<(), BusError> {
        self.stats.bump(Counter::BusResets);
        let timeout_us = self.clock.stretch_timeout_us();
        let setup_us = self.clock.params().stop_setup_us;
        let bus_free_us = self.clock.params().bus_free_us;

        // A fault mid-byte can leave SCL driven low by us
        self.lines.release_all();

        // Let a device that is stretching the clock finish first
        if self
            .clock
            .wait_for_high(self.lines.line_mut(Line::Clock), timeout_us)
            == WaitOutcome::TimedOut
        {
            log_warn!("SCL still low before reset pulses");
        }

        for _ in 0..RECOVERY_PULSES {
            self.lines.drive_low(Line::Clock);
            self.clock.low_phase();
            self.lines.release(Line::Clock);
            self.clock.high_phase();
        }

        // STOP
        self.lines.drive_low(Line::Clock);
        self.lines.drive_low(Line::Data);
        self.clock.low_phase();
        self.lines.release(Line::Clock);
        if self
            .clock
            .wait_for_high(self.lines.line_mut(Line::Clock), timeout_us)
            == WaitOutcome::TimedOut
        {
            log_warn!("SCL still low during reset STOP");
        }
        self.clock.sleep_micros(setup_us);
        self.lines.release(Line::Data);
        self.clock.sleep_micros(bus_free_us);

        if self.lines.sample(Line::Data).is_low() {
            self.stats.bump(Counter::UnknownBusErrors);
            log_error!("SDA still held low after bus reset");
            return Err(BusError::BusLockup);
        }

        Ok(())
    }

    /// Verify the bus is free before a START
    ///
    /// SCL low is treated as a stretch and waited out. SDA low with SCL high
    /// means a device is stuck; if the last reset already failed to free it,
    /// the bus is reported as locked up.
    pub fn ensure_idle(&mut self) -> Result<(), BusError> {
        if self.lines.sample(Line::Clock).is_low() {
            let timeout_us = self.clock.stretch_timeout_us();
            match self
                .clock
                .wait_for_high(self.lines.line_mut(Line::Clock), timeout_us)
            {
                WaitOutcome::Ready { waited_us } => {
                    if waited_us > 0 {
                        self.stats.bump(Counter::ClockStretches);
                    }
                }
                WaitOutcome::TimedOut => {
                    self.stats.bump(Counter::ClockStretches);
                    if self.lines.sample(Line::Data).is_low() {
                        self.stats.bump(Counter::BusLockups);
                        log_error!("SDA and SCL both held low");
                        return Err(BusError::BusLockup);
                    }
                    self.stats.bump(Counter::ClockStretchTimeouts);
                    log_warn!("SCL held low before START");
                    return Err(BusError::ClockStretchTimeout);
                }
            }
        }

        if self.lines.sample(Line::Data).is_low() {
            if *self.lockup_suspected {
                self.stats.bump(Counter::BusLockups);
                log_error!("SDA still held low after a failed reset");
                return Err(BusError::BusLockup);
            }
            self.stats.bump(Counter::DeviceHung);
            log_warn!("device holding SDA low");
            return Err(BusError::DeviceHung);
        }

        *self.lockup_suspected = false;
        Ok(())
    }
}
