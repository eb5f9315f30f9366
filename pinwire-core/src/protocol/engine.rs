//! Bit, byte and condition primitives, and the transactions built from them

use embedded_hal::delay::DelayNs;
use pinwire_hal::{address_byte, Direction, OpenDrainLine};

use super::{Ack, Phase};
use crate::error::BusError;
use crate::line::{Line, LinePair};
use crate::stats::{Counter, Statistics};
use crate::timing::{Clock, WaitOutcome};

/// Protocol engine bound to one configured bus for the duration of a call
///
/// Borrows the driver state it mutates. Every entry point runs from START
/// through STOP before returning.
pub struct Engine<'a, L, D> {
    pub(crate) lines: &'a mut LinePair<L>,
    pub(crate) clock: Clock<'a, D>,
    pub(crate) stats: &'a mut Statistics,
    pub(crate) lockup_suspected: &'a mut bool,
    phase: Phase,
}

impl<'a, L, D> Engine<'a, L, D>
where
    L: OpenDrainLine,
    D: DelayNs,
{
    pub fn new(
        lines: &'a mut LinePair<L>,
        clock: Clock<'a, D>,
        stats: &'a mut Statistics,
        lockup_suspected: &'a mut bool,
    ) -> Self {
        Self {
            lines,
            clock,
            stats,
            lockup_suspected,
            phase: Phase::Idle,
        }
    }

    /// Current transaction phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn enter(&mut self, next: Phase) {
        debug_assert!(
            self.phase.allows(next),
            "illegal phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    // ========================================================================
    // Escalation
    // ========================================================================

    /// Run one operation, escalating bus faults to a single reset
    ///
    /// Faults that leave the bus in an unknown state get exactly one
    /// `force_reset` before the error is returned. A failed reset turns the
    /// error into `BusLockup`.
    pub fn run<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, BusError>,
    ) -> Result<T, BusError> {
        match op(self) {
            Err(err) if err.requires_recovery() => Err(self.recover_from(err)),
            other => other,
        }
    }

    fn recover_from(&mut self, err: BusError) -> BusError {
        log_warn!("bus fault ({}), resetting bus", err);
        self.enter(Phase::ErrorRecovery);
        let outcome = self.force_reset();
        self.enter(Phase::Idle);

        match outcome {
            Ok(()) => {
                *self.lockup_suspected = false;
                log_info!("bus recovered");
                err
            }
            Err(reset_err) => {
                *self.lockup_suspected = true;
                reset_err
            }
        }
    }

    // ========================================================================
    // Bits and bytes
    // ========================================================================

    /// Release SCL and wait for it to rise
    fn release_clock(&mut self) -> Result<(), BusError> {
        self.lines.release(Line::Clock);
        let timeout_us = self.clock.stretch_timeout_us();

        match self
            .clock
            .wait_for_high(self.lines.line_mut(Line::Clock), timeout_us)
        {
            WaitOutcome::Ready { waited_us: 0 } => Ok(()),
            WaitOutcome::Ready { waited_us } => {
                self.stats.bump(Counter::ClockStretches);
                log_trace!("clock stretched for {} us", waited_us);
                Ok(())
            }
            WaitOutcome::TimedOut => {
                self.stats.bump(Counter::ClockStretches);
                self.stats.bump(Counter::ClockStretchTimeouts);
                log_warn!("SCL held low for more than {} us", timeout_us);
                Err(BusError::ClockStretchTimeout)
            }
        }
    }

    /// Clock one bit out (SCL low on entry and exit)
    fn clock_bit_out(&mut self, high: bool) -> Result<(), BusError> {
        self.lines.set(Line::Data, high);
        self.clock.low_phase();
        self.clock_high_half()
    }

    /// Raise SCL, hold it for the high phase, pull it low again
    fn clock_high_half(&mut self) -> Result<(), BusError> {
        self.release_clock()?;
        self.clock.high_phase();
        self.lines.drive_low(Line::Clock);
        Ok(())
    }

    /// Clock one bit in (SCL low on entry and exit, SDA already released)
    fn clock_bit_in(&mut self) -> Result<bool, BusError> {
        self.clock.low_phase();
        self.release_clock()?;
        self.clock.high_phase();
        let bit = self.lines.sample(Line::Data).is_high();
        self.lines.drive_low(Line::Clock);
        Ok(bit)
    }

    /// Send one byte MSB first and return the receiver's acknowledge
    pub(crate) fn write_byte(&mut self, byte: u8) -> Result<Ack, BusError> {
        for bit in (0..8).rev() {
            self.clock_bit_out(byte & (1 << bit) != 0)?;
        }

        self.lines.release(Line::Data);
        let ack = if self.clock_bit_in()? { Ack::Nack } else { Ack::Ack };
        Ok(ack)
    }

    /// Receive one byte MSB first, then answer with `ack`
    pub(crate) fn read_byte(&mut self, ack: Ack) -> Result<u8, BusError> {
        self.lines.release(Line::Data);

        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | self.clock_bit_in()? as u8;
        }

        // The transmitter may keep its last bit valid into the low phase,
        // but must have let go of SDA by the end of it
        self.clock.low_phase();
        if self.lines.sample(Line::Data).is_low() {
            self.stats.bump(Counter::DeviceHung);
            log_error!("device kept SDA low after transmitting a byte");
            return Err(BusError::DeviceHung);
        }

        self.lines.set(Line::Data, ack.is_nack());
        self.clock_high_half()?;
        self.lines.release(Line::Data);
        Ok(byte)
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// START: SDA falls while SCL is high (bus idle on entry)
    pub(crate) fn start(&mut self) -> Result<(), BusError> {
        self.enter(Phase::StartCondition);
        let hold_us = self.clock.params().start_hold_us;

        self.lines.drive_low(Line::Data);
        self.clock.sleep_micros(hold_us);
        self.lines.drive_low(Line::Clock);
        self.clock.low_phase();

        if self.lines.sample(Line::Data).is_high() || self.lines.sample(Line::Clock).is_high() {
            self.stats.bump(Counter::FailedStarts);
            self.lines.release_all();
            self.enter(Phase::Idle);
            log_error!("START condition did not reach the bus");
            return Err(BusError::FailedStart);
        }

        self.stats.bump(Counter::StartConditions);
        Ok(())
    }

    /// Repeated START (SCL low on entry)
    pub(crate) fn repeated_start(&mut self) -> Result<(), BusError> {
        self.enter(Phase::RepeatedStart);
        let setup_us = self.clock.params().repeated_start_setup_us;
        let hold_us = self.clock.params().start_hold_us;

        self.lines.release(Line::Data);
        self.clock.low_phase();
        self.release_clock()?;
        self.clock.sleep_micros(setup_us);
        self.lines.drive_low(Line::Data);
        self.clock.sleep_micros(hold_us);
        self.lines.drive_low(Line::Clock);
        self.clock.low_phase();

        // The frame opened by the first START is still live; close it
        if self.lines.sample(Line::Data).is_high() || self.lines.sample(Line::Clock).is_high() {
            self.stats.bump(Counter::FailedStarts);
            log_error!("repeated START did not reach the bus");
            self.stop()?;
            return Err(BusError::FailedStart);
        }

        self.stats.bump(Counter::RepeatedStartConditions);
        Ok(())
    }

    /// STOP: SDA rises while SCL is high (SCL low on entry)
    pub(crate) fn stop(&mut self) -> Result<(), BusError> {
        self.enter(Phase::StopCondition);
        let setup_us = self.clock.params().stop_setup_us;
        let bus_free_us = self.clock.params().bus_free_us;

        self.lines.drive_low(Line::Data);
        self.clock.low_phase();
        self.release_clock()?;
        self.clock.sleep_micros(setup_us);
        self.lines.release(Line::Data);
        self.clock.sleep_micros(bus_free_us);

        if !self.lines.is_idle() {
            self.stats.bump(Counter::FailedStops);
            log_warn!("bus not idle after STOP");
            return Err(BusError::FailedStop);
        }

        self.stats.bump(Counter::StopConditions);
        self.enter(Phase::Idle);
        Ok(())
    }

    /// Check the bus and issue START
    pub(crate) fn begin(&mut self) -> Result<(), BusError> {
        self.ensure_idle()?;
        self.start()
    }

    /// Count a NACK, release the bus, and fail with `err`
    pub(crate) fn abort<T>(&mut self, counter: Counter, err: BusError) -> Result<T, BusError> {
        self.stats.bump(counter);
        log_debug!("transfer aborted: {}", err);
        self.stop()?;
        Err(err)
    }

    /// Send the address byte, aborting on NACK
    pub(crate) fn send_address(
        &mut self,
        address: u8,
        direction: Direction,
        counter: Counter,
        err: BusError,
    ) -> Result<(), BusError> {
        self.enter(Phase::AddressPhase);
        match self.write_byte(address_byte(address, direction))? {
            Ack::Ack => Ok(()),
            Ack::Nack => self.abort(counter, err),
        }
    }

    fn send_register(&mut self, register: u8) -> Result<(), BusError> {
        self.enter(Phase::RegisterPhase);
        match self.write_byte(register)? {
            Ack::Ack => Ok(()),
            Ack::Nack => self.abort(Counter::RegisterNacks, BusError::NackRegister),
        }
    }

    /// Send data bytes, stopping at the first NACK
    pub(crate) fn send_data(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.enter(Phase::DataWrite);
        for &byte in data {
            if self.write_byte(byte)?.is_nack() {
                return self.abort(Counter::TransferNacks, BusError::NackTransfer);
            }
            self.stats.bump(Counter::BytesWritten);
        }
        Ok(())
    }

    /// Receive into `buf`; the final byte is NACKed when `nack_last` is set
    pub(crate) fn receive_data(&mut self, buf: &mut [u8], nack_last: bool) -> Result<(), BusError> {
        self.enter(Phase::DataRead);
        let len = buf.len();
        for (i, slot) in buf.iter_mut().enumerate() {
            let ack = if nack_last && i + 1 == len {
                Ack::Nack
            } else {
                Ack::Ack
            };
            *slot = self.read_byte(ack)?;
            self.stats.bump(Counter::BytesRead);
        }
        Ok(())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Write `data` to consecutive registers starting at `register`
    pub fn write_register(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), BusError> {
        self.begin()?;
        self.send_address(address, Direction::Write, Counter::AddressNacks, BusError::NackAddress)?;
        self.send_register(register)?;
        self.send_data(data)?;
        self.stop()
    }

    /// Fill `buf` from consecutive registers starting at `register`
    pub fn read_register(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.begin()?;
        self.send_address(address, Direction::Write, Counter::AddressNacks, BusError::NackAddress)?;
        self.send_register(register)?;
        self.repeated_start()?;
        self.send_address(
            address,
            Direction::Read,
            Counter::RepeatedStartNacks,
            BusError::NackRepeatedStart,
        )?;
        self.receive_data(buf, true)?;
        self.stop()
    }

    /// Address-only write; returns whether the address was acknowledged
    ///
    /// A NACK here is an answer, not an error, and is not counted.
    pub fn probe(&mut self, address: u8) -> Result<bool, BusError> {
        self.begin()?;
        self.enter(Phase::AddressPhase);
        let ack = self.write_byte(address_byte(address, Direction::Write))?;
        self.stop()?;
        Ok(ack.is_ack())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TRANSITION_OVERHEAD_NS;
    use crate::timing::TimingParameters;
    use pinwire_hal::{Level, SpeedGrade};
    use pinwire_sim::{SimBus, SimDelay, SimDevice, SimLine, Wire};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Rig {
        bus: SimBus,
        lines: LinePair<SimLine>,
        delay: SimDelay,
        stats: Statistics,
        lockup: bool,
    }

    impl Rig {
        fn new() -> Self {
            let bus = SimBus::new();
            bus.attach(SimDevice::new(0x1C));
            let mut lines = LinePair::new(bus.line(Wire::Scl), bus.line(Wire::Sda));
            lines.release_all();
            Self {
                delay: bus.delay(),
                lines,
                bus,
                stats: Statistics::new(),
                lockup: false,
            }
        }

        fn engine(&mut self) -> Engine<'_, SimLine, SimDelay> {
            let params = TimingParameters::compute(SpeedGrade::Standard, DEFAULT_TRANSITION_OVERHEAD_NS);
            Engine::new(
                &mut self.lines,
                Clock::new(&mut self.delay, params, 1_000),
                &mut self.stats,
                &mut self.lockup,
            )
        }
    }

    #[test]
    fn test_probe_ack_and_nack() {
        let mut rig = Rig::new();
        let mut engine = rig.engine();
        assert_eq!(engine.probe(0x1C), Ok(true));
        assert_eq!(engine.probe(0x1D), Ok(false));
        assert_eq!(engine.phase(), Phase::Idle);
        drop(engine);

        assert_eq!(rig.stats.start_conditions, 2);
        assert_eq!(rig.stats.stop_conditions, 2);
        assert_eq!(rig.stats.address_nacks, 0);
    }

    #[test]
    fn test_write_then_read_register() {
        let mut rig = Rig::new();
        let mut engine = rig.engine();
        engine.write_register(0x1C, 0x20, &[0xA5, 0x5A]).unwrap();

        let mut buf = [0u8; 2];
        engine.read_register(0x1C, 0x20, &mut buf).unwrap();
        drop(engine);

        assert_eq!(buf, [0xA5, 0x5A]);
        assert_eq!(rig.stats.bytes_written, 2);
        assert_eq!(rig.stats.bytes_read, 2);
        assert_eq!(rig.stats.repeated_start_conditions, 1);
        assert_eq!(rig.bus.register(0x1C, 0x21), Some(0x5A));
    }

    #[test]
    fn test_write_address_nack() {
        let mut rig = Rig::new();
        let mut engine = rig.engine();
        assert_eq!(
            engine.write_register(0x50, 0x00, &[1]),
            Err(BusError::NackAddress)
        );
        drop(engine);

        assert_eq!(rig.stats.address_nacks, 1);
        assert_eq!(rig.stats.stop_conditions, 1);
        assert!(rig.lines.is_idle());
    }

    #[test]
    fn test_stretch_is_counted() {
        let mut rig = Rig::new();
        rig.bus.configure_device(0x1C, |d| d.address_stretch_us = 20);
        let mut engine = rig.engine();
        engine.write_register(0x1C, 0x00, &[7]).unwrap();
        drop(engine);

        assert_eq!(rig.stats.clock_stretches, 1);
        assert_eq!(rig.stats.clock_stretch_timeouts, 0);
    }

    #[test]
    fn test_run_resets_after_stretch_timeout() {
        let mut rig = Rig::new();
        rig.bus.configure_device(0x1C, |d| d.address_stretch_us = 1_500);
        let mut engine = rig.engine();
        let result = engine.run(|e| e.write_register(0x1C, 0x00, &[7]));
        assert_eq!(result, Err(BusError::ClockStretchTimeout));
        assert_eq!(engine.phase(), Phase::Idle);
        drop(engine);

        assert_eq!(rig.stats.clock_stretch_timeouts, 1);
        assert_eq!(rig.stats.bus_resets, 1);
        assert!(!rig.lockup);
        assert!(rig.lines.is_idle());
    }

    #[test]
    fn test_read_tolerates_late_data_release() {
        let mut rig = Rig::new();
        // Last bit of 0x00 stays on SDA into the low phase, within the hold time
        rig.bus.configure_device(0x1C, |d| d.data_hold_us = 2);
        let mut engine = rig.engine();

        let mut buf = [0xFFu8; 2];
        assert_eq!(engine.read_register(0x1C, 0x00, &mut buf), Ok(()));
        drop(engine);

        assert_eq!(buf, [0x00, 0x00]);
        assert_eq!(rig.stats.bytes_read, 2);
        assert_eq!(rig.stats.device_hung, 0);
        assert_eq!(rig.bus.stops(), 1);
    }

    /// Line whose pull-down can be disconnected mid-transfer
    struct GatedLine {
        inner: SimLine,
        cut: Rc<Cell<bool>>,
    }

    impl GatedLine {
        fn new(inner: SimLine) -> Self {
            Self {
                inner,
                cut: Rc::new(Cell::new(false)),
            }
        }
    }

    impl OpenDrainLine for GatedLine {
        fn drive_low(&mut self) {
            if !self.cut.get() {
                self.inner.drive_low();
            }
        }

        fn release(&mut self) {
            self.inner.release();
        }

        fn sample(&mut self) -> Level {
            self.inner.sample()
        }
    }

    #[test]
    fn test_failed_repeated_start_closes_frame() {
        let bus = SimBus::new();
        bus.attach(SimDevice::new(0x1C));
        let scl = GatedLine::new(bus.line(Wire::Scl));
        let cut = scl.cut.clone();
        let mut lines = LinePair::new(scl, GatedLine::new(bus.line(Wire::Sda)));
        lines.release_all();
        let mut delay = bus.delay();
        let mut stats = Statistics::new();
        let mut lockup = false;

        let params = TimingParameters::compute(SpeedGrade::Standard, DEFAULT_TRANSITION_OVERHEAD_NS);
        let mut engine = Engine::new(
            &mut lines,
            Clock::new(&mut delay, params, 1_000),
            &mut stats,
            &mut lockup,
        );
        engine.begin().unwrap();
        engine
            .send_address(0x1C, Direction::Write, Counter::AddressNacks, BusError::NackAddress)
            .unwrap();

        cut.set(true);
        assert_eq!(engine.repeated_start(), Err(BusError::FailedStart));
        assert_eq!(engine.phase(), Phase::Idle);
        drop(engine);

        assert_eq!(stats.failed_starts, 1);
        assert_eq!(stats.start_conditions, 1);
        assert_eq!(stats.stop_conditions, 1);
        assert_eq!(bus.stops(), 1);
        assert!(lines.is_idle());
    }
}
