//! Driver state and public bus operations
//!
//! One [`Driver`] per physical bus. It owns the pin resolver, the delay
//! provider, the statistics, and (once configured) the resolved lines with
//! their timing. Every bus operation borrows it mutably for the whole
//! transaction.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──► unconfigured ──configure()──► configured ──configure()──► re-configured
//!                │                            │
//!                └─ bus ops: NotConfigured    └─ counters persist across re-configure
//! ```

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use pinwire_hal::{PinId, PinResolver, SpeedGrade, MAX_ADDRESS};

use crate::config::{BusConfiguration, DriverConfig};
use crate::error::BusError;
use crate::line::LinePair;
use crate::protocol::Engine;
use crate::recovery::BusCondition;
use crate::scan::PresenceMap;
use crate::stats::Statistics;
use crate::timing::{Clock, TimingParameters};

/// The configured half of the driver state
struct ActiveBus<L> {
    configuration: BusConfiguration,
    timing: TimingParameters,
    lines: LinePair<L>,
    /// Last reset failed to free SDA
    lockup_suspected: bool,
}

/// Bit-banged I2C master
pub struct Driver<R: PinResolver, D> {
    resolver: R,
    delay: D,
    config: DriverConfig,
    stats: Statistics,
    bus: Option<ActiveBus<R::Line>>,
}

impl<R, D> Driver<R, D>
where
    R: PinResolver,
    D: DelayNs,
{
    /// Create an unconfigured driver with default tunables
    pub fn new(resolver: R, delay: D) -> Self {
        Self::with_config(resolver, delay, DriverConfig::default())
    }

    /// Create an unconfigured driver
    pub fn with_config(resolver: R, delay: D, config: DriverConfig) -> Self {
        Self {
            resolver,
            delay,
            config,
            stats: Statistics::new(),
            bus: None,
        }
    }

    /// Assign pins and speed grade
    ///
    /// Replaces any previous configuration. The old pins are given back
    /// before the new ones are claimed, so on failure the driver is left
    /// unconfigured. Statistics are kept.
    pub fn configure(&mut self, sda: PinId, scl: PinId, speed: SpeedGrade) -> Result<(), BusError> {
        if sda == scl {
            return Err(BusError::InvalidArgument);
        }

        let revision = self.resolver.revision()?;
        self.free_pins();

        let sda_line = self.resolver.resolve(sda)?;
        let scl_line = match self.resolver.resolve(scl) {
            Ok(line) => line,
            Err(e) => {
                self.resolver.free(sda, sda_line);
                return Err(e.into());
            }
        };

        let timing = TimingParameters::compute(speed, self.config.transition_overhead_ns);
        let mut lines = LinePair::new(scl_line, sda_line);
        lines.release_all();

        log_info!(
            "bus configured: SDA={} SCL={} {} Hz (revision {})",
            sda.number(),
            scl.number(),
            speed.frequency_hz(),
            revision
        );

        self.bus = Some(ActiveBus {
            configuration: BusConfiguration { sda, scl, speed },
            timing,
            lines,
            lockup_suspected: false,
        });
        Ok(())
    }

    fn free_pins(&mut self) {
        if let Some(bus) = self.bus.take() {
            let (scl_line, sda_line) = bus.lines.into_inner();
            self.resolver.free(bus.configuration.sda, sda_line);
            self.resolver.free(bus.configuration.scl, scl_line);
        }
    }

    /// Engine over the configured bus
    pub(crate) fn engine(&mut self) -> Result<Engine<'_, R::Line, D>, BusError> {
        let bus = self.bus.as_mut().ok_or(BusError::NotConfigured)?;
        let clock = Clock::new(&mut self.delay, bus.timing, self.config.clock_stretch_timeout_us);
        Ok(Engine::new(
            &mut bus.lines,
            clock,
            &mut self.stats,
            &mut bus.lockup_suspected,
        ))
    }

    /// Probe every 7-bit address (0x00..=0x7E)
    pub fn scan_bus(&mut self) -> Result<PresenceMap, BusError> {
        self.engine()?.scan()
    }

    /// Write `data` to consecutive registers starting at `register`
    pub fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), BusError> {
        let mut engine = self.engine()?;
        if address > MAX_ADDRESS || data.is_empty() {
            return Err(BusError::InvalidArgument);
        }
        engine.run(|e| e.write_register(address, register, data))
    }

    /// Fill `buf` from consecutive registers starting at `register`
    pub fn read(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusError> {
        let mut engine = self.engine()?;
        if address > MAX_ADDRESS || buf.is_empty() {
            return Err(BusError::InvalidArgument);
        }
        engine.run(|e| e.read_register(address, register, buf))
    }

    /// Read `count` bytes into a bounded vector
    ///
    /// `count` must be between 1 and `N`.
    pub fn read_bytes<const N: usize>(
        &mut self,
        address: u8,
        register: u8,
        count: usize,
    ) -> Result<Vec<u8, N>, BusError> {
        if !self.is_configured() {
            return Err(BusError::NotConfigured);
        }
        let mut out = Vec::new();
        out.resize(count, 0).map_err(|_| BusError::InvalidArgument)?;
        self.read(address, register, &mut out)?;
        Ok(out)
    }

    /// Nine-pulse bus reset
    pub fn reset(&mut self) -> Result<(), BusError> {
        let mut engine = self.engine()?;
        let result = engine.force_reset();
        *engine.lockup_suspected = result.is_err();
        result
    }

    /// Snapshot of all counters
    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Timing in effect, or `None` before the first `configure`
    pub fn configuration(&self) -> Option<TimingParameters> {
        self.bus.as_ref().map(|bus| bus.timing)
    }

    /// Pin assignment in effect
    pub fn bus_configuration(&self) -> Option<BusConfiguration> {
        self.bus.as_ref().map(|bus| bus.configuration)
    }

    pub fn is_configured(&self) -> bool {
        self.bus.is_some()
    }

    pub fn driver_config(&self) -> &DriverConfig {
        &self.config
    }

    /// Current line levels
    pub fn bus_condition(&mut self) -> Result<BusCondition, BusError> {
        let bus = self.bus.as_mut().ok_or(BusError::NotConfigured)?;
        Ok(BusCondition::diagnose(&mut bus.lines))
    }

    /// Give back the pins and clear every counter
    pub fn reset_state(&mut self) {
        self.free_pins();
        self.stats = Statistics::new();
        log_info!("driver state reset");
    }

    /// Tear down, returning the resolver and delay
    pub fn release(mut self) -> (R, D) {
        self.free_pins();
        (self.resolver, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinwire_sim::{SimBus, SimDelay, SimDevice, SimResolver};

    const SDA: PinId = PinId(2);
    const SCL: PinId = PinId(3);

    fn driver(bus: &SimBus) -> Driver<SimResolver, SimDelay> {
        Driver::new(bus.resolver(SDA, SCL), bus.delay())
    }

    #[test]
    fn test_unconfigured() {
        let bus = SimBus::new();
        let mut driver = driver(&bus);
        assert!(!driver.is_configured());
        assert_eq!(driver.configuration(), None);
        assert_eq!(driver.write(0x1C, 0, &[1]), Err(BusError::NotConfigured));
        assert_eq!(driver.reset(), Err(BusError::NotConfigured));
        assert_eq!(driver.bus_condition(), Err(BusError::NotConfigured));
    }

    #[test]
    fn test_configure_rejects_same_pin() {
        let bus = SimBus::new();
        let mut driver = driver(&bus);
        assert_eq!(
            driver.configure(SDA, SDA, SpeedGrade::Standard),
            Err(BusError::InvalidArgument)
        );
        assert!(!driver.is_configured());
    }

    #[test]
    fn test_configure_unknown_revision() {
        let bus = SimBus::new();
        let mut driver = Driver::new(bus.resolver(SDA, SCL).without_revision(), bus.delay());
        assert_eq!(
            driver.configure(SDA, SCL, SpeedGrade::Standard),
            Err(BusError::VersionError)
        );
    }

    #[test]
    fn test_configure_bad_pin_frees_first() {
        let bus = SimBus::new();
        let mut driver = driver(&bus);
        assert_eq!(
            driver.configure(SDA, PinId(200), SpeedGrade::Standard),
            Err(BusError::SetupError)
        );
        // SDA was given back, so a valid configuration still works
        assert_eq!(driver.configure(SDA, SCL, SpeedGrade::Standard), Ok(()));
    }

    #[test]
    fn test_configure_twice_reuses_pins() {
        let bus = SimBus::new();
        let mut driver = driver(&bus);
        driver.configure(SDA, SCL, SpeedGrade::Standard).unwrap();
        driver.configure(SDA, SCL, SpeedGrade::Full).unwrap();

        let timing = driver.configuration().unwrap();
        assert_eq!(timing.speed, SpeedGrade::Full);
        assert_eq!(
            driver.bus_configuration(),
            Some(BusConfiguration {
                sda: SDA,
                scl: SCL,
                speed: SpeedGrade::Full
            })
        );
    }

    #[test]
    fn test_argument_validation() {
        let bus = SimBus::new();
        bus.attach(SimDevice::new(0x1C));
        let mut driver = driver(&bus);
        driver.configure(SDA, SCL, SpeedGrade::Standard).unwrap();

        let transitions = bus.transitions();
        assert_eq!(driver.write(0x80, 0, &[1]), Err(BusError::InvalidArgument));
        assert_eq!(driver.write(0x1C, 0, &[]), Err(BusError::InvalidArgument));
        assert_eq!(driver.read(0x1C, 0, &mut []), Err(BusError::InvalidArgument));
        assert_eq!(
            driver.read_bytes::<4>(0x1C, 0, 5),
            Err(BusError::InvalidArgument)
        );
        assert_eq!(bus.transitions(), transitions);
    }

    #[test]
    fn test_read_bytes() {
        let bus = SimBus::new();
        bus.attach(SimDevice::new(0x1C).with_registers(0x10, &[1, 2, 3]));
        let mut driver = driver(&bus);
        driver.configure(SDA, SCL, SpeedGrade::Full).unwrap();

        let bytes = driver.read_bytes::<8>(0x1C, 0x10, 3).unwrap();
        assert_eq!(bytes.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_reset_state_clears_counters() {
        let bus = SimBus::new();
        bus.attach(SimDevice::new(0x1C));
        let mut driver = driver(&bus);
        driver.configure(SDA, SCL, SpeedGrade::Full).unwrap();
        driver.write(0x1C, 0, &[1]).unwrap();
        assert_ne!(driver.statistics(), Statistics::new());

        driver.reset_state();
        assert_eq!(driver.statistics(), Statistics::new());
        assert!(!driver.is_configured());
    }
}
