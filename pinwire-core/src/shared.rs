//! Whole-transaction lock for drivers shared between callers
//!
//! The lock is held from START through STOP, including any recovery, so no
//! two transactions interleave on the wire and a statistics snapshot never
//! reflects half a transaction.
//!
//! ```ignore
//! static I2C: SharedDriver<CriticalSectionRawMutex, Resolver, Delay> =
//!     SharedDriver::new(Driver::new(resolver, delay));
//!
//! I2C.write(0x1C, 0x20, &[0x57])?;
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use pinwire_hal::{PinId, PinResolver, SpeedGrade};

use crate::driver::Driver;
use crate::error::BusError;
use crate::scan::PresenceMap;
use crate::stats::Statistics;
use crate::timing::TimingParameters;

/// [`Driver`] behind a blocking mutex
pub struct SharedDriver<M: RawMutex, R: PinResolver, D> {
    inner: Mutex<M, RefCell<Driver<R, D>>>,
}

impl<M, R, D> SharedDriver<M, R, D>
where
    M: RawMutex,
    R: PinResolver,
    D: DelayNs,
{
    pub const fn new(driver: Driver<R, D>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(driver)),
        }
    }

    /// Run `f` with exclusive access to the driver
    ///
    /// # Panics
    ///
    /// Panics if called again from inside `f`.
    pub fn lock<T>(&self, f: impl FnOnce(&mut Driver<R, D>) -> T) -> T {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn configure(&self, sda: PinId, scl: PinId, speed: SpeedGrade) -> Result<(), BusError> {
        self.lock(|driver| driver.configure(sda, scl, speed))
    }

    pub fn scan_bus(&self) -> Result<PresenceMap, BusError> {
        self.lock(|driver| driver.scan_bus())
    }

    pub fn write(&self, address: u8, register: u8, data: &[u8]) -> Result<(), BusError> {
        self.lock(|driver| driver.write(address, register, data))
    }

    pub fn read(&self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.lock(|driver| driver.read(address, register, buf))
    }

    pub fn reset(&self) -> Result<(), BusError> {
        self.lock(|driver| driver.reset())
    }

    pub fn statistics(&self) -> Statistics {
        self.lock(|driver| driver.statistics())
    }

    pub fn configuration(&self) -> Option<TimingParameters> {
        self.lock(|driver| driver.configuration())
    }

    /// Unwrap the driver
    pub fn into_inner(self) -> Driver<R, D> {
        self.inner.into_inner().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use pinwire_sim::{SimBus, SimDelay, SimDevice, SimResolver};

    type Shared = SharedDriver<NoopRawMutex, SimResolver, SimDelay>;

    #[test]
    fn test_shared_round_trip() {
        let bus = SimBus::new();
        bus.attach(SimDevice::new(0x1C));
        let shared: Shared = SharedDriver::new(Driver::new(bus.resolver(PinId(2), PinId(3)), bus.delay()));

        shared.configure(PinId(2), PinId(3), SpeedGrade::Full).unwrap();
        shared.write(0x1C, 0x05, &[0xAB]).unwrap();

        let mut buf = [0u8; 1];
        shared.read(0x1C, 0x05, &mut buf).unwrap();
        assert_eq!(buf, [0xAB]);

        let stats = shared.statistics();
        assert_eq!(stats.start_conditions, stats.stop_conditions);
        assert!(shared.configuration().is_some());

        let driver = shared.into_inner();
        assert_eq!(driver.statistics(), stats);
    }

    #[test]
    fn test_lock_sees_whole_transaction() {
        let bus = SimBus::new();
        bus.attach(SimDevice::new(0x1C));
        let shared: Shared = SharedDriver::new(Driver::new(bus.resolver(PinId(2), PinId(3)), bus.delay()));
        shared.configure(PinId(2), PinId(3), SpeedGrade::Standard).unwrap();

        let (before, after) = shared.lock(|driver| {
            let before = driver.statistics();
            driver.write(0x1C, 0, &[1, 2]).unwrap();
            (before, driver.statistics())
        });
        let delta = after.delta(&before);
        assert_eq!(delta.start_conditions, 1);
        assert_eq!(delta.stop_conditions, 1);
        assert_eq!(delta.bytes_written, 2);
    }
}
