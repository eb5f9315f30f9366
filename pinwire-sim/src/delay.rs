//! Virtual-time delay provider

use embedded_hal::delay::DelayNs;

use crate::bus::SimBus;

/// Advances the bus clock instead of sleeping
#[derive(Clone)]
pub struct SimDelay {
    bus: SimBus,
}

impl SimDelay {
    pub(crate) fn new(bus: SimBus) -> Self {
        Self { bus }
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.bus.advance(ns as u64);
    }
}
