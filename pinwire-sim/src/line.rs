//! Simulated open-drain lines

use pinwire_hal::{Level, OpenDrainLine};

use crate::bus::SimBus;

/// Which bus wire a line is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Scl,
    Sda,
}

/// Controller end of one bus wire
///
/// A line that is not wired to anything floats high whatever the
/// controller does.
pub struct SimLine {
    bus: SimBus,
    wire: Option<Wire>,
}

impl SimLine {
    pub(crate) fn new(bus: SimBus, wire: Option<Wire>) -> Self {
        Self { bus, wire }
    }

    pub fn wire(&self) -> Option<Wire> {
        self.wire
    }
}

impl OpenDrainLine for SimLine {
    fn drive_low(&mut self) {
        if let Some(wire) = self.wire {
            self.bus.set_controller(wire, true);
        }
    }

    fn release(&mut self) {
        if let Some(wire) = self.wire {
            self.bus.set_controller(wire, false);
        }
    }

    fn sample(&mut self) -> Level {
        match self.wire {
            Some(wire) => self.bus.level(wire),
            None => Level::High,
        }
    }
}
