//! Pin resolver wired to a simulated bus

use pinwire_hal::{OpenDrainLine, PinAllocator, PinError, PinId, PinResolver};

use crate::bus::SimBus;
use crate::line::{SimLine, Wire};

/// Board revision reported by default
pub const SIM_REVISION: u32 = 2;

/// Hands out [`SimLine`]s for two fixed pin numbers
///
/// Any other valid pin resolves to a line that is not connected to the bus.
pub struct SimResolver {
    bus: SimBus,
    sda: PinId,
    scl: PinId,
    allocator: PinAllocator,
    revision: Option<u32>,
    unavailable: bool,
}

impl SimResolver {
    pub(crate) fn new(bus: SimBus, sda: PinId, scl: PinId) -> Self {
        Self {
            bus,
            sda,
            scl,
            allocator: PinAllocator::new(),
            revision: Some(SIM_REVISION),
            unavailable: false,
        }
    }

    /// Report an unknown board
    pub fn without_revision(mut self) -> Self {
        self.revision = None;
        self
    }

    /// Fail every resolve as if the GPIO block could not be mapped
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn is_allocated(&self, pin: PinId) -> bool {
        self.allocator.is_allocated(pin)
    }
}

impl PinResolver for SimResolver {
    type Line = SimLine;

    fn revision(&mut self) -> Result<u32, PinError> {
        self.revision.ok_or(PinError::UnknownPlatform)
    }

    fn resolve(&mut self, pin: PinId) -> Result<SimLine, PinError> {
        if self.unavailable {
            return Err(PinError::Unavailable);
        }
        self.allocator.allocate(pin)?;

        let wire = if pin == self.sda {
            Some(Wire::Sda)
        } else if pin == self.scl {
            Some(Wire::Scl)
        } else {
            None
        };
        Ok(SimLine::new(self.bus.clone(), wire))
    }

    fn free(&mut self, pin: PinId, mut line: SimLine) {
        line.release();
        self.allocator.release(pin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_and_free() {
        let bus = SimBus::new();
        let mut resolver = bus.resolver(PinId(2), PinId(3));
        assert_eq!(resolver.revision(), Ok(SIM_REVISION));

        let sda = resolver.resolve(PinId(2)).unwrap();
        assert_eq!(sda.wire(), Some(Wire::Sda));
        assert!(resolver.is_allocated(PinId(2)));
        assert!(matches!(resolver.resolve(PinId(2)), Err(PinError::AlreadyTaken)));

        resolver.free(PinId(2), sda);
        assert!(!resolver.is_allocated(PinId(2)));
    }

    #[test]
    fn test_unwired_pin() {
        let bus = SimBus::new();
        let mut resolver = bus.resolver(PinId(2), PinId(3));
        let mut line = resolver.resolve(PinId(17)).unwrap();
        assert_eq!(line.wire(), None);
        line.drive_low();
        assert!(line.is_high());
        assert_eq!(bus.transitions(), 0);
    }

    #[test]
    fn test_failure_modes() {
        let bus = SimBus::new();
        let mut resolver = bus.resolver(PinId(2), PinId(3)).without_revision();
        assert_eq!(resolver.revision(), Err(PinError::UnknownPlatform));

        let mut resolver = bus.resolver(PinId(2), PinId(3)).unavailable();
        assert!(matches!(resolver.resolve(PinId(2)), Err(PinError::Unavailable)));
        assert!(matches!(
            bus.resolver(PinId(2), PinId(3)).resolve(PinId(64)),
            Err(PinError::InvalidPin)
        ));
    }
}
