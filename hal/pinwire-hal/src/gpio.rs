//! Open-drain line abstractions
//!
//! An I2C line is never driven high. The controller either pulls it low or
//! lets go of it and the external pull-up resistor brings it back to logic 1.
//! Any connected device can hold the line low at the same time, so the level
//! read back may differ from what the controller last requested.

use core::convert::Infallible;

use embedded_hal::digital::{InputPin, OutputPin};

/// Sampled logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Check if the level is logic 1
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    /// Check if the level is logic 0
    pub fn is_low(self) -> bool {
        self == Level::Low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Open-drain line
///
/// Implementations change the physical line state immediately; there is no
/// buffering and no error return. A line stuck low is detected by the caller
/// through timing, not reported here.
pub trait OpenDrainLine {
    /// Pull the line to logic 0
    fn drive_low(&mut self);

    /// Stop driving the line (high impedance)
    fn release(&mut self);

    /// Read the current level of the line
    fn sample(&mut self) -> Level;

    /// Drive low for `false`, release for `true`
    fn set_level(&mut self, high: bool) {
        if high {
            self.release();
        } else {
            self.drive_low();
        }
    }

    /// Check if the line currently reads high
    fn is_high(&mut self) -> bool {
        self.sample().is_high()
    }

    /// Check if the line currently reads low
    fn is_low(&mut self) -> bool {
        self.sample().is_low()
    }
}

/// Adapter for embedded-hal pins configured as open-drain outputs
///
/// `set_high` on an open-drain output releases the line, which is exactly the
/// semantics the engine needs. Only pins with infallible GPIO access are
/// accepted, since the engine has no way to recover from a failed toggle
/// halfway through a bit.
pub struct EhLine<P> {
    pin: P,
}

impl<P> EhLine<P>
where
    P: OutputPin<Error = Infallible> + InputPin,
{
    /// Wrap an open-drain pin
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Give the pin back
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P> OpenDrainLine for EhLine<P>
where
    P: OutputPin<Error = Infallible> + InputPin,
{
    fn drive_low(&mut self) {
        self.pin.set_low().unwrap_or_else(|e| match e {});
    }

    fn release(&mut self) {
        self.pin.set_high().unwrap_or_else(|e| match e {});
    }

    fn sample(&mut self) -> Level {
        Level::from(self.pin.is_high().unwrap_or_else(|e| match e {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::ErrorType;

    /// Mock open-drain pin with an optional external pull-down
    struct MockPin {
        released: bool,
        held_low_externally: bool,
    }

    impl MockPin {
        fn new() -> Self {
            Self {
                released: true,
                held_low_externally: false,
            }
        }
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.released = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.released = true;
            Ok(())
        }
    }

    impl InputPin for MockPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.released && !self.held_low_externally)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|high| !high)
        }
    }

    #[test]
    fn test_level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(Level::High.is_high());
        assert!(Level::Low.is_low());
    }

    #[test]
    fn test_eh_line_drive_and_release() {
        let mut line = EhLine::new(MockPin::new());
        assert_eq!(line.sample(), Level::High);

        line.drive_low();
        assert_eq!(line.sample(), Level::Low);

        line.release();
        assert_eq!(line.sample(), Level::High);
    }

    #[test]
    fn test_eh_line_sees_external_hold() {
        let mut pin = MockPin::new();
        pin.held_low_externally = true;
        let mut line = EhLine::new(pin);

        // Released, but a device is pulling the line down
        line.release();
        assert!(line.is_low());
    }

    #[test]
    fn test_set_level() {
        let mut line = EhLine::new(MockPin::new());
        line.set_level(false);
        assert!(line.is_low());
        line.set_level(true);
        assert!(line.is_high());
        assert!(line.into_inner().released);
    }
}
