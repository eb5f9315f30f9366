//! Line controller
//!
//! Owns the SCL/SDA pair and exposes the three open-drain primitives by line
//! name. Lines are only ever pulled low or released.

use pinwire_hal::{Level, OpenDrainLine};

/// One of the two bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    /// SCL
    Clock,
    /// SDA
    Data,
}

/// The clock and data lines of one bus
pub struct LinePair<L> {
    scl: L,
    sda: L,
}

impl<L: OpenDrainLine> LinePair<L> {
    /// Pair up resolved lines
    pub fn new(scl: L, sda: L) -> Self {
        Self { scl, sda }
    }

    /// Pull a line low
    pub fn drive_low(&mut self, line: Line) {
        self.line_mut(line).drive_low();
    }

    /// Release a line to the pull-up
    pub fn release(&mut self, line: Line) {
        self.line_mut(line).release();
    }

    /// Release for `true`, drive low for `false`
    pub fn set(&mut self, line: Line, high: bool) {
        self.line_mut(line).set_level(high);
    }

    /// Read a line
    pub fn sample(&mut self, line: Line) -> Level {
        self.line_mut(line).sample()
    }

    /// Release both lines (SDA first so no START is produced)
    pub fn release_all(&mut self) {
        self.sda.release();
        self.scl.release();
    }

    /// Both lines read high
    pub fn is_idle(&mut self) -> bool {
        self.sda.is_high() && self.scl.is_high()
    }

    /// Direct access to one line
    pub fn line_mut(&mut self, line: Line) -> &mut L {
        match line {
            Line::Clock => &mut self.scl,
            Line::Data => &mut self.sda,
        }
    }

    /// Split back into `(scl, sda)`
    pub fn into_inner(self) -> (L, L) {
        (self.scl, self.sda)
    }
}
