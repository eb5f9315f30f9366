//! Shared bus state: wired-AND levels, virtual time, attached devices

use std::cell::RefCell;
use std::rc::Rc;

use pinwire_hal::{Level, PinId};

use crate::delay::SimDelay;
use crate::device::SimDevice;
use crate::line::{SimLine, Wire};
use crate::resolver::SimResolver;

/// External fault holding SDA low
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SdaHold {
    Forever,
    /// Let go after this many more SCL rising edges
    Pulses(u32),
}

struct BusState {
    now_ns: u64,
    controller_scl_low: bool,
    controller_sda_low: bool,
    scl_hold: bool,
    sda_hold: Option<SdaHold>,
    /// Fault armed to take hold of SDA right after the next STOP
    sda_hold_after_stop: Option<SdaHold>,
    stretch_until_ns: u64,
    /// A device is still driving its last data bit until then
    data_hold_until_ns: u64,
    devices: Vec<SimDevice>,
    /// Levels the devices last saw
    scl: bool,
    sda: bool,
    transitions: u32,
    clock_pulses: u32,
    starts: u32,
    stops: u32,
}

impl BusState {
    fn scl_level(&self) -> bool {
        !(self.controller_scl_low || self.scl_hold || self.now_ns < self.stretch_until_ns)
    }

    fn sda_level(&self) -> bool {
        !(self.controller_sda_low
            || self.sda_hold.is_some()
            || self.now_ns < self.data_hold_until_ns
            || self.devices.iter().any(SimDevice::drives_sda))
    }

    /// Propagate line changes to devices until nothing moves
    fn settle(&mut self) {
        // Every pass commits one edge; a handful is always enough
        for _ in 0..16 {
            let scl = self.scl_level();
            let sda = self.sda_level();

            if scl != self.scl {
                if scl {
                    if let Some(ns) = self.devices.iter_mut().find_map(SimDevice::take_stretch) {
                        self.stretch_until_ns = self.now_ns + ns;
                        continue;
                    }
                    self.scl = true;
                    self.on_rising(sda);
                } else {
                    self.scl = false;
                    self.devices.iter_mut().for_each(SimDevice::on_falling);
                    if let Some(ns) = self.devices.iter_mut().find_map(SimDevice::take_release_delay) {
                        self.data_hold_until_ns = self.now_ns + ns;
                    }
                }
                continue;
            }

            if sda != self.sda {
                self.sda = sda;
                if scl {
                    if sda {
                        self.stops += 1;
                        self.devices.iter_mut().for_each(SimDevice::on_stop);
                        if let Some(hold) = self.sda_hold_after_stop.take() {
                            self.sda_hold = Some(hold);
                        }
                    } else {
                        self.starts += 1;
                        self.devices.iter_mut().for_each(SimDevice::on_start);
                    }
                }
                continue;
            }

            return;
        }
    }

    fn on_rising(&mut self, sda: bool) {
        if !self.controller_sda_low {
            self.clock_pulses += 1;
        }
        self.sda_hold = match self.sda_hold {
            Some(SdaHold::Pulses(n)) if n <= 1 => None,
            Some(SdaHold::Pulses(n)) => Some(SdaHold::Pulses(n - 1)),
            other => other,
        };
        for device in &mut self.devices {
            device.on_rising(sda);
        }
    }
}

/// Handle to one simulated bus; clones share the same wires
#[derive(Clone)]
pub struct SimBus {
    state: Rc<RefCell<BusState>>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    /// Idle bus with nothing attached
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                now_ns: 0,
                controller_scl_low: false,
                controller_sda_low: false,
                scl_hold: false,
                sda_hold: None,
                sda_hold_after_stop: None,
                stretch_until_ns: 0,
                data_hold_until_ns: 0,
                devices: Vec::new(),
                scl: true,
                sda: true,
                transitions: 0,
                clock_pulses: 0,
                starts: 0,
                stops: 0,
            })),
        }
    }

    pub fn attach(&self, device: SimDevice) {
        self.state.borrow_mut().devices.push(device);
    }

    /// Change fault settings of an attached device
    pub fn configure_device(&self, address: u8, f: impl FnOnce(&mut SimDevice)) {
        let mut state = self.state.borrow_mut();
        if let Some(device) = state.devices.iter_mut().find(|d| d.address == address) {
            f(device);
        }
    }

    /// Register contents of an attached device
    pub fn register(&self, address: u8, register: u8) -> Option<u8> {
        self.state
            .borrow()
            .devices
            .iter()
            .find(|d| d.address == address)
            .map(|d| d.register(register))
    }

    /// Controller line attached to `wire`
    pub fn line(&self, wire: Wire) -> SimLine {
        SimLine::new(self.clone(), Some(wire))
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay::new(self.clone())
    }

    /// Resolver mapping `sda` and `scl` onto this bus
    pub fn resolver(&self, sda: PinId, scl: PinId) -> SimResolver {
        SimResolver::new(self.clone(), sda, scl)
    }

    pub fn level(&self, wire: Wire) -> Level {
        let state = self.state.borrow();
        Level::from(match wire {
            Wire::Scl => state.scl_level(),
            Wire::Sda => state.sda_level(),
        })
    }

    pub(crate) fn set_controller(&self, wire: Wire, low: bool) {
        let mut state = self.state.borrow_mut();
        let slot = match wire {
            Wire::Scl => &mut state.controller_scl_low,
            Wire::Sda => &mut state.controller_sda_low,
        };
        if *slot != low {
            *slot = low;
            state.transitions += 1;
        }
        state.settle();
    }

    pub(crate) fn advance(&self, ns: u64) {
        let mut state = self.state.borrow_mut();
        state.now_ns += ns;
        state.settle();
    }

    /// Virtual time since creation (ns)
    pub fn now_ns(&self) -> u64 {
        self.state.borrow().now_ns
    }

    /// Controller drive changes on either line
    pub fn transitions(&self) -> u32 {
        self.state.borrow().transitions
    }

    /// SCL rising edges seen while the controller had SDA released
    ///
    /// Recovery pulses all count; a STOP's final clock does not, since the
    /// controller holds SDA low through it.
    pub fn clock_pulses(&self) -> u32 {
        self.state.borrow().clock_pulses
    }

    /// START conditions seen on the wires (repeated STARTs included)
    pub fn starts(&self) -> u32 {
        self.state.borrow().starts
    }

    /// STOP conditions seen on the wires
    pub fn stops(&self) -> u32 {
        self.state.borrow().stops
    }

    /// Hold SDA low; `Some(n)` lets go after `n` clock pulses
    pub fn hold_sda_low(&self, pulses: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.sda_hold = Some(match pulses {
            Some(n) => SdaHold::Pulses(n),
            None => SdaHold::Forever,
        });
        state.settle();
    }

    /// Pull SDA low again as soon as the next STOP completes
    ///
    /// `Some(n)` lets go after `n` clock pulses, like [`hold_sda_low`](Self::hold_sda_low).
    pub fn hold_sda_after_stop(&self, pulses: Option<u32>) {
        self.state.borrow_mut().sda_hold_after_stop = Some(match pulses {
            Some(n) => SdaHold::Pulses(n),
            None => SdaHold::Forever,
        });
    }

    pub fn release_sda_hold(&self) {
        let mut state = self.state.borrow_mut();
        state.sda_hold = None;
        state.settle();
    }

    /// Hold SCL low (or let go of it)
    pub fn hold_scl_low(&self, hold: bool) {
        let mut state = self.state.borrow_mut();
        state.scl_hold = hold;
        state.settle();
    }
}
