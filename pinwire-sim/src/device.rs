//! Simulated I2C target with a 256-byte register file
//!
//! Protocol: the first byte written after the address sets the register
//! pointer; further written bytes are stored at the pointer, and reads
//! return bytes from the pointer. The pointer increments after every data
//! byte and wraps.

/// Where the device is within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for START
    Idle,
    /// Shifting in the address byte
    Address,
    /// Driving ACK for the address
    AckAddress { read: bool },
    /// Shifting in the register pointer
    Register,
    /// Driving ACK for the register pointer
    AckRegister,
    /// Shifting in a data byte
    Write,
    /// Driving ACK for a data byte
    AckWrite,
    /// Shifting a byte out
    Transmit,
    /// Controller's acknowledge clock
    MasterAck,
    /// Not addressed, or gave up; waiting for START or STOP
    Ignore,
}

/// Scriptable register-file device
#[derive(Debug, Clone)]
pub struct SimDevice {
    /// 7-bit address
    pub address: u8,
    /// NACK the register pointer byte
    pub nack_register: bool,
    /// NACK data bytes once this many have been accepted in one frame
    pub nack_data_after: Option<usize>,
    /// NACK the address when the R/W bit asks for a read
    pub nack_read_address: bool,
    /// Hold SCL low for this long when the address is acknowledged (µs)
    pub address_stretch_us: u32,
    /// Keep driving a final 0 bit this long after SCL falls (µs)
    pub data_hold_us: u32,
    registers: [u8; 256],
    pointer: u8,
    state: State,
    shift: u8,
    bits: u8,
    accepted: usize,
    master_acked: bool,
    drive_sda: bool,
    stretch_pending: bool,
    release_pending: bool,
}

impl SimDevice {
    /// Device at `address` with every register zero
    pub fn new(address: u8) -> Self {
        Self {
            address,
            nack_register: false,
            nack_data_after: None,
            nack_read_address: false,
            address_stretch_us: 0,
            data_hold_us: 0,
            registers: [0; 256],
            pointer: 0,
            state: State::Idle,
            shift: 0,
            bits: 0,
            accepted: 0,
            master_acked: false,
            drive_sda: false,
            stretch_pending: false,
            release_pending: false,
        }
    }

    /// Preload registers starting at `start`
    pub fn with_registers(mut self, start: u8, values: &[u8]) -> Self {
        for (offset, &value) in values.iter().enumerate() {
            self.registers[start.wrapping_add(offset as u8) as usize] = value;
        }
        self
    }

    pub fn with_register_nack(mut self) -> Self {
        self.nack_register = true;
        self
    }

    pub fn with_data_nack_after(mut self, accepted: usize) -> Self {
        self.nack_data_after = Some(accepted);
        self
    }

    pub fn with_read_address_nack(mut self) -> Self {
        self.nack_read_address = true;
        self
    }

    pub fn with_address_stretch_us(mut self, us: u32) -> Self {
        self.address_stretch_us = us;
        self
    }

    pub fn with_data_hold_us(mut self, us: u32) -> Self {
        self.data_hold_us = us;
        self
    }

    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    /// Device is pulling SDA low
    pub(crate) fn drives_sda(&self) -> bool {
        self.drive_sda
    }

    /// One-shot stretch request for the clock that is about to rise (ns)
    pub(crate) fn take_stretch(&mut self) -> Option<u64> {
        if self.stretch_pending {
            self.stretch_pending = false;
            Some(self.address_stretch_us as u64 * 1_000)
        } else {
            None
        }
    }

    /// One-shot request to keep SDA low after the last transmitted bit (ns)
    pub(crate) fn take_release_delay(&mut self) -> Option<u64> {
        if self.release_pending {
            self.release_pending = false;
            Some(self.data_hold_us as u64 * 1_000)
        } else {
            None
        }
    }

    pub(crate) fn on_start(&mut self) {
        self.state = State::Address;
        self.shift = 0;
        self.bits = 0;
        self.accepted = 0;
        self.drive_sda = false;
        self.stretch_pending = false;
        self.release_pending = false;
    }

    pub(crate) fn on_stop(&mut self) {
        self.state = State::Idle;
        self.drive_sda = false;
        self.stretch_pending = false;
        self.release_pending = false;
    }

    /// SCL rose: sample SDA
    pub(crate) fn on_rising(&mut self, sda: bool) {
        match self.state {
            State::Address | State::Register | State::Write => {
                self.shift = (self.shift << 1) | sda as u8;
                self.bits = self.bits.saturating_add(1);
            }
            State::MasterAck => self.master_acked = !sda,
            _ => {}
        }
    }

    /// SCL fell: update SDA for the next bit
    pub(crate) fn on_falling(&mut self) {
        match self.state {
            State::Address if self.bits == 8 => {
                let read = self.shift & 1 == 1;
                if self.shift >> 1 == self.address && !(read && self.nack_read_address) {
                    self.state = State::AckAddress { read };
                    self.drive_sda = true;
                    self.stretch_pending = self.address_stretch_us > 0;
                } else {
                    self.state = State::Ignore;
                }
            }
            State::Register if self.bits == 8 => {
                if self.nack_register {
                    self.state = State::Ignore;
                } else {
                    self.pointer = self.shift;
                    self.state = State::AckRegister;
                    self.drive_sda = true;
                }
            }
            State::Write if self.bits == 8 => {
                if self.nack_data_after.is_some_and(|limit| self.accepted >= limit) {
                    self.state = State::Ignore;
                } else {
                    self.registers[self.pointer as usize] = self.shift;
                    self.pointer = self.pointer.wrapping_add(1);
                    self.accepted += 1;
                    self.state = State::AckWrite;
                    self.drive_sda = true;
                }
            }
            State::AckAddress { read: false } => {
                self.drive_sda = false;
                self.begin_receive(State::Register);
            }
            State::AckAddress { read: true } => self.begin_transmit(),
            State::AckRegister | State::AckWrite => {
                self.drive_sda = false;
                self.begin_receive(State::Write);
            }
            State::Transmit => {
                if self.bits < 8 {
                    self.drive_next_bit();
                } else {
                    self.release_pending = self.drive_sda && self.data_hold_us > 0;
                    self.drive_sda = false;
                    self.state = State::MasterAck;
                }
            }
            State::MasterAck => {
                if self.master_acked {
                    self.begin_transmit();
                } else {
                    self.state = State::Ignore;
                }
            }
            _ => {}
        }
    }

    fn begin_receive(&mut self, state: State) {
        self.state = state;
        self.shift = 0;
        self.bits = 0;
    }

    fn begin_transmit(&mut self) {
        self.shift = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        self.bits = 0;
        self.state = State::Transmit;
        self.drive_next_bit();
    }

    fn drive_next_bit(&mut self) {
        let bit = self.shift & (0x80 >> self.bits) != 0;
        self.drive_sda = !bit;
        self.bits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_byte(device: &mut SimDevice, byte: u8) {
        for i in (0..8).rev() {
            device.on_rising(byte & (1 << i) != 0);
            device.on_falling();
        }
    }

    #[test]
    fn test_address_match() {
        let mut device = SimDevice::new(0x1C);
        device.on_start();
        device.on_falling();
        clock_byte(&mut device, 0x1C << 1);
        assert!(device.drives_sda());
    }

    #[test]
    fn test_address_mismatch() {
        let mut device = SimDevice::new(0x1C);
        device.on_start();
        device.on_falling();
        clock_byte(&mut device, 0x1D << 1);
        assert!(!device.drives_sda());
    }

    #[test]
    fn test_register_write() {
        let mut device = SimDevice::new(0x1C);
        device.on_start();
        device.on_falling();
        for byte in [0x1C << 1, 0x40, 0x99] {
            clock_byte(&mut device, byte);
            assert!(device.drives_sda());
            // ACK clock
            device.on_rising(false);
            device.on_falling();
        }
        device.on_stop();
        assert_eq!(device.register(0x40), 0x99);
    }

    #[test]
    fn test_read_address_nack() {
        let mut device = SimDevice::new(0x1C).with_read_address_nack();
        device.on_start();
        device.on_falling();
        clock_byte(&mut device, (0x1C << 1) | 1);
        assert!(!device.drives_sda());

        device.on_start();
        device.on_falling();
        clock_byte(&mut device, 0x1C << 1);
        assert!(device.drives_sda());
    }

    #[test]
    fn test_data_hold_after_zero_bit() {
        let mut device = SimDevice::new(0x1C)
            .with_registers(0x00, &[0x00, 0xFF])
            .with_data_hold_us(2);
        device.on_start();
        device.on_falling();
        clock_byte(&mut device, (0x1C << 1) | 1);
        // Address ACK clock; the falling edge starts the first byte
        device.on_rising(false);
        device.on_falling();

        for _ in 0..8 {
            assert!(device.drives_sda());
            device.on_rising(false);
            device.on_falling();
        }
        assert!(!device.drives_sda());
        assert_eq!(device.take_release_delay(), Some(2_000));
        assert_eq!(device.take_release_delay(), None);

        // Master ACK, then 0xFF: last bit released, nothing to hold
        device.on_rising(false);
        device.on_falling();
        for _ in 0..8 {
            device.on_rising(true);
            device.on_falling();
        }
        assert_eq!(device.take_release_delay(), None);
    }

    #[test]
    fn test_stretch_is_one_shot() {
        let mut device = SimDevice::new(0x1C).with_address_stretch_us(50);
        device.on_start();
        device.on_falling();
        clock_byte(&mut device, 0x1C << 1);
        assert_eq!(device.take_stretch(), Some(50_000));
        assert_eq!(device.take_stretch(), None);
    }
}
