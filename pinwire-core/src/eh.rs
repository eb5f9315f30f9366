//! embedded-hal `I2c` implementation
//!
//! Lets existing device drivers run over the bit-banged bus. Direction
//! changes inside a transaction get a repeated START and a fresh address
//! byte; the last byte of each run of reads is NACKed.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};
use pinwire_hal::{Direction, OpenDrainLine, PinResolver, MAX_ADDRESS};

use crate::driver::Driver;
use crate::error::BusError;
use crate::protocol::Engine;
use crate::stats::Counter;

impl<R, D> ErrorType for Driver<R, D>
where
    R: PinResolver,
    D: DelayNs,
{
    type Error = BusError;
}

impl<R, D> I2c<SevenBitAddress> for Driver<R, D>
where
    R: PinResolver,
    D: DelayNs,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut engine = self.engine()?;

        let empty_read = operations
            .iter()
            .any(|op| matches!(op, Operation::Read(buf) if buf.is_empty()));
        if address > MAX_ADDRESS || empty_read {
            return Err(BusError::InvalidArgument);
        }

        engine.run(|e| e.transfer(address, operations))
    }
}

impl<'a, L, D> Engine<'a, L, D>
where
    L: OpenDrainLine,
    D: DelayNs,
{
    /// Run a sequence of reads and writes as one transaction
    ///
    /// An empty sequence is an address-only write.
    pub fn transfer(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        self.begin()?;

        if operations.is_empty() {
            self.send_address(address, Direction::Write, Counter::AddressNacks, BusError::NackAddress)?;
            return self.stop();
        }

        let mut current: Option<Direction> = None;
        for index in 0..operations.len() {
            let direction = match operations[index] {
                Operation::Read(_) => Direction::Read,
                Operation::Write(_) => Direction::Write,
            };
            let next_is_read = matches!(operations.get(index + 1), Some(Operation::Read(_)));

            if current != Some(direction) {
                if current.is_some() {
                    self.repeated_start()?;
                    self.send_address(
                        address,
                        direction,
                        Counter::RepeatedStartNacks,
                        BusError::NackRepeatedStart,
                    )?;
                } else {
                    self.send_address(address, direction, Counter::AddressNacks, BusError::NackAddress)?;
                }
                current = Some(direction);
            }

            match &mut operations[index] {
                Operation::Write(bytes) => self.send_data(bytes)?,
                Operation::Read(buf) => self.receive_data(buf, !next_is_read)?,
            }
        }

        self.stop()
    }
}
