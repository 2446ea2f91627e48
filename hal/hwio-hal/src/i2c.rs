//! I2C device abstractions
//!
//! An [`I2c`] instance is one device address on a shared bus. Every
//! transaction holds the bus lock for its whole duration, so a
//! write-then-read sequence issued through [`I2c::write_read`] is never
//! interleaved with another device's traffic.

pub use embedded_hal::i2c::Operation;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::IoError;
use crate::io::Io;

/// I2C device settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct I2cSettings {
    /// Bus number
    pub bus: u8,
    /// 7-bit (or 10-bit) device address
    pub device: u16,
}

impl I2cSettings {
    pub const fn new(bus: u8, device: u16) -> Self {
        Self { bus, device }
    }
}

/// Device on an I2C bus
pub trait I2c: Io {
    /// Bus number
    fn bus(&self) -> u8;

    /// Device address
    fn device(&self) -> u16;

    /// Run `operations` as one transaction under the bus lock
    fn transaction(&self, operations: &mut [Operation<'_>]) -> Result<(), IoError>;

    /// Write bytes to the device
    fn write(&self, data: &[u8]) -> Result<(), IoError> {
        self.transaction(&mut [Operation::Write(data)])
    }

    /// Read bytes from the device
    fn read(&self, buf: &mut [u8]) -> Result<(), IoError> {
        self.transaction(&mut [Operation::Read(buf)])
    }

    /// Write then read in a single transaction (repeated start)
    fn write_read(&self, write: &[u8], read: &mut [u8]) -> Result<(), IoError> {
        self.transaction(&mut [Operation::Write(write), Operation::Read(read)])
    }

    /// Write `data` starting at register `register`
    fn write_register(&self, register: u8, data: &[u8]) -> Result<(), IoError> {
        self.transaction(&mut [Operation::Write(&[register]), Operation::Write(data)])
    }

    /// Read `buf.len()` bytes starting at register `register`
    fn read_register(&self, register: u8, buf: &mut [u8]) -> Result<(), IoError> {
        self.write_read(&[register], buf)
    }

    /// Read a single register byte
    fn read_register_byte(&self, register: u8) -> Result<u8, IoError> {
        let mut buf = [0u8; 1];
        self.read_register(register, &mut buf)?;
        Ok(buf[0])
    }
}

/// Adapter exposing an [`I2c`] device to `embedded-hal` drivers
///
/// Wraps anything that dereferences to an [`I2c`] (`&dyn I2c`,
/// `Arc<dyn I2c>`, ...). The address a driver passes must be the device's
/// own address; any other address is reported as a NACK.
#[derive(Debug, Clone)]
pub struct EmbeddedI2c<D>(pub D);

impl<D> embedded_hal::i2c::ErrorType for EmbeddedI2c<D> {
    type Error = IoError;
}

impl<D> embedded_hal::i2c::I2c for EmbeddedI2c<D>
where
    D: core::ops::Deref,
    D::Target: I2c,
{
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if u16::from(address) != self.0.device() {
            return Err(IoError::Nack {
                bus: self.0.bus(),
                device: address.into(),
            });
        }
        self.0.transaction(operations)
    }
}
