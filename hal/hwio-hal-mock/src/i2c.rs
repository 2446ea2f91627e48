//! Simulated I2C devices
//!
//! Every device is a 256-byte register file with an auto-incrementing
//! register pointer. The first byte written in a transaction selects the
//! register; further written bytes are stored from there on, reads return
//! bytes from there on. Instances created for the same bus and address
//! share one register file, the way two handles to one chip would.

use std::collections::HashMap;
use std::sync::Arc;

use hwio_core::bus::{BusArbiter, BusRegistry};
use hwio_core::{IoConfig, IoInstance, IoType, Provider};
use hwio_hal::i2c::Operation;
use hwio_hal::{I2c, Io, IoError};
use parking_lot::Mutex;

use crate::{wrong_settings, Handle};

/// Highest 10-bit device address
const MAX_DEVICE: u16 = 0x3FF;

#[derive(Debug)]
struct RegisterFile {
    data: [u8; 256],
    pointer: u8,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            data: [0; 256],
            pointer: 0,
        }
    }
}

impl RegisterFile {
    fn apply(&mut self, operations: &mut [Operation<'_>]) {
        let mut select = true;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        if select {
                            self.pointer = byte;
                            select = false;
                        } else {
                            self.data[usize::from(self.pointer)] = byte;
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.data[usize::from(self.pointer)];
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
    }
}

type Registers = Arc<Mutex<RegisterFile>>;

/// Provider of simulated I2C devices
#[derive(Debug, Default)]
pub struct MockI2cProvider {
    devices: Mutex<HashMap<(u8, u16), Registers>>,
}

impl MockI2cProvider {
    pub const ID: &'static str = "mock-i2c";

    pub fn new() -> Self {
        Self::default()
    }

    fn registers(&self, bus: u8, device: u16) -> Registers {
        Arc::clone(self.devices.lock().entry((bus, device)).or_default())
    }

    /// Read a register directly, bypassing the bus
    pub fn peek(&self, bus: u8, device: u16, register: u8) -> u8 {
        self.registers(bus, device).lock().data[usize::from(register)]
    }

    /// Write a register directly, bypassing the bus
    pub fn poke(&self, bus: u8, device: u16, register: u8, value: u8) {
        self.registers(bus, device).lock().data[usize::from(register)] = value;
    }
}

impl Provider for MockI2cProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::I2c
    }

    fn create(&self, config: &IoConfig, buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .i2c()
            .ok_or_else(|| wrong_settings(config, "I2C"))?;
        if settings.device > MAX_DEVICE {
            return Err(IoError::out_of_range(
                "I2C device address",
                settings.device.into(),
                0,
                MAX_DEVICE.into(),
            )
            .into());
        }
        let device: Arc<dyn I2c> = Arc::new(MockI2c {
            handle: Handle::new(config),
            bus: settings.bus,
            device: settings.device,
            arbiter: buses.arbiter(settings.bus),
            registers: self.registers(settings.bus, settings.device),
        });
        Ok(device.into())
    }
}

struct MockI2c {
    handle: Handle,
    bus: u8,
    device: u16,
    arbiter: Arc<BusArbiter>,
    registers: Registers,
}

impl Io for MockI2c {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockI2cProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        self.handle.close();
        Ok(())
    }
}

impl I2c for MockI2c {
    fn bus(&self) -> u8 {
        self.bus
    }

    fn device(&self) -> u16 {
        self.device
    }

    fn transaction(&self, operations: &mut [Operation<'_>]) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        self.arbiter.execute(|| {
            tracing::trace!(
                bus = self.bus,
                device = self.device,
                operations = operations.len(),
                "i2c transaction"
            );
            self.registers.lock().apply(operations);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwio_core::bus::BusSettings;
    use hwio_hal::i2c::I2cSettings;
    use hwio_hal::EmbeddedI2c;

    fn open(
        provider: &MockI2cProvider,
        buses: &BusRegistry,
        id: &str,
        device: u16,
    ) -> Arc<dyn I2c> {
        let config = IoConfig::builder(id).build(I2cSettings::new(1, device)).unwrap();
        provider.create(&config, buses).unwrap().into_i2c().unwrap()
    }

    #[test]
    fn test_register_pointer_semantics() {
        let provider = MockI2cProvider::new();
        let buses = BusRegistry::new(BusSettings::default());
        let dev = open(&provider, &buses, "sensor", 0x48);

        dev.write_register(0x10, &[0xAA, 0xBB]).unwrap();
        assert_eq!(dev.read_register_byte(0x11).unwrap(), 0xBB);

        let mut buf = [0u8; 2];
        dev.read_register(0x10, &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);
        // Pointer kept auto-incrementing past the last read
        dev.read(&mut buf[..1]).unwrap();
        assert_eq!(buf[0], 0x00);

        assert_eq!(provider.peek(1, 0x48, 0x10), 0xAA);
        provider.poke(1, 0x48, 0xFF, 7);
        assert_eq!(dev.read_register_byte(0xFF).unwrap(), 7);
    }

    #[test]
    fn test_same_address_shares_registers() {
        let provider = MockI2cProvider::new();
        let buses = BusRegistry::new(BusSettings::default());
        let a = open(&provider, &buses, "a", 0x20);
        let b = open(&provider, &buses, "b", 0x20);
        let other = open(&provider, &buses, "c", 0x21);

        a.write_register(1, &[42]).unwrap();
        assert_eq!(b.read_register_byte(1).unwrap(), 42);
        assert_eq!(other.read_register_byte(1).unwrap(), 0);
        assert_eq!(buses.buses(), vec![1]);
    }

    #[test]
    fn test_embedded_hal_adapter() {
        use embedded_hal::i2c::I2c as _;

        let provider = MockI2cProvider::new();
        let buses = BusRegistry::new(BusSettings::default());
        let mut bus = EmbeddedI2c(open(&provider, &buses, "eh", 0x40));

        bus.write(0x40, &[0x05, 0x99]).unwrap();
        let mut out = [0u8; 1];
        bus.write_read(0x40, &[0x05], &mut out).unwrap();
        assert_eq!(out, [0x99]);

        let err = bus.write(0x41, &[0x00]).unwrap_err();
        assert!(matches!(err, IoError::Nack { bus: 1, device: 0x41 }));
    }

    #[test]
    fn test_closed_device_and_bad_address() {
        let provider = MockI2cProvider::new();
        let buses = BusRegistry::new(BusSettings::default());
        let dev = open(&provider, &buses, "gone", 0x30);
        dev.shutdown().unwrap();
        assert!(matches!(dev.write(&[0]), Err(IoError::Closed(_))));

        let config = IoConfig::builder("bad").build(I2cSettings::new(0, 0x800)).unwrap();
        assert!(provider.create(&config, &buses).is_err());
    }
}
