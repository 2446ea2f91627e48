//! Simulated serial ports
//!
//! TX is wired to RX: written bytes become readable, in order.

use std::collections::VecDeque;
use std::sync::Arc;

use hwio_core::bus::BusRegistry;
use hwio_core::{IoConfig, IoInstance, IoType, Provider};
use hwio_hal::{Io, IoError, Serial};
use parking_lot::Mutex;

use crate::{wrong_settings, Handle};

/// Receive buffer capacity; older bytes are dropped once full
const RX_CAPACITY: usize = 4096;

/// Provider of loopback serial ports
#[derive(Debug, Default)]
pub struct MockSerialProvider;

impl MockSerialProvider {
    pub const ID: &'static str = "mock-serial";
}

impl Provider for MockSerialProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::Serial
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .serial()
            .ok_or_else(|| wrong_settings(config, "serial"))?;
        let port: Arc<dyn Serial> = Arc::new(MockSerial {
            handle: Handle::new(config),
            device: settings.device.clone(),
            baud: settings.baud,
            rx: Mutex::new(VecDeque::new()),
        });
        Ok(port.into())
    }
}

struct MockSerial {
    handle: Handle,
    device: String,
    baud: u32,
    rx: Mutex<VecDeque<u8>>,
}

impl Io for MockSerial {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockSerialProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        if self.handle.close() {
            self.rx.lock().clear();
        }
        Ok(())
    }
}

impl Serial for MockSerial {
    fn device(&self) -> &str {
        &self.device
    }

    fn baud(&self) -> u32 {
        self.baud
    }

    fn write(&self, data: &[u8]) -> Result<usize, IoError> {
        self.handle.ensure_open()?;
        let mut rx = self.rx.lock();
        rx.extend(data);
        let overflow = rx.len().saturating_sub(RX_CAPACITY);
        if overflow > 0 {
            rx.drain(..overflow);
            tracing::warn!(
                device = %self.device,
                dropped = overflow,
                "serial receive buffer overflow"
            );
        }
        Ok(data.len())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, IoError> {
        self.handle.ensure_open()?;
        let mut rx = self.rx.lock();
        let n = buf.len().min(rx.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn available(&self) -> Result<usize, IoError> {
        self.handle.ensure_open()?;
        Ok(self.rx.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwio_core::bus::BusSettings;
    use hwio_hal::serial::SerialSettings;

    fn port() -> Arc<dyn Serial> {
        let config = IoConfig::builder("console")
            .build(SerialSettings {
                device: "/dev/ttyAMA0".into(),
                baud: 9600,
                ..SerialSettings::default()
            })
            .unwrap();
        MockSerialProvider
            .create(&config, &BusRegistry::new(BusSettings::default()))
            .unwrap()
            .into_serial()
            .unwrap()
    }

    #[test]
    fn test_loopback_in_order() {
        let port = port();
        assert_eq!(port.device(), "/dev/ttyAMA0");
        assert_eq!(port.baud(), 9600);

        assert_eq!(port.write(b"hello").unwrap(), 5);
        assert_eq!(port.available().unwrap(), 5);
        let mut buf = [0u8; 3];
        assert_eq!(port.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(port.read_byte().unwrap(), Some(b'l'));
        assert_eq!(port.read_byte().unwrap(), Some(b'o'));
        assert_eq!(port.read_byte().unwrap(), None);
    }

    #[test]
    fn test_overflow_keeps_newest_bytes() {
        let port = port();
        let data: Vec<u8> = (0..RX_CAPACITY + 10).map(|i| i as u8).collect();
        port.write(&data).unwrap();
        assert_eq!(port.available().unwrap(), RX_CAPACITY);
        assert_eq!(port.read_byte().unwrap(), Some(10));
    }

    #[test]
    fn test_closed_port() {
        let port = port();
        port.write(b"x").unwrap();
        port.shutdown().unwrap();
        assert!(matches!(port.available(), Err(IoError::Closed(_))));
    }
}
