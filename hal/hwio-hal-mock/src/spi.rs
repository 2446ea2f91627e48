//! Simulated SPI devices
//!
//! MISO is wired to MOSI: every transfer reads back the bytes it writes.

use std::sync::Arc;

use hwio_core::bus::BusRegistry;
use hwio_core::{IoConfig, IoInstance, IoType, Provider};
use hwio_hal::spi::Mode;
use hwio_hal::{Io, IoError, Spi};

use crate::{wrong_settings, Handle};

/// Provider of loopback SPI devices
#[derive(Debug, Default)]
pub struct MockSpiProvider;

impl MockSpiProvider {
    pub const ID: &'static str = "mock-spi";
}

impl Provider for MockSpiProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::Spi
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .spi()
            .ok_or_else(|| wrong_settings(config, "SPI"))?;
        if settings.baud == 0 {
            return Err(IoError::invalid_config(format!(
                "'{}': SPI baud rate must be positive",
                config.id()
            ))
            .into());
        }
        let spi: Arc<dyn Spi> = Arc::new(MockSpi {
            handle: Handle::new(config),
            bus: settings.bus,
            channel: settings.channel,
            mode: settings.mode,
        });
        Ok(spi.into())
    }
}

struct MockSpi {
    handle: Handle,
    bus: u8,
    channel: u8,
    mode: Mode,
}

impl Io for MockSpi {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockSpiProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        self.handle.close();
        Ok(())
    }
}

impl Spi for MockSpi {
    fn bus(&self) -> u8 {
        self.bus
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn transfer(&self, read: &mut [u8], write: &[u8]) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        for (i, byte) in read.iter_mut().enumerate() {
            *byte = write.get(i).copied().unwrap_or(0);
        }
        Ok(())
    }
}
