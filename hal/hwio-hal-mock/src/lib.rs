//! In-memory HAL for the hwio runtime
//!
//! This crate provides one simulated provider per I/O type, bundled as the
//! `mock` platform. Nothing touches real hardware:
//!
//! - Digital and analog inputs read levels injected through their provider
//! - Outputs and PWM channels keep their state in memory
//! - Digital and analog instances notify their listeners when a reading or
//!   a written value changes
//! - I2C devices are 256-byte register files shared per bus/address, and
//!   every transaction goes through the context's bus arbiter
//! - SPI and serial ports loop written bytes back
//!
//! Register everything at once with [`MockPlugin`].

#![deny(unsafe_code)]

pub mod analog;
pub mod gpio;
pub mod i2c;
pub mod platform;
pub mod pwm;
pub mod serial;
pub mod spi;

use std::sync::atomic::{AtomicBool, Ordering};

use hwio_core::IoConfig;
use hwio_hal::IoError;

pub use analog::{MockAnalogInputProvider, MockAnalogOutputProvider};
pub use gpio::{
    MockDigitalInputProvider, MockDigitalMultipurposeProvider, MockDigitalOutputProvider,
};
pub use i2c::MockI2cProvider;
pub use platform::{MockPlatform, MockPlugin, MOCK_ENABLED_PROPERTY, MOCK_PLATFORM_ID};
pub use pwm::MockPwmProvider;
pub use serial::MockSerialProvider;
pub use spi::MockSpiProvider;

/// Identity and open/closed state shared by every mock instance
#[derive(Debug)]
struct Handle {
    id: String,
    name: String,
    closed: AtomicBool,
}

impl Handle {
    fn new(config: &IoConfig) -> Self {
        Self {
            id: config.id().to_string(),
            name: config.name().to_string(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), IoError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IoError::Closed(self.id.clone()));
        }
        Ok(())
    }

    /// Mark closed; true only for the first call
    fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// Error for settings of the wrong I/O type
fn wrong_settings(config: &IoConfig, expected: &str) -> IoError {
    IoError::invalid_config(format!(
        "'{}' carries {} settings, expected {expected}",
        config.id(),
        config.io_type()
    ))
}
