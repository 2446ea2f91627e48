//! Realized I/O instances
//!
//! Providers hand back an [`IoInstance`]: one variant per [`IoType`], each
//! holding the shared capability object. Cloning an instance clones the
//! `Arc`, so every clone refers to the same underlying I/O.

use core::fmt;
use std::sync::Arc;

use hwio_hal::{
    AnalogInput, AnalogOutput, DigitalInput, DigitalMultipurpose, DigitalOutput, I2c, IoError,
    Pwm, Serial, Spi,
};

use crate::io_type::IoType;

/// A shared, type-tagged I/O instance
#[derive(Clone)]
pub enum IoInstance {
    AnalogInput(Arc<dyn AnalogInput>),
    AnalogOutput(Arc<dyn AnalogOutput>),
    DigitalInput(Arc<dyn DigitalInput>),
    DigitalOutput(Arc<dyn DigitalOutput>),
    DigitalMultipurpose(Arc<dyn DigitalMultipurpose>),
    Pwm(Arc<dyn Pwm>),
    I2c(Arc<dyn I2c>),
    Spi(Arc<dyn Spi>),
    Serial(Arc<dyn Serial>),
}

macro_rules! instance_variants {
    ($($variant:ident($tr:ident) => $as_fn:ident, $into_fn:ident;)+) => {
        impl IoInstance {
            /// I/O type of this instance
            pub fn io_type(&self) -> IoType {
                match self {
                    $(IoInstance::$variant(_) => IoType::$variant,)+
                }
            }

            pub fn id(&self) -> &str {
                match self {
                    $(IoInstance::$variant(io) => io.id(),)+
                }
            }

            pub fn name(&self) -> &str {
                match self {
                    $(IoInstance::$variant(io) => io.name(),)+
                }
            }

            /// Id of the provider that built this instance
            pub fn provider_id(&self) -> &str {
                match self {
                    $(IoInstance::$variant(io) => io.provider_id(),)+
                }
            }

            /// Release the underlying I/O
            pub fn shutdown(&self) -> Result<(), IoError> {
                match self {
                    $(IoInstance::$variant(io) => io.shutdown(),)+
                }
            }

            /// Check if both handles refer to the same instance
            pub fn ptr_eq(&self, other: &IoInstance) -> bool {
                match (self, other) {
                    $((IoInstance::$variant(a), IoInstance::$variant(b)) => Arc::ptr_eq(a, b),)+
                    _ => false,
                }
            }

            $(
                pub fn $as_fn(&self) -> Option<&Arc<dyn $tr>> {
                    match self {
                        IoInstance::$variant(io) => Some(io),
                        _ => None,
                    }
                }

                pub fn $into_fn(self) -> Option<Arc<dyn $tr>> {
                    match self {
                        IoInstance::$variant(io) => Some(io),
                        _ => None,
                    }
                }
            )+
        }

        $(
            impl From<Arc<dyn $tr>> for IoInstance {
                fn from(io: Arc<dyn $tr>) -> Self {
                    IoInstance::$variant(io)
                }
            }
        )+
    };
}

instance_variants! {
    AnalogInput(AnalogInput) => as_analog_input, into_analog_input;
    AnalogOutput(AnalogOutput) => as_analog_output, into_analog_output;
    DigitalInput(DigitalInput) => as_digital_input, into_digital_input;
    DigitalOutput(DigitalOutput) => as_digital_output, into_digital_output;
    DigitalMultipurpose(DigitalMultipurpose) => as_digital_multipurpose, into_digital_multipurpose;
    Pwm(Pwm) => as_pwm, into_pwm;
    I2c(I2c) => as_i2c, into_i2c;
    Spi(Spi) => as_spi, into_spi;
    Serial(Serial) => as_serial, into_serial;
}

impl fmt::Debug for IoInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoInstance")
            .field("io_type", &format_args!("{}", self.io_type()))
            .field("id", &self.id())
            .field("provider", &self.provider_id())
            .finish()
    }
}
