//! Error types shared by providers and the runtime

use std::time::Duration;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use thiserror::Error;

/// Errors raised while acquiring a shared bus
///
/// Timeouts and interruptions are kept apart so callers can retry the
/// former but not the latter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// Lock not acquired within the configured timeout
    #[error("I2C bus {bus} is busy: lock not acquired within {timeout:?}")]
    Timeout { bus: u8, timeout: Duration },

    /// Waiter was woken by an interrupt or by runtime shutdown
    #[error("interrupted while waiting for the lock on I2C bus {bus}")]
    Interrupted { bus: u8 },
}

impl BusError {
    /// Bus number the error refers to
    pub fn bus(&self) -> u8 {
        match self {
            BusError::Timeout { bus, .. } | BusError::Interrupted { bus } => *bus,
        }
    }
}

/// Errors raised by I/O instances and provider factories
#[derive(Debug, Error)]
pub enum IoError {
    /// Value outside the configured range
    #[error("{what} value {value} is outside {min}..={max}")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Device did not acknowledge its address
    #[error("device 0x{device:02X} did not acknowledge on I2C bus {bus}")]
    Nack { bus: u8, device: u16 },

    /// Instance was shut down and refuses further operations
    #[error("I/O instance '{0}' has been shut down")]
    Closed(String),

    /// Settings handed to a provider do not fit its I/O type
    #[error("invalid I/O configuration: {0}")]
    InvalidConfig(String),

    /// Operation is not implemented by this provider
    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),

    /// Shared bus could not be acquired
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl IoError {
    /// Creates an out-of-range error.
    pub fn out_of_range(what: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            what,
            value,
            min,
            max,
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl embedded_hal::i2c::Error for IoError {
    fn kind(&self) -> ErrorKind {
        match self {
            IoError::Nack { .. } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            IoError::Bus(_) => ErrorKind::ArbitrationLoss,
            _ => ErrorKind::Other,
        }
    }
}

/// A property string that does not parse into the expected value type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value '{value}'")]
pub struct ParseValueError {
    /// Name of the expected value type
    pub kind: &'static str,
    /// Offending input
    pub value: String,
}

impl ParseValueError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
