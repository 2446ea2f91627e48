//! Analog I/O abstractions
//!
//! Analog values are plain integers in a configured inclusive range
//! (raw ADC counts, DAC codes, ...).

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::IoError;
use crate::io::Io;
use crate::listener::ListenerId;

/// Inclusive value range of an analog channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalogRange {
    pub min: i32,
    pub max: i32,
}

impl AnalogRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Check if `value` lies within the range
    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Fail with [`IoError::OutOfRange`] unless `value` is in range
    pub fn check(&self, what: &'static str, value: i32) -> Result<i32, IoError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(IoError::out_of_range(
                what,
                value.into(),
                self.min.into(),
                self.max.into(),
            ))
        }
    }

    /// Position of `value` in the range, as a fraction in `0.0..=1.0`
    pub fn fraction(&self, value: i32) -> f32 {
        let span = (self.max - self.min) as f32;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) as f32 / span).clamp(0.0, 1.0)
    }
}

impl Default for AnalogRange {
    fn default() -> Self {
        // 16-bit unsigned, the widest common converter resolution
        Self::new(0, u16::MAX as i32)
    }
}

/// Value change reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogValueChange {
    pub value: i32,
    pub previous: i32,
}

/// Callback for [`AnalogValueChange`] events
pub type AnalogListener = dyn Fn(AnalogValueChange) + Send + Sync;

/// Analog input settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalogInputSettings {
    /// Channel address
    pub address: u32,
    /// Value range reported by the channel
    pub range: AnalogRange,
}

/// Analog output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalogOutputSettings {
    /// Channel address
    pub address: u32,
    /// Accepted value range
    pub range: AnalogRange,
    /// Value applied when the instance is created
    pub initial: Option<i32>,
    /// Value applied when the instance is shut down
    pub shutdown: Option<i32>,
}

/// Analog input channel
pub trait AnalogInput: Io {
    /// Channel address
    fn address(&self) -> u32;

    /// Configured range
    fn range(&self) -> AnalogRange;

    /// Sample the channel
    fn value(&self) -> Result<i32, IoError>;

    /// Register a callback for value changes
    fn add_listener(&self, _listener: Arc<AnalogListener>) -> Result<ListenerId, IoError> {
        Err(IoError::Unsupported("analog value listeners"))
    }

    /// Unregister a callback; false if it was not registered
    fn remove_listener(&self, _id: ListenerId) -> bool {
        false
    }
}

/// Analog output channel
pub trait AnalogOutput: Io {
    /// Channel address
    fn address(&self) -> u32;

    /// Configured range
    fn range(&self) -> AnalogRange;

    /// Last value written
    fn value(&self) -> Result<i32, IoError>;

    /// Write a value; fails with [`IoError::OutOfRange`] outside the range
    fn set_value(&self, value: i32) -> Result<(), IoError>;

    /// Register a callback for value changes
    fn add_listener(&self, _listener: Arc<AnalogListener>) -> Result<ListenerId, IoError> {
        Err(IoError::Unsupported("analog value listeners"))
    }

    /// Unregister a callback; false if it was not registered
    fn remove_listener(&self, _id: ListenerId) -> bool {
        false
    }
}
