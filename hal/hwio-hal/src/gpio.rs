//! Digital I/O abstractions
//!
//! Traits for digital input, output and multipurpose pins, plus the
//! settings each kind of pin is created with.

use core::ops::Not;
use core::str::FromStr;
use std::sync::Arc;

use embedded_hal::digital::PinState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{IoError, ParseValueError};
use crate::io::Io;
use crate::listener::ListenerId;

/// Logic level of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DigitalState {
    #[default]
    Low,
    High,
}

impl DigitalState {
    pub fn is_high(self) -> bool {
        self == DigitalState::High
    }

    pub fn is_low(self) -> bool {
        self == DigitalState::Low
    }
}

impl Not for DigitalState {
    type Output = DigitalState;

    fn not(self) -> Self::Output {
        match self {
            DigitalState::Low => DigitalState::High,
            DigitalState::High => DigitalState::Low,
        }
    }
}

impl From<bool> for DigitalState {
    fn from(high: bool) -> Self {
        if high {
            DigitalState::High
        } else {
            DigitalState::Low
        }
    }
}

impl From<PinState> for DigitalState {
    fn from(state: PinState) -> Self {
        match state {
            PinState::Low => DigitalState::Low,
            PinState::High => DigitalState::High,
        }
    }
}

impl From<DigitalState> for PinState {
    fn from(state: DigitalState) -> Self {
        match state {
            DigitalState::Low => PinState::Low,
            DigitalState::High => PinState::High,
        }
    }
}

impl FromStr for DigitalState {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "1" | "on" | "true" => Ok(DigitalState::High),
            "low" | "0" | "off" | "false" => Ok(DigitalState::Low),
            _ => Err(ParseValueError::new("digital state", s)),
        }
    }
}

/// Internal pull resistor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PullResistance {
    #[default]
    Off,
    PullDown,
    PullUp,
}

impl FromStr for PullResistance {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "off" | "none" => Ok(PullResistance::Off),
            "down" | "pulldown" => Ok(PullResistance::PullDown),
            "up" | "pullup" => Ok(PullResistance::PullUp),
            _ => Err(ParseValueError::new("pull resistance", s)),
        }
    }
}

/// Direction of a multipurpose pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DigitalMode {
    #[default]
    Input,
    Output,
}

impl FromStr for DigitalMode {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" | "in" => Ok(DigitalMode::Input),
            "output" | "out" => Ok(DigitalMode::Output),
            _ => Err(ParseValueError::new("digital mode", s)),
        }
    }
}

/// Level transition reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigitalStateChange {
    pub state: DigitalState,
    pub previous: DigitalState,
}

/// Callback for [`DigitalStateChange`] events
pub type DigitalListener = dyn Fn(DigitalStateChange) + Send + Sync;

/// Digital input settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitalInputSettings {
    /// Pin address (BCM number, line offset, ...)
    pub address: u32,
    /// Pull resistor
    pub pull: PullResistance,
    /// Debounce interval in microseconds (0 = disabled)
    pub debounce_us: u64,
}

/// Digital output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitalOutputSettings {
    /// Pin address
    pub address: u32,
    /// State applied when the instance is created
    pub initial: Option<DigitalState>,
    /// State applied when the instance is shut down
    pub shutdown: Option<DigitalState>,
    /// Level that counts as "on"
    pub on_state: DigitalState,
}

impl DigitalOutputSettings {
    /// Create settings for an active-high output at `address`
    pub const fn new(address: u32) -> Self {
        Self {
            address,
            initial: None,
            shutdown: None,
            on_state: DigitalState::High,
        }
    }
}

/// Digital multipurpose settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitalMultipurposeSettings {
    /// Pin address
    pub address: u32,
    /// Initial direction
    pub mode: DigitalMode,
    /// Pull resistor (input mode)
    pub pull: PullResistance,
}

/// Digital input pin
pub trait DigitalInput: Io {
    /// Pin address
    fn address(&self) -> u32;

    /// Read the current level
    fn state(&self) -> Result<DigitalState, IoError>;

    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> Result<bool, IoError> {
        self.state().map(DigitalState::is_high)
    }

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> Result<bool, IoError> {
        self.state().map(DigitalState::is_low)
    }

    /// Register a callback for level changes
    fn add_listener(&self, _listener: Arc<DigitalListener>) -> Result<ListenerId, IoError> {
        Err(IoError::Unsupported("digital state listeners"))
    }

    /// Unregister a callback; false if it was not registered
    fn remove_listener(&self, _id: ListenerId) -> bool {
        false
    }
}

/// Digital output pin
pub trait DigitalOutput: Io {
    /// Pin address
    fn address(&self) -> u32;

    /// Drive the pin to `state`
    fn set_state(&self, state: DigitalState) -> Result<(), IoError>;

    /// Current driven level
    fn state(&self) -> Result<DigitalState, IoError>;

    /// Set the pin high (logic 1)
    fn high(&self) -> Result<(), IoError> {
        self.set_state(DigitalState::High)
    }

    /// Set the pin low (logic 0)
    fn low(&self) -> Result<(), IoError> {
        self.set_state(DigitalState::Low)
    }

    /// Toggle the pin state
    fn toggle(&self) -> Result<(), IoError> {
        let next = !self.state()?;
        self.set_state(next)
    }

    /// Check if the pin is currently set high
    fn is_high(&self) -> Result<bool, IoError> {
        self.state().map(DigitalState::is_high)
    }

    /// Register a callback for changes of the driven level
    ///
    /// Writing the level the pin already has is not a change.
    fn add_listener(&self, _listener: Arc<DigitalListener>) -> Result<ListenerId, IoError> {
        Err(IoError::Unsupported("digital state listeners"))
    }

    /// Unregister a callback; false if it was not registered
    fn remove_listener(&self, _id: ListenerId) -> bool {
        false
    }
}

/// Pin that can switch between input and output at runtime
pub trait DigitalMultipurpose: Io {
    /// Pin address
    fn address(&self) -> u32;

    /// Current direction
    fn mode(&self) -> DigitalMode;

    /// Switch direction
    fn set_mode(&self, mode: DigitalMode) -> Result<(), IoError>;

    /// Read the current level (either direction)
    fn state(&self) -> Result<DigitalState, IoError>;

    /// Drive the pin; fails unless the pin is in output mode
    fn set_state(&self, state: DigitalState) -> Result<(), IoError>;

    /// Register a callback for level changes
    fn add_listener(&self, _listener: Arc<DigitalListener>) -> Result<ListenerId, IoError> {
        Err(IoError::Unsupported("digital state listeners"))
    }

    /// Unregister a callback; false if it was not registered
    fn remove_listener(&self, _id: ListenerId) -> bool {
        false
    }
}
