//! PWM abstractions

use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{IoError, ParseValueError};
use crate::io::Io;

/// How the waveform is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PwmType {
    /// Timed in software
    #[default]
    Software,
    /// Dedicated hardware channel
    Hardware,
}

impl FromStr for PwmType {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software" | "soft" | "sw" => Ok(PwmType::Software),
            "hardware" | "hard" | "hw" => Ok(PwmType::Hardware),
            _ => Err(ParseValueError::new("PWM type", s)),
        }
    }
}

/// PWM settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PwmSettings {
    /// Pin address
    pub address: u32,
    /// Generator type
    pub pwm_type: PwmType,
    /// Frequency in Hz
    pub frequency: u32,
    /// Duty cycle in percent (0.0 - 100.0)
    pub duty_cycle: f32,
    /// Duty cycle applied and switched on at creation
    pub initial: Option<f32>,
    /// Duty cycle left on the pin at shutdown (0.0 switches it off)
    pub shutdown: Option<f32>,
}

impl Default for PwmSettings {
    fn default() -> Self {
        Self {
            address: 0,
            pwm_type: PwmType::Software,
            frequency: 100,
            duty_cycle: 50.0,
            initial: None,
            shutdown: None,
        }
    }
}

/// Pulse-width modulated output
pub trait Pwm: Io {
    /// Pin address
    fn address(&self) -> u32;

    /// Generator type
    fn pwm_type(&self) -> PwmType;

    /// Start generating with the current frequency and duty cycle
    fn on(&self) -> Result<(), IoError>;

    /// Stop generating
    fn off(&self) -> Result<(), IoError>;

    /// Check if the output is running
    fn is_on(&self) -> bool;

    /// Frequency in Hz
    fn frequency(&self) -> u32;

    /// Change the frequency
    fn set_frequency(&self, hz: u32) -> Result<(), IoError>;

    /// Duty cycle in percent
    fn duty_cycle(&self) -> f32;

    /// Change the duty cycle; fails outside 0.0 - 100.0
    fn set_duty_cycle(&self, percent: f32) -> Result<(), IoError>;
}

/// Validate a duty cycle percentage
pub fn check_duty_cycle(percent: f32) -> Result<f32, IoError> {
    if (0.0..=100.0).contains(&percent) {
        Ok(percent)
    } else {
        Err(IoError::out_of_range("duty cycle", percent as i64, 0, 100))
    }
}
