//! SPI device abstractions

use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{IoError, ParseValueError};
use crate::io::Io;

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

impl FromStr for Mode {
    type Err = ParseValueError;

    /// Accepts `0`-`3` or `mode0`-`mode3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.strip_prefix("mode").unwrap_or(&lower).trim() {
            "0" => Ok(Mode::Mode0),
            "1" => Ok(Mode::Mode1),
            "2" => Ok(Mode::Mode2),
            "3" => Ok(Mode::Mode3),
            _ => Err(ParseValueError::new("SPI mode", s)),
        }
    }
}

/// SPI device settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiSettings {
    /// Bus number
    pub bus: u8,
    /// Chip-select channel
    pub channel: u8,
    /// Clock frequency in Hz
    pub baud: u32,
    /// Clock mode
    pub mode: Mode,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            bus: 0,
            channel: 0,
            baud: 1_000_000, // 1 MHz
            mode: Mode::Mode0,
        }
    }
}

/// SPI device (one chip-select channel)
pub trait Spi: Io {
    /// Bus number
    fn bus(&self) -> u8;

    /// Chip-select channel
    fn channel(&self) -> u8;

    /// Clock mode
    fn mode(&self) -> Mode;

    /// Transfer data (simultaneous read/write)
    ///
    /// Writes data from `write` buffer while reading into `read` buffer.
    /// Both buffers must be the same length.
    fn transfer(&self, read: &mut [u8], write: &[u8]) -> Result<(), IoError>;

    /// Write data, discarding what is read back
    fn write(&self, data: &[u8]) -> Result<(), IoError> {
        let mut sink = vec![0u8; data.len()];
        self.transfer(&mut sink, data)
    }

    /// Read data (writes zeros)
    fn read(&self, buf: &mut [u8]) -> Result<(), IoError> {
        let zeros = vec![0u8; buf.len()];
        self.transfer(buf, &zeros)
    }
}
