//! Serial port abstractions

use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{IoError, ParseValueError};
use crate::io::Io;

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl FromStr for DataBits {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5" => Ok(DataBits::Five),
            "6" => Ok(DataBits::Six),
            "7" => Ok(DataBits::Seven),
            "8" => Ok(DataBits::Eight),
            _ => Err(ParseValueError::new("data bits", s)),
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl FromStr for Parity {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "even" | "e" => Ok(Parity::Even),
            "odd" | "o" => Ok(Parity::Odd),
            "mark" | "m" => Ok(Parity::Mark),
            "space" | "s" => Ok(Parity::Space),
            _ => Err(ParseValueError::new("parity", s)),
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl FromStr for StopBits {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StopBits::One),
            "2" => Ok(StopBits::Two),
            _ => Err(ParseValueError::new("stop bits", s)),
        }
    }
}

/// Flow control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

impl FromStr for FlowControl {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(FlowControl::None),
            "hardware" | "rts/cts" | "rtscts" => Ok(FlowControl::Hardware),
            "software" | "xon/xoff" | "xonxoff" => Ok(FlowControl::Software),
            _ => Err(ParseValueError::new("flow control", s)),
        }
    }
}

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SerialSettings {
    /// Device path or port name
    pub device: String,
    /// Baud rate in bits per second
    pub baud: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Flow control
    pub flow_control: FlowControl,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device: "/dev/ttyS0".into(),
            baud: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

/// Serial port
pub trait Serial: Io {
    /// Device path or port name
    fn device(&self) -> &str;

    /// Baud rate
    fn baud(&self) -> u32;

    /// Write data to the port
    fn write(&self, data: &[u8]) -> Result<usize, IoError>;

    /// Read available data into `buf`, returning the number of bytes read
    fn read(&self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Number of bytes waiting to be read
    fn available(&self) -> Result<usize, IoError>;

    /// Flush any buffered data
    fn flush(&self) -> Result<(), IoError> {
        Ok(())
    }

    /// Read a single byte, if one is waiting
    fn read_byte(&self) -> Result<Option<u8>, IoError> {
        let mut buf = [0u8; 1];
        match self.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}
