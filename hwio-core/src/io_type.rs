//! I/O type table
//!
//! The closed set of I/O capabilities the runtime can resolve. Each
//! variant pairs with one capability trait in `hwio-hal`, one
//! [`IoSettings`](crate::config::IoSettings) variant and one
//! [`IoInstance`](crate::io::IoInstance) variant.

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};

/// I/O capability
///
/// Declaration order is significant: every reverse lookup scans
/// [`IoType::ALL`] front to back and takes the first match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoType {
    AnalogInput,
    AnalogOutput,
    DigitalInput,
    DigitalOutput,
    DigitalMultipurpose,
    Pwm,
    I2c,
    Spi,
    Serial,
}

impl IoType {
    /// All I/O types in declaration order
    pub const ALL: [IoType; 9] = [
        IoType::AnalogInput,
        IoType::AnalogOutput,
        IoType::DigitalInput,
        IoType::DigitalOutput,
        IoType::DigitalMultipurpose,
        IoType::Pwm,
        IoType::I2c,
        IoType::Spi,
        IoType::Serial,
    ];

    /// Canonical name
    pub const fn name(self) -> &'static str {
        match self {
            IoType::AnalogInput => "ANALOG_INPUT",
            IoType::AnalogOutput => "ANALOG_OUTPUT",
            IoType::DigitalInput => "DIGITAL_INPUT",
            IoType::DigitalOutput => "DIGITAL_OUTPUT",
            IoType::DigitalMultipurpose => "DIGITAL_MULTIPURPOSE",
            IoType::Pwm => "PWM",
            IoType::I2c => "I2C",
            IoType::Spi => "SPI",
            IoType::Serial => "SERIAL",
        }
    }

    /// Name of the `hwio-hal` trait instances of this type implement
    pub const fn capability(self) -> &'static str {
        match self {
            IoType::AnalogInput => "AnalogInput",
            IoType::AnalogOutput => "AnalogOutput",
            IoType::DigitalInput => "DigitalInput",
            IoType::DigitalOutput => "DigitalOutput",
            IoType::DigitalMultipurpose => "DigitalMultipurpose",
            IoType::Pwm => "Pwm",
            IoType::I2c => "I2c",
            IoType::Spi => "Spi",
            IoType::Serial => "Serial",
        }
    }

    /// Parse a canonical name or a tolerant alias
    ///
    /// The canonical name is matched case-sensitively first. Otherwise the
    /// input is lower-cased, `.`, `-`, `_` and spaces are dropped, and the
    /// remainder is matched against the alias table (`din`, `dout`,
    /// `analog input`, `i²c`, `uart`, `rs232`, ...). Unknown strings are an
    /// error; there is no fallback type.
    pub fn parse(s: &str) -> Result<IoType> {
        if let Some(io_type) = IoType::ALL.iter().find(|t| t.name() == s) {
            return Ok(*io_type);
        }

        let compact: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '.' | '-' | '_' | ' '))
            .collect();

        let io_type = match compact.as_str() {
            "ain" => IoType::AnalogInput,
            "aout" => IoType::AnalogOutput,
            "din" => IoType::DigitalInput,
            "dout" => IoType::DigitalOutput,
            "dmulti" | "dmultipurpose" => IoType::DigitalMultipurpose,
            "pwm" => IoType::Pwm,
            "i2c" | "i²c" | "interintegratedcircuit" => IoType::I2c,
            "spi" | "serialperipheralinterface" => IoType::Spi,
            "serial" | "uart" | "rs232" => IoType::Serial,
            c if c.starts_with("analogi") => IoType::AnalogInput,
            c if c.starts_with("analogo") => IoType::AnalogOutput,
            c if c.starts_with("digitali") => IoType::DigitalInput,
            c if c.starts_with("digitalo") => IoType::DigitalOutput,
            c if c.starts_with("digitalm") => IoType::DigitalMultipurpose,
            c if c.starts_with("pulsewidth") => IoType::Pwm,
            _ => return Err(Error::UnknownIoType(s.to_string())),
        };
        Ok(io_type)
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IoType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        IoType::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for IoType {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for IoType {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> core::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        IoType::parse(&s).map_err(serde::de::Error::custom)
    }
}
