//! I/O configuration
//!
//! [`IoConfig`] is the frozen description a provider builds an instance
//! from: identity, optional routing hints (platform, provider) and the
//! type-specific [`IoSettings`].

mod settings;

use hwio_hal::analog::{AnalogInputSettings, AnalogOutputSettings};
use hwio_hal::gpio::{DigitalInputSettings, DigitalMultipurposeSettings, DigitalOutputSettings};
use hwio_hal::i2c::I2cSettings;
use hwio_hal::pwm::PwmSettings;
use hwio_hal::serial::SerialSettings;
use hwio_hal::spi::SpiSettings;

use crate::error::{Error, Result};
use crate::io_type::IoType;
use crate::properties::Properties;

/// Type-specific settings, one variant per [`IoType`]
#[derive(Debug, Clone, PartialEq)]
pub enum IoSettings {
    AnalogInput(AnalogInputSettings),
    AnalogOutput(AnalogOutputSettings),
    DigitalInput(DigitalInputSettings),
    DigitalOutput(DigitalOutputSettings),
    DigitalMultipurpose(DigitalMultipurposeSettings),
    Pwm(PwmSettings),
    I2c(I2cSettings),
    Spi(SpiSettings),
    Serial(SerialSettings),
}

macro_rules! settings_variants {
    ($($variant:ident($ty:ty) => $accessor:ident;)+) => {
        impl IoSettings {
            /// I/O type these settings configure
            pub fn io_type(&self) -> IoType {
                match self {
                    $(IoSettings::$variant(_) => IoType::$variant,)+
                }
            }

            $(
                pub fn $accessor(&self) -> Option<&$ty> {
                    match self {
                        IoSettings::$variant(settings) => Some(settings),
                        _ => None,
                    }
                }
            )+
        }

        $(
            impl From<$ty> for IoSettings {
                fn from(settings: $ty) -> Self {
                    IoSettings::$variant(settings)
                }
            }
        )+
    };
}

settings_variants! {
    AnalogInput(AnalogInputSettings) => analog_input;
    AnalogOutput(AnalogOutputSettings) => analog_output;
    DigitalInput(DigitalInputSettings) => digital_input;
    DigitalOutput(DigitalOutputSettings) => digital_output;
    DigitalMultipurpose(DigitalMultipurposeSettings) => digital_multipurpose;
    Pwm(PwmSettings) => pwm;
    I2c(I2cSettings) => i2c;
    Spi(SpiSettings) => spi;
    Serial(SerialSettings) => serial;
}

impl IoSettings {
    /// Build settings of `io_type` from an instance's inherited properties
    ///
    /// `id` is only used to name offending keys in errors.
    pub fn from_properties(io_type: IoType, id: &str, props: &Properties) -> Result<IoSettings> {
        settings::build(io_type, id, props)
    }
}

/// Frozen configuration of one I/O instance
#[derive(Debug, Clone, PartialEq)]
pub struct IoConfig {
    id: String,
    name: Option<String>,
    description: Option<String>,
    platform: Option<String>,
    provider: Option<String>,
    settings: IoSettings,
}

impl IoConfig {
    /// Start a configuration for `id`
    pub fn builder(id: impl Into<String>) -> IoConfigBuilder {
        IoConfigBuilder {
            id: id.into(),
            name: None,
            description: None,
            platform: None,
            provider: None,
        }
    }

    /// Materialize a configuration from properties inherited under `id`
    ///
    /// `props` are the already-stripped `id.*` entries. `name`,
    /// `description`, `platform` and `provider` fill the identity fields;
    /// everything else feeds the settings of `io_type`.
    pub fn from_properties(id: &str, io_type: IoType, props: &Properties) -> Result<IoConfig> {
        let settings = IoSettings::from_properties(io_type, id, props)?;
        let owned = |key: &str| props.get(key).map(str::to_string);
        let mut builder = IoConfig::builder(id);
        builder.name = owned("name");
        builder.description = owned("description");
        builder.platform = non_blank(owned("platform"));
        builder.provider = non_blank(owned("provider"));
        builder.build(settings)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name (defaults to the id)
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Platform the request is pinned to
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Provider the request is pinned to
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn settings(&self) -> &IoSettings {
        &self.settings
    }

    pub fn io_type(&self) -> IoType {
        self.settings.io_type()
    }

    /// Record where resolution landed
    pub(crate) fn resolved(mut self, platform: Option<&str>, provider: &str) -> Self {
        if let Some(platform) = platform {
            self.platform = Some(platform.to_string());
        }
        self.provider = Some(provider.to_string());
        self
    }
}

/// Builder for [`IoConfig`]
#[derive(Debug, Clone)]
pub struct IoConfigBuilder {
    id: String,
    name: Option<String>,
    description: Option<String>,
    platform: Option<String>,
    provider: Option<String>,
}

impl IoConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Resolve through this platform only; blank clears it
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = non_blank(Some(platform.into()));
        self
    }

    /// Resolve to this provider; blank clears it
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = non_blank(Some(provider.into()));
        self
    }

    /// Freeze the configuration
    ///
    /// The id is trimmed and must not be empty.
    pub fn build(self, settings: impl Into<IoSettings>) -> Result<IoConfig> {
        let id = validate_id(&self.id)?;
        Ok(IoConfig {
            id,
            name: self.name,
            description: self.description,
            platform: self.platform,
            provider: self.provider,
            settings: settings.into(),
        })
    }
}

/// Trimmed value, `None` when blank
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim an id, rejecting blank ones
pub fn validate_id(id: &str) -> Result<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(id.to_string()));
    }
    Ok(trimmed.to_string())
}
