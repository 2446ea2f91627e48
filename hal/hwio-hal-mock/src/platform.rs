//! The `mock` platform and its plugin

use hwio_core::{IoType, Platform, Plugin, PluginService, Properties, Result};

use crate::analog::{MockAnalogInputProvider, MockAnalogOutputProvider};
use crate::gpio::{
    MockDigitalInputProvider, MockDigitalMultipurposeProvider, MockDigitalOutputProvider,
};
use crate::i2c::MockI2cProvider;
use crate::pwm::MockPwmProvider;
use crate::serial::MockSerialProvider;
use crate::spi::MockSpiProvider;

pub const MOCK_PLATFORM_ID: &str = "mock";

/// Setting this property to `false` keeps the mock platform out of a context
pub const MOCK_ENABLED_PROPERTY: &str = "hwio.mock.enabled";

/// Every mock provider id, in the order the platform prefers them
const PROVIDER_IDS: [&str; 9] = [
    MockAnalogInputProvider::ID,
    MockAnalogOutputProvider::ID,
    MockDigitalInputProvider::ID,
    MockDigitalOutputProvider::ID,
    MockDigitalMultipurposeProvider::ID,
    MockPwmProvider::ID,
    MockI2cProvider::ID,
    MockSpiProvider::ID,
    MockSerialProvider::ID,
];

/// Platform bundling one mock provider per I/O type
#[derive(Debug, Default, Clone, Copy)]
pub struct MockPlatform {
    priority: i32,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same platform with a different election priority
    pub fn with_priority(priority: i32) -> Self {
        Self { priority }
    }
}

impl Platform for MockPlatform {
    fn id(&self) -> &str {
        MOCK_PLATFORM_ID
    }

    fn name(&self) -> &str {
        "Mock Platform"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn enabled(&self, properties: &Properties) -> bool {
        properties
            .get(MOCK_ENABLED_PROPERTY)
            .map_or(true, |v| !v.trim().eq_ignore_ascii_case("false"))
    }

    fn provider_ids(&self) -> Vec<String> {
        PROVIDER_IDS.iter().map(|id| id.to_string()).collect()
    }

    fn default_provider(&self, io_type: IoType) -> Option<String> {
        let id = match io_type {
            IoType::AnalogInput => MockAnalogInputProvider::ID,
            IoType::AnalogOutput => MockAnalogOutputProvider::ID,
            IoType::DigitalInput => MockDigitalInputProvider::ID,
            IoType::DigitalOutput => MockDigitalOutputProvider::ID,
            IoType::DigitalMultipurpose => MockDigitalMultipurposeProvider::ID,
            IoType::Pwm => MockPwmProvider::ID,
            IoType::I2c => MockI2cProvider::ID,
            IoType::Spi => MockSpiProvider::ID,
            IoType::Serial => MockSerialProvider::ID,
        };
        Some(id.to_string())
    }

    fn infer_type(&self, properties: &Properties) -> Option<IoType> {
        infer_from_settings(properties)
    }
}

/// Guess the I/O type from which settings keys are present
///
/// Bus-style keys win over pin keys; a bare `address` is a digital output.
fn infer_from_settings(props: &Properties) -> Option<IoType> {
    let has = |key: &str| props.contains_key(key);
    let io_type = if has("device") && has("bus") {
        IoType::I2c
    } else if has("channel") || (has("bus") && has("baud")) {
        IoType::Spi
    } else if has("baud") || has("device") || has("parity") || has("data-bits") {
        IoType::Serial
    } else if has("frequency") || has("duty-cycle") || has("pwm-type") {
        IoType::Pwm
    } else if has("range.min") || has("range.max") {
        if has("initial") || has("shutdown") {
            IoType::AnalogOutput
        } else {
            IoType::AnalogInput
        }
    } else if has("mode") {
        IoType::DigitalMultipurpose
    } else if has("pull") || has("debounce") {
        IoType::DigitalInput
    } else if has("address") {
        IoType::DigitalOutput
    } else {
        return None;
    };
    Some(io_type)
}

/// Registers every mock provider and the [`MockPlatform`]
#[derive(Debug, Default, Clone, Copy)]
pub struct MockPlugin {
    platform: MockPlatform,
}

impl MockPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the platform with `priority` instead of 0
    pub fn with_priority(priority: i32) -> Self {
        Self {
            platform: MockPlatform::with_priority(priority),
        }
    }
}

impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        "mock"
    }

    fn initialize(&self, service: &mut PluginService<'_>) -> Result<()> {
        service.register_provider(MockAnalogInputProvider::new())?;
        service.register_provider(MockAnalogOutputProvider)?;
        service.register_provider(MockDigitalInputProvider::new())?;
        service.register_provider(MockDigitalOutputProvider)?;
        service.register_provider(MockDigitalMultipurposeProvider)?;
        service.register_provider(MockPwmProvider)?;
        service.register_provider(MockI2cProvider::new())?;
        service.register_provider(MockSpiProvider)?;
        service.register_provider(MockSerialProvider)?;
        service.register_platform(self.platform);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwio_core::Context;

    #[test]
    fn test_plugin_registers_complete_platform() {
        let ctx = Context::builder().add_plugin(MockPlugin::new()).build().unwrap();
        let platform = ctx.platform().unwrap();
        assert_eq!(platform.id(), MOCK_PLATFORM_ID);
        assert_eq!(platform.name(), "Mock Platform");
        for io_type in IoType::ALL {
            let provider = platform.provider_for(io_type).unwrap();
            assert_eq!(provider.io_type(), io_type);
        }
        assert!(ctx.has_provider_of::<MockI2cProvider>());
    }

    #[test]
    fn test_infers_type_from_settings_keys() {
        let cases: [(&[(&str, &str)], Option<IoType>); 9] = [
            (&[("address", "4")], Some(IoType::DigitalOutput)),
            (&[("address", "4"), ("initial", "high")], Some(IoType::DigitalOutput)),
            (&[("address", "4"), ("pull", "up")], Some(IoType::DigitalInput)),
            (&[("address", "4"), ("mode", "output")], Some(IoType::DigitalMultipurpose)),
            (&[("address", "4"), ("frequency", "1000")], Some(IoType::Pwm)),
            (&[("address", "0"), ("range.max", "1023")], Some(IoType::AnalogInput)),
            (&[("bus", "1"), ("device", "0x48")], Some(IoType::I2c)),
            (&[("device", "/dev/ttyS0"), ("baud", "9600")], Some(IoType::Serial)),
            (&[("name", "Nothing")], None),
        ];
        for (pairs, expected) in cases {
            let props = Properties::from_pairs(pairs.iter().copied());
            assert_eq!(MockPlatform::new().infer_type(&props), expected, "{pairs:?}");
        }
    }

    #[test]
    fn test_disabled_by_property() {
        let ctx = Context::builder()
            .property(MOCK_ENABLED_PROPERTY, "false")
            .add_plugin(MockPlugin::new())
            .build()
            .unwrap();
        assert!(!ctx.has_platform(MOCK_PLATFORM_ID));
        // Providers stay usable without the platform
        assert!(ctx.has_provider(MockPwmProvider::ID));
    }
}
