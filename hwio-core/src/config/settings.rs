//! Settings builders fed by inherited properties

use core::fmt::Display;
use core::str::FromStr;

use hwio_hal::analog::{AnalogInputSettings, AnalogOutputSettings, AnalogRange};
use hwio_hal::gpio::{
    DigitalInputSettings, DigitalMultipurposeSettings, DigitalOutputSettings, DigitalState,
};
use hwio_hal::i2c::I2cSettings;
use hwio_hal::pwm::{check_duty_cycle, PwmSettings};
use hwio_hal::serial::SerialSettings;
use hwio_hal::spi::SpiSettings;

use super::IoSettings;
use crate::error::{Error, Result};
use crate::io_type::IoType;
use crate::properties::Properties;

/// Typed view over one instance's properties
struct Reader<'a> {
    id: &'a str,
    props: &'a Properties,
}

impl<'a> Reader<'a> {
    fn key(&self, key: &str) -> String {
        format!("{}.{}", self.id, key)
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.props.get(key).map(str::trim)
    }

    fn value<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.raw(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| Error::invalid_property(self.key(key), e.to_string()))
            })
            .transpose()
    }

    /// Integer in decimal or `0x` hex
    fn int<T: TryFrom<i64>>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => raw.parse::<i64>(),
        };
        let value = parsed
            .map_err(|e| Error::invalid_property(self.key(key), format!("'{raw}': {e}")))?;
        T::try_from(value)
            .map(Some)
            .map_err(|_| Error::invalid_property(self.key(key), format!("{value} is out of range")))
    }

    fn required_int<T: TryFrom<i64>>(&self, key: &str) -> Result<T> {
        self.int(key)?
            .ok_or_else(|| Error::invalid_property(self.key(key), "required value is missing"))
    }

    fn range(&self) -> Result<AnalogRange> {
        let default = AnalogRange::default();
        let range = AnalogRange::new(
            self.int("range.min")?.unwrap_or(default.min),
            self.int("range.max")?.unwrap_or(default.max),
        );
        if range.min > range.max {
            return Err(Error::invalid_property(
                self.key("range.min"),
                format!("{} is above range.max {}", range.min, range.max),
            ));
        }
        Ok(range)
    }

    fn duty_cycle(&self, key: &str) -> Result<Option<f32>> {
        self.value::<f32>(key)?
            .map(|duty| {
                check_duty_cycle(duty)
                    .map_err(|e| Error::invalid_property(self.key(key), e.to_string()))
            })
            .transpose()
    }
}

pub(super) fn build(io_type: IoType, id: &str, props: &Properties) -> Result<IoSettings> {
    let r = Reader { id, props };

    let settings = match io_type {
        IoType::AnalogInput => IoSettings::AnalogInput(AnalogInputSettings {
            address: r.required_int("address")?,
            range: r.range()?,
        }),
        IoType::AnalogOutput => {
            let range = r.range()?;
            let check = |key: &str, value: Option<i32>| -> Result<Option<i32>> {
                value
                    .map(|v| {
                        range
                            .check("analog output", v)
                            .map_err(|e| Error::invalid_property(r.key(key), e.to_string()))
                    })
                    .transpose()
            };
            IoSettings::AnalogOutput(AnalogOutputSettings {
                address: r.required_int("address")?,
                range,
                initial: check("initial", r.int("initial")?)?,
                shutdown: check("shutdown", r.int("shutdown")?)?,
            })
        }
        IoType::DigitalInput => IoSettings::DigitalInput(DigitalInputSettings {
            address: r.required_int("address")?,
            pull: r.value("pull")?.unwrap_or_default(),
            debounce_us: r.int("debounce")?.unwrap_or(0),
        }),
        IoType::DigitalOutput => {
            let mut settings = DigitalOutputSettings::new(r.required_int("address")?);
            settings.initial = r.value("initial")?;
            settings.shutdown = r.value("shutdown")?;
            if let Some(on_state) = r.value::<DigitalState>("on-state")? {
                settings.on_state = on_state;
            }
            IoSettings::DigitalOutput(settings)
        }
        IoType::DigitalMultipurpose => IoSettings::DigitalMultipurpose(DigitalMultipurposeSettings {
            address: r.required_int("address")?,
            mode: r.value("mode")?.unwrap_or_default(),
            pull: r.value("pull")?.unwrap_or_default(),
        }),
        IoType::Pwm => {
            let default = PwmSettings::default();
            IoSettings::Pwm(PwmSettings {
                address: r.required_int("address")?,
                pwm_type: r.value("pwm-type")?.unwrap_or(default.pwm_type),
                frequency: r.int("frequency")?.unwrap_or(default.frequency),
                duty_cycle: r.duty_cycle("duty-cycle")?.unwrap_or(default.duty_cycle),
                initial: r.duty_cycle("initial")?,
                shutdown: r.duty_cycle("shutdown")?,
            })
        }
        IoType::I2c => IoSettings::I2c(I2cSettings {
            bus: r.required_int("bus")?,
            device: r.required_int("device")?,
        }),
        IoType::Spi => {
            let default = SpiSettings::default();
            let channel = match r.int("channel")? {
                Some(channel) => channel,
                None => r.int("address")?.unwrap_or(default.channel),
            };
            IoSettings::Spi(SpiSettings {
                bus: r.int("bus")?.unwrap_or(default.bus),
                channel,
                baud: r.int("baud")?.unwrap_or(default.baud),
                mode: r.value("mode")?.unwrap_or(default.mode),
            })
        }
        IoType::Serial => {
            let default = SerialSettings::default();
            IoSettings::Serial(SerialSettings {
                device: r.raw("device").map(str::to_string).unwrap_or(default.device),
                baud: r.int("baud")?.unwrap_or(default.baud),
                data_bits: r.value("data-bits")?.unwrap_or(default.data_bits),
                parity: r.value("parity")?.unwrap_or(default.parity),
                stop_bits: r.value("stop-bits")?.unwrap_or(default.stop_bits),
                flow_control: r.value("flow-control")?.unwrap_or(default.flow_control),
            })
        }
    };

    Ok(settings)
}
