//! Simulated PWM channels

use std::sync::Arc;

use hwio_core::bus::BusRegistry;
use hwio_core::{IoConfig, IoInstance, IoType, Provider};
use hwio_hal::pwm::{check_duty_cycle, PwmType};
use hwio_hal::{Io, IoError, Pwm};
use parking_lot::Mutex;

use crate::{wrong_settings, Handle};

/// Provider of simulated PWM channels
#[derive(Debug, Default)]
pub struct MockPwmProvider;

impl MockPwmProvider {
    pub const ID: &'static str = "mock-pwm";
}

impl Provider for MockPwmProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::Pwm
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .pwm()
            .ok_or_else(|| wrong_settings(config, "PWM"))?;
        if settings.frequency == 0 {
            return Err(IoError::out_of_range("PWM frequency", 0, 1, u32::MAX.into()).into());
        }
        let mut wave = Waveform {
            on: false,
            frequency: settings.frequency,
            duty_cycle: check_duty_cycle(settings.duty_cycle)?,
        };
        if let Some(initial) = settings.initial {
            wave.duty_cycle = check_duty_cycle(initial)?;
            wave.on = true;
        }
        let pwm: Arc<dyn Pwm> = Arc::new(MockPwm {
            handle: Handle::new(config),
            address: settings.address,
            pwm_type: settings.pwm_type,
            wave: Mutex::new(wave),
            shutdown: settings.shutdown,
        });
        Ok(pwm.into())
    }
}

#[derive(Debug, Clone, Copy)]
struct Waveform {
    on: bool,
    frequency: u32,
    duty_cycle: f32,
}

struct MockPwm {
    handle: Handle,
    address: u32,
    pwm_type: PwmType,
    wave: Mutex<Waveform>,
    shutdown: Option<f32>,
}

impl Io for MockPwm {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockPwmProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        if !self.handle.close() {
            return Ok(());
        }
        let mut wave = self.wave.lock();
        match self.shutdown {
            Some(duty) if duty > 0.0 => wave.duty_cycle = check_duty_cycle(duty)?,
            _ => wave.on = false,
        }
        Ok(())
    }
}

impl Pwm for MockPwm {
    fn address(&self) -> u32 {
        self.address
    }

    fn pwm_type(&self) -> PwmType {
        self.pwm_type
    }

    fn on(&self) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        self.wave.lock().on = true;
        Ok(())
    }

    fn off(&self) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        self.wave.lock().on = false;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.wave.lock().on
    }

    fn frequency(&self) -> u32 {
        self.wave.lock().frequency
    }

    fn set_frequency(&self, hz: u32) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        if hz == 0 {
            return Err(IoError::out_of_range("PWM frequency", 0, 1, u32::MAX.into()));
        }
        self.wave.lock().frequency = hz;
        Ok(())
    }

    fn duty_cycle(&self) -> f32 {
        self.wave.lock().duty_cycle
    }

    fn set_duty_cycle(&self, percent: f32) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        self.wave.lock().duty_cycle = check_duty_cycle(percent)?;
        Ok(())
    }
}
