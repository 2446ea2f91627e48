//! Simulated digital pins

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use hwio_core::bus::BusRegistry;
use hwio_core::{IoConfig, IoInstance, IoType, Provider};
use hwio_hal::gpio::{DigitalMode, DigitalState, PullResistance};
use hwio_hal::{
    DigitalInput, DigitalListener, DigitalMultipurpose, DigitalOutput, DigitalStateChange, Io,
    IoError, ListenerId, Listeners,
};
use parking_lot::Mutex;

use crate::{wrong_settings, Handle};

fn idle_level(pull: PullResistance) -> DigitalState {
    match pull {
        PullResistance::PullUp => DigitalState::High,
        PullResistance::PullDown | PullResistance::Off => DigitalState::Low,
    }
}

// ---- digital input ----

/// Input instance listening on an address
#[derive(Debug)]
struct Watcher {
    pull: PullResistance,
    listeners: Weak<Listeners<DigitalListener>>,
}

/// Levels driven onto input pins from outside, by address
#[derive(Debug, Default)]
struct InputLines {
    levels: HashMap<u32, DigitalState>,
    watchers: HashMap<u32, Vec<Watcher>>,
}

/// Provider of simulated digital inputs
///
/// Inputs read the level last injected with [`Self::set_level`]; pins
/// nobody drove read their pull resistor's idle level. Injecting a level
/// notifies the listeners of every input whose reading it changes.
#[derive(Debug, Default)]
pub struct MockDigitalInputProvider {
    lines: Arc<Mutex<InputLines>>,
}

impl MockDigitalInputProvider {
    pub const ID: &'static str = "mock-digital-input";

    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the pin at `address`
    pub fn set_level(&self, address: u32, state: DigitalState) {
        self.drive(address, Some(state));
    }

    /// Stop driving the pin at `address`
    pub fn release(&self, address: u32) {
        self.drive(address, None);
    }

    fn drive(&self, address: u32, level: Option<DigitalState>) {
        let changes: Vec<_> = {
            let mut guard = self.lines.lock();
            let lines = &mut *guard;
            let driven = match level {
                Some(state) => lines.levels.insert(address, state),
                None => lines.levels.remove(&address),
            };
            let Some(watchers) = lines.watchers.get_mut(&address) else {
                return;
            };
            watchers.retain(|watcher| watcher.listeners.strong_count() > 0);
            watchers
                .iter()
                .filter_map(|watcher| {
                    let previous = driven.unwrap_or_else(|| idle_level(watcher.pull));
                    let state = level.unwrap_or_else(|| idle_level(watcher.pull));
                    let listeners = watcher.listeners.upgrade()?;
                    (previous != state)
                        .then_some((listeners, DigitalStateChange { state, previous }))
                })
                .collect()
        };
        for (listeners, change) in changes {
            listeners.notify(change);
        }
    }
}

impl Provider for MockDigitalInputProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::DigitalInput
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .digital_input()
            .ok_or_else(|| wrong_settings(config, "digital input"))?;
        let listeners = Arc::new(Listeners::new());
        self.lines
            .lock()
            .watchers
            .entry(settings.address)
            .or_default()
            .push(Watcher {
                pull: settings.pull,
                listeners: Arc::downgrade(&listeners),
            });
        let input: Arc<dyn DigitalInput> = Arc::new(MockDigitalInput {
            handle: Handle::new(config),
            address: settings.address,
            pull: settings.pull,
            lines: Arc::clone(&self.lines),
            listeners,
        });
        Ok(input.into())
    }
}

struct MockDigitalInput {
    handle: Handle,
    address: u32,
    pull: PullResistance,
    lines: Arc<Mutex<InputLines>>,
    listeners: Arc<Listeners<DigitalListener>>,
}

impl Io for MockDigitalInput {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockDigitalInputProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        self.handle.close();
        self.listeners.clear();
        Ok(())
    }
}

impl DigitalInput for MockDigitalInput {
    fn address(&self) -> u32 {
        self.address
    }

    fn state(&self) -> Result<DigitalState, IoError> {
        self.handle.ensure_open()?;
        Ok(self
            .lines
            .lock()
            .levels
            .get(&self.address)
            .copied()
            .unwrap_or_else(|| idle_level(self.pull)))
    }

    fn add_listener(&self, listener: Arc<DigitalListener>) -> Result<ListenerId, IoError> {
        self.handle.ensure_open()?;
        Ok(self.listeners.add(listener))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

// ---- digital output ----

/// Provider of simulated digital outputs
#[derive(Debug, Default)]
pub struct MockDigitalOutputProvider;

impl MockDigitalOutputProvider {
    pub const ID: &'static str = "mock-digital-output";
}

impl Provider for MockDigitalOutputProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::DigitalOutput
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .digital_output()
            .ok_or_else(|| wrong_settings(config, "digital output"))?;
        let output: Arc<dyn DigitalOutput> = Arc::new(MockDigitalOutput {
            handle: Handle::new(config),
            address: settings.address,
            state: Mutex::new(settings.initial.unwrap_or(DigitalState::Low)),
            shutdown: settings.shutdown,
            listeners: Listeners::new(),
        });
        Ok(output.into())
    }
}

struct MockDigitalOutput {
    handle: Handle,
    address: u32,
    state: Mutex<DigitalState>,
    shutdown: Option<DigitalState>,
    listeners: Listeners<DigitalListener>,
}

impl MockDigitalOutput {
    fn drive(&self, state: DigitalState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            self.listeners.notify(DigitalStateChange { state, previous });
        }
    }
}

impl Io for MockDigitalOutput {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockDigitalOutputProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        if self.handle.close() {
            if let Some(state) = self.shutdown {
                self.drive(state);
                tracing::debug!(id = %self.handle.id, ?state, "digital output parked");
            }
            self.listeners.clear();
        }
        Ok(())
    }
}

impl DigitalOutput for MockDigitalOutput {
    fn address(&self) -> u32 {
        self.address
    }

    fn set_state(&self, state: DigitalState) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        self.drive(state);
        Ok(())
    }

    fn state(&self) -> Result<DigitalState, IoError> {
        Ok(*self.state.lock())
    }

    fn add_listener(&self, listener: Arc<DigitalListener>) -> Result<ListenerId, IoError> {
        self.handle.ensure_open()?;
        Ok(self.listeners.add(listener))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

// ---- digital multipurpose ----

/// Provider of simulated pins switchable between input and output
#[derive(Debug, Default)]
pub struct MockDigitalMultipurposeProvider;

impl MockDigitalMultipurposeProvider {
    pub const ID: &'static str = "mock-digital-multipurpose";
}

impl Provider for MockDigitalMultipurposeProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::DigitalMultipurpose
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .digital_multipurpose()
            .ok_or_else(|| wrong_settings(config, "digital multipurpose"))?;
        let pin: Arc<dyn DigitalMultipurpose> = Arc::new(MockDigitalMultipurpose {
            handle: Handle::new(config),
            address: settings.address,
            pin: Mutex::new(PinState {
                mode: settings.mode,
                state: idle_level(settings.pull),
            }),
            listeners: Listeners::new(),
        });
        Ok(pin.into())
    }
}

struct PinState {
    mode: DigitalMode,
    state: DigitalState,
}

struct MockDigitalMultipurpose {
    handle: Handle,
    address: u32,
    pin: Mutex<PinState>,
    listeners: Listeners<DigitalListener>,
}

impl Io for MockDigitalMultipurpose {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockDigitalMultipurposeProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        self.handle.close();
        self.listeners.clear();
        Ok(())
    }
}

impl DigitalMultipurpose for MockDigitalMultipurpose {
    fn address(&self) -> u32 {
        self.address
    }

    fn mode(&self) -> DigitalMode {
        self.pin.lock().mode
    }

    fn set_mode(&self, mode: DigitalMode) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        self.pin.lock().mode = mode;
        Ok(())
    }

    fn state(&self) -> Result<DigitalState, IoError> {
        Ok(self.pin.lock().state)
    }

    fn set_state(&self, state: DigitalState) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        let previous = {
            let mut pin = self.pin.lock();
            if pin.mode != DigitalMode::Output {
                return Err(IoError::Unsupported("driving a pin in input mode"));
            }
            std::mem::replace(&mut pin.state, state)
        };
        if previous != state {
            self.listeners.notify(DigitalStateChange { state, previous });
        }
        Ok(())
    }

    fn add_listener(&self, listener: Arc<DigitalListener>) -> Result<ListenerId, IoError> {
        self.handle.ensure_open()?;
        Ok(self.listeners.add(listener))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwio_core::bus::BusSettings;
    use hwio_hal::gpio::{DigitalInputSettings, DigitalMultipurposeSettings, DigitalOutputSettings};

    fn buses() -> BusRegistry {
        BusRegistry::new(BusSettings::default())
    }

    #[test]
    fn test_input_reads_injected_level_or_pull() {
        let provider = MockDigitalInputProvider::new();
        let config = IoConfig::builder("button")
            .build(DigitalInputSettings {
                address: 3,
                pull: PullResistance::PullUp,
                debounce_us: 0,
            })
            .unwrap();
        let button = provider
            .create(&config, &buses())
            .unwrap()
            .into_digital_input()
            .unwrap();

        assert_eq!(button.state().unwrap(), DigitalState::High);
        provider.set_level(3, DigitalState::Low);
        assert!(button.is_low().unwrap());
        provider.release(3);
        assert!(button.is_high().unwrap());
    }

    #[test]
    fn test_output_initial_and_shutdown_states() {
        let config = IoConfig::builder("led")
            .build(DigitalOutputSettings {
                initial: Some(DigitalState::High),
                shutdown: Some(DigitalState::Low),
                ..DigitalOutputSettings::new(17)
            })
            .unwrap();
        let led = MockDigitalOutputProvider
            .create(&config, &buses())
            .unwrap()
            .into_digital_output()
            .unwrap();

        assert!(led.is_high().unwrap());
        led.toggle().unwrap();
        led.toggle().unwrap();
        led.shutdown().unwrap();
        assert_eq!(led.state().unwrap(), DigitalState::Low);
        assert!(matches!(led.high(), Err(IoError::Closed(id)) if id == "led"));
    }

    #[test]
    fn test_multipurpose_refuses_writes_in_input_mode() {
        let config = IoConfig::builder("bidi")
            .build(DigitalMultipurposeSettings {
                address: 5,
                mode: DigitalMode::Input,
                pull: PullResistance::PullDown,
            })
            .unwrap();
        let pin = MockDigitalMultipurposeProvider
            .create(&config, &buses())
            .unwrap()
            .into_digital_multipurpose()
            .unwrap();

        assert!(matches!(pin.set_state(DigitalState::High), Err(IoError::Unsupported(_))));
        pin.set_mode(DigitalMode::Output).unwrap();
        pin.set_state(DigitalState::High).unwrap();
        assert_eq!(pin.state().unwrap(), DigitalState::High);
    }

    fn recorder() -> (Arc<Mutex<Vec<DigitalStateChange>>>, Arc<DigitalListener>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Arc::new(move |change: DigitalStateChange| sink.lock().push(change)))
    }

    fn input(
        provider: &MockDigitalInputProvider,
        id: &str,
        pull: PullResistance,
    ) -> Arc<dyn DigitalInput> {
        let config = IoConfig::builder(id)
            .build(DigitalInputSettings {
                address: 6,
                pull,
                debounce_us: 0,
            })
            .unwrap();
        provider
            .create(&config, &buses())
            .unwrap()
            .into_digital_input()
            .unwrap()
    }

    #[test]
    fn test_input_listeners_see_injected_changes() {
        let provider = MockDigitalInputProvider::new();
        let up = input(&provider, "up", PullResistance::PullUp);
        let down = input(&provider, "down", PullResistance::PullDown);
        let (seen_up, listener) = recorder();
        up.add_listener(listener).unwrap();
        let (seen_down, listener) = recorder();
        down.add_listener(listener).unwrap();

        provider.set_level(6, DigitalState::High);
        provider.set_level(6, DigitalState::High);
        provider.set_level(7, DigitalState::Low);
        provider.release(6);

        // pulled up, so it read high throughout
        assert!(seen_up.lock().is_empty());
        assert_eq!(
            *seen_down.lock(),
            vec![
                DigitalStateChange {
                    state: DigitalState::High,
                    previous: DigitalState::Low,
                },
                DigitalStateChange {
                    state: DigitalState::Low,
                    previous: DigitalState::High,
                },
            ]
        );
    }

    #[test]
    fn test_input_listener_removed_or_shut_down() {
        let provider = MockDigitalInputProvider::new();
        let pin = input(&provider, "pin", PullResistance::Off);
        let (seen, listener) = recorder();
        let id = pin.add_listener(listener).unwrap();

        assert!(pin.remove_listener(id));
        provider.set_level(6, DigitalState::High);
        assert!(seen.lock().is_empty());

        let (_, listener) = recorder();
        pin.shutdown().unwrap();
        assert!(matches!(pin.add_listener(listener), Err(IoError::Closed(_))));

        drop(pin);
        provider.set_level(6, DigitalState::Low);
        assert!(provider.lines.lock().watchers[&6].is_empty());
    }

    #[test]
    fn test_output_listeners_fire_on_change_only() {
        let config = IoConfig::builder("relay")
            .build(DigitalOutputSettings {
                shutdown: Some(DigitalState::Low),
                ..DigitalOutputSettings::new(22)
            })
            .unwrap();
        let relay = MockDigitalOutputProvider
            .create(&config, &buses())
            .unwrap()
            .into_digital_output()
            .unwrap();
        let (seen, listener) = recorder();
        let id = relay.add_listener(listener).unwrap();

        relay.low().unwrap();
        relay.high().unwrap();
        relay.high().unwrap();
        relay.shutdown().unwrap();

        let states: Vec<_> = seen.lock().iter().map(|change| change.state).collect();
        assert_eq!(states, vec![DigitalState::High, DigitalState::Low]);
        assert!(!relay.remove_listener(id));
    }

    #[test]
    fn test_multipurpose_listener_sees_driven_level() {
        let config = IoConfig::builder("bidi")
            .build(DigitalMultipurposeSettings {
                address: 5,
                mode: DigitalMode::Output,
                pull: PullResistance::Off,
            })
            .unwrap();
        let pin = MockDigitalMultipurposeProvider
            .create(&config, &buses())
            .unwrap()
            .into_digital_multipurpose()
            .unwrap();
        let (seen, listener) = recorder();
        pin.add_listener(listener).unwrap();

        pin.set_state(DigitalState::High).unwrap();
        pin.set_mode(DigitalMode::Input).unwrap();
        assert!(pin.set_state(DigitalState::Low).is_err());

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].state, DigitalState::High);
    }

    #[test]
    fn test_wrong_settings_rejected() {
        let config = IoConfig::builder("x")
            .build(DigitalOutputSettings::new(1))
            .unwrap();
        let err = MockDigitalInputProvider::new()
            .create(&config, &buses())
            .unwrap_err();
        assert!(matches!(err, hwio_core::Error::Io(IoError::InvalidConfig(_))));
    }
}
