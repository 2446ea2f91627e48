//! Simulated analog channels

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use hwio_core::bus::BusRegistry;
use hwio_core::{IoConfig, IoInstance, IoType, Provider};
use hwio_hal::analog::AnalogRange;
use hwio_hal::{
    AnalogInput, AnalogListener, AnalogOutput, AnalogValueChange, Io, IoError, ListenerId,
    Listeners,
};
use parking_lot::Mutex;

use crate::{wrong_settings, Handle};

/// Input instance listening on a channel
#[derive(Debug)]
struct Watcher {
    range: AnalogRange,
    listeners: Weak<Listeners<AnalogListener>>,
}

impl Watcher {
    fn reading(&self, raw: Option<i32>) -> i32 {
        raw.unwrap_or(self.range.min).clamp(self.range.min, self.range.max)
    }
}

#[derive(Debug, Default)]
struct Channels {
    values: HashMap<u32, i32>,
    watchers: HashMap<u32, Vec<Watcher>>,
}

/// Provider of simulated analog inputs
///
/// Channels read the value last injected with [`Self::set_value`],
/// clamped to their range; untouched channels read the range minimum.
/// Listeners are told when an injection changes the clamped reading.
#[derive(Debug, Default)]
pub struct MockAnalogInputProvider {
    channels: Arc<Mutex<Channels>>,
}

impl MockAnalogInputProvider {
    pub const ID: &'static str = "mock-analog-input";

    pub fn new() -> Self {
        Self::default()
    }

    /// Present `value` on the channel at `address`
    pub fn set_value(&self, address: u32, value: i32) {
        let changes: Vec<_> = {
            let mut guard = self.channels.lock();
            let channels = &mut *guard;
            let before = channels.values.insert(address, value);
            let Some(watchers) = channels.watchers.get_mut(&address) else {
                return;
            };
            watchers.retain(|watcher| watcher.listeners.strong_count() > 0);
            watchers
                .iter()
                .filter_map(|watcher| {
                    let previous = watcher.reading(before);
                    let value = watcher.reading(Some(value));
                    let listeners = watcher.listeners.upgrade()?;
                    (previous != value)
                        .then_some((listeners, AnalogValueChange { value, previous }))
                })
                .collect()
        };
        for (listeners, change) in changes {
            listeners.notify(change);
        }
    }
}

impl Provider for MockAnalogInputProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::AnalogInput
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .analog_input()
            .ok_or_else(|| wrong_settings(config, "analog input"))?;
        let listeners = Arc::new(Listeners::new());
        self.channels
            .lock()
            .watchers
            .entry(settings.address)
            .or_default()
            .push(Watcher {
                range: settings.range,
                listeners: Arc::downgrade(&listeners),
            });
        let input: Arc<dyn AnalogInput> = Arc::new(MockAnalogInput {
            handle: Handle::new(config),
            address: settings.address,
            range: settings.range,
            channels: Arc::clone(&self.channels),
            listeners,
        });
        Ok(input.into())
    }
}

struct MockAnalogInput {
    handle: Handle,
    address: u32,
    range: AnalogRange,
    channels: Arc<Mutex<Channels>>,
    listeners: Arc<Listeners<AnalogListener>>,
}

impl Io for MockAnalogInput {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockAnalogInputProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        self.handle.close();
        self.listeners.clear();
        Ok(())
    }
}

impl AnalogInput for MockAnalogInput {
    fn address(&self) -> u32 {
        self.address
    }

    fn range(&self) -> AnalogRange {
        self.range
    }

    fn value(&self) -> Result<i32, IoError> {
        self.handle.ensure_open()?;
        let raw = self
            .channels
            .lock()
            .values
            .get(&self.address)
            .copied()
            .unwrap_or(self.range.min);
        Ok(raw.clamp(self.range.min, self.range.max))
    }

    fn add_listener(&self, listener: Arc<AnalogListener>) -> Result<ListenerId, IoError> {
        self.handle.ensure_open()?;
        Ok(self.listeners.add(listener))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

/// Provider of simulated analog outputs
#[derive(Debug, Default)]
pub struct MockAnalogOutputProvider;

impl MockAnalogOutputProvider {
    pub const ID: &'static str = "mock-analog-output";
}

impl Provider for MockAnalogOutputProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn io_type(&self) -> IoType {
        IoType::AnalogOutput
    }

    fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> hwio_core::Result<IoInstance> {
        let settings = config
            .settings()
            .analog_output()
            .ok_or_else(|| wrong_settings(config, "analog output"))?;
        let initial = match settings.initial {
            Some(value) => settings.range.check("analog output", value)?,
            None => settings.range.min,
        };
        let output: Arc<dyn AnalogOutput> = Arc::new(MockAnalogOutput {
            handle: Handle::new(config),
            address: settings.address,
            range: settings.range,
            value: Mutex::new(initial),
            shutdown: settings.shutdown,
            listeners: Listeners::new(),
        });
        Ok(output.into())
    }
}

struct MockAnalogOutput {
    handle: Handle,
    address: u32,
    range: AnalogRange,
    value: Mutex<i32>,
    shutdown: Option<i32>,
    listeners: Listeners<AnalogListener>,
}

impl MockAnalogOutput {
    fn write(&self, value: i32) -> Result<(), IoError> {
        let value = self.range.check("analog output", value)?;
        let previous = std::mem::replace(&mut *self.value.lock(), value);
        if previous != value {
            self.listeners.notify(AnalogValueChange { value, previous });
        }
        Ok(())
    }
}

impl Io for MockAnalogOutput {
    fn id(&self) -> &str {
        &self.handle.id
    }

    fn name(&self) -> &str {
        &self.handle.name
    }

    fn provider_id(&self) -> &str {
        MockAnalogOutputProvider::ID
    }

    fn shutdown(&self) -> Result<(), IoError> {
        if self.handle.close() {
            let parked = self.shutdown.map_or(Ok(()), |value| self.write(value));
            self.listeners.clear();
            parked?;
        }
        Ok(())
    }
}

impl AnalogOutput for MockAnalogOutput {
    fn address(&self) -> u32 {
        self.address
    }

    fn range(&self) -> AnalogRange {
        self.range
    }

    fn value(&self) -> Result<i32, IoError> {
        Ok(*self.value.lock())
    }

    fn set_value(&self, value: i32) -> Result<(), IoError> {
        self.handle.ensure_open()?;
        self.write(value)
    }

    fn add_listener(&self, listener: Arc<AnalogListener>) -> Result<ListenerId, IoError> {
        self.handle.ensure_open()?;
        Ok(self.listeners.add(listener))
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
