//! Runtime context
//!
//! A [`Context`] owns the frozen provider and platform registries, the
//! property store, the instance registry and the bus arbiters. It is
//! `Send + Sync`; share it behind an `Arc`.
//!
//! Lifecycle listeners hear [`LifecycleEvent::Initialized`] once `build`
//! has finished, then [`LifecycleEvent::BeforeShutdown`] while instances
//! are still live and [`LifecycleEvent::Shutdown`] after they are gone.
//!
//! ```ignore
//! let ctx = Context::builder()
//!     .properties_text("led.type = dout\nled.address = 17")?
//!     .add_plugin(MockPlugin::new())
//!     .build()?;
//! let led = ctx.create("led")?.into_digital_output();
//! ```

mod builder;
mod resolve;

pub use builder::ContextBuilder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hwio_hal::{ListenerId, Listeners};

use crate::bus::BusRegistry;
use crate::config::{validate_id, IoConfig};
use crate::error::{Error, Result};
use crate::io::IoInstance;
use crate::io_type::IoType;
use crate::platform::{PlatformRegistry, RegisteredPlatform};
use crate::properties::Properties;
use crate::provider::{Provider, ProviderRegistry};
use crate::registry::{InstanceRegistry, Reservation};

use resolve::{Request, Resolution, Resolver};

/// Context lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Initialized,
    BeforeShutdown,
    Shutdown,
}

/// Callback for [`LifecycleEvent`]s
pub type LifecycleListener = dyn Fn(&Context, LifecycleEvent) + Send + Sync;

/// Hardware I/O runtime
#[derive(Debug)]
pub struct Context {
    properties: Properties,
    providers: ProviderRegistry,
    platforms: PlatformRegistry,
    instances: InstanceRegistry,
    buses: BusRegistry,
    listeners: Listeners<LifecycleListener>,
    shut_down: AtomicBool,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn platforms(&self) -> &PlatformRegistry {
        &self.platforms
    }

    pub fn buses(&self) -> &BusRegistry {
        &self.buses
    }

    // ---- platforms ----

    /// The default platform
    pub fn platform(&self) -> Result<Arc<RegisteredPlatform>> {
        self.platforms
            .default_platform()
            .cloned()
            .ok_or_else(|| Error::PlatformNotFound("<default>".to_string()))
    }

    pub fn platform_by_id(&self, id: &str) -> Result<Arc<RegisteredPlatform>> {
        self.platforms.get(id)
    }

    pub fn has_platform(&self, id: &str) -> bool {
        self.platforms.exists(id)
    }

    // ---- providers ----

    pub fn provider(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers.get(id)
    }

    /// Default provider for `io_type`: the default platform's first, then
    /// the best process-wide one
    pub fn provider_for(&self, io_type: IoType) -> Result<Arc<dyn Provider>> {
        self.resolver().default_for(io_type)
    }

    /// Registered provider of concrete type `P`
    pub fn provider_of<P: Provider + 'static>(&self) -> Result<Arc<P>> {
        self.providers.get_type::<P>()
    }

    pub fn has_provider(&self, id: &str) -> bool {
        self.providers.exists(id)
    }

    pub fn has_provider_for(&self, io_type: IoType) -> bool {
        self.provider_for(io_type).is_ok()
    }

    pub fn has_provider_of<P: Provider + 'static>(&self) -> bool {
        self.providers.exists_type::<P>()
    }

    // ---- instances ----

    /// Instance registered under `id`
    pub fn io(&self, id: &str) -> Result<IoInstance> {
        self.instances.get(id.trim())
    }

    pub fn has_io(&self, id: &str) -> bool {
        self.instances.contains(id.trim())
    }

    /// Ids of every registered instance, sorted
    pub fn io_ids(&self) -> Vec<String> {
        self.instances.ids()
    }

    /// Create the instance `id` from its properties
    ///
    /// Routing comes from `<id>.platform`, `<id>.provider` and `<id>.type`;
    /// settings from the remaining `<id>.*` keys.
    pub fn create(&self, id: &str) -> Result<IoInstance> {
        self.create_from_properties(id, None)
    }

    /// Create the instance `id` as `io_type`
    ///
    /// `io_type` overrides any `<id>.type` property; a provider named in
    /// the properties must implement it.
    pub fn create_as(&self, id: &str, io_type: IoType) -> Result<IoInstance> {
        self.create_from_properties(id, Some(io_type))
    }

    /// Create an instance from a fully built configuration
    ///
    /// Routing comes from the configuration only; the I/O type is the one
    /// of its settings.
    pub fn create_with_config(&self, config: IoConfig) -> Result<IoInstance> {
        let reservation = self.reserve(config.id())?;
        let request = Request {
            id: config.id(),
            platform: config.platform(),
            provider: config.provider(),
            io_type: Some(config.io_type()),
            properties: None,
        };
        let Resolution { provider, platform } = self.resolver().resolve(&request)?;
        let config = config.resolved(platform.as_ref().map(|p| p.id()), provider.id());
        self.instantiate(reservation, provider.as_ref(), &config)
    }

    fn create_from_properties(&self, id: &str, required: Option<IoType>) -> Result<IoInstance> {
        let id = validate_id(id)?;
        let reservation = self.reserve(&id)?;
        let props = self.properties.sub_properties(&id);

        let io_type = match required {
            Some(io_type) => Some(io_type),
            None => props.get("type").map(IoType::parse).transpose()?,
        };
        let request = Request {
            id: &id,
            platform: props.get("platform").filter(|v| !v.trim().is_empty()),
            provider: props.get("provider").filter(|v| !v.trim().is_empty()),
            io_type,
            properties: Some(&props),
        };
        let Resolution { provider, platform } = self.resolver().resolve(&request)?;

        let config = IoConfig::from_properties(&id, provider.io_type(), &props)?
            .resolved(platform.as_ref().map(|p| p.id()), provider.id());
        self.instantiate(reservation, provider.as_ref(), &config)
    }

    fn reserve(&self, id: &str) -> Result<Reservation<'_>> {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }
        self.instances.reserve(id)
    }

    fn instantiate(
        &self,
        reservation: Reservation<'_>,
        provider: &dyn Provider,
        config: &IoConfig,
    ) -> Result<IoInstance> {
        let instance = provider.create(config, &self.buses)?;
        if instance.io_type() != provider.io_type() {
            discard(&instance);
            return Err(Error::ProviderMismatch {
                id: config.id().to_string(),
                provider: provider.id().to_string(),
                required: provider.io_type(),
                actual: instance.io_type(),
            });
        }

        match reservation.fill(instance.clone()) {
            Ok(instance) => {
                tracing::info!(
                    id = config.id(),
                    io_type = %config.io_type(),
                    provider = provider.id(),
                    platform = config.platform().unwrap_or("-"),
                    "I/O instance created"
                );
                Ok(instance)
            }
            Err(err) => {
                // Shut down while the provider ran; nobody will own it
                discard(&instance);
                Err(err)
            }
        }
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            providers: &self.providers,
            platforms: &self.platforms,
        }
    }

    // ---- lifecycle ----

    /// Register a lifecycle listener
    ///
    /// Fails with [`Error::Shutdown`] once the context is shut down.
    pub fn add_listener(&self, listener: Arc<LifecycleListener>) -> Result<ListenerId> {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }
        Ok(self.listeners.add(listener))
    }

    /// Unregister a lifecycle listener; false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn notify(&self, event: LifecycleEvent) {
        for listener in self.listeners.snapshot() {
            listener(self, event);
        }
    }

    /// Shut every instance down and close the buses
    ///
    /// Instances are shut down in id order. Every instance is visited even
    /// if one fails; the first failure is returned. Listeners are notified
    /// before and after, then dropped. Calling this again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.notify(LifecycleEvent::BeforeShutdown);

        let instances = self.instances.close();
        let mut first_error = None;
        for instance in &instances {
            if let Err(err) = instance.shutdown() {
                tracing::warn!(id = instance.id(), error = %err, "I/O instance shutdown failed");
                first_error.get_or_insert(err);
            }
        }
        self.buses.shutdown();
        tracing::info!(instances = instances.len(), "context shut down");
        self.notify(LifecycleEvent::Shutdown);
        self.listeners.clear();

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Shut down an instance that will never be registered
fn discard(instance: &IoInstance) {
    if let Err(err) = instance.shutdown() {
        tracing::warn!(id = instance.id(), error = %err, "orphaned instance shutdown failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwio_hal::gpio::{DigitalOutput, DigitalState};
    use hwio_hal::{Io, IoError};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::platform::Platform;

    struct Relay {
        id: String,
        provider: &'static str,
        address: u32,
        state: Mutex<DigitalState>,
        off: Option<DigitalState>,
    }

    impl Io for Relay {
        fn id(&self) -> &str {
            &self.id
        }

        fn provider_id(&self) -> &str {
            self.provider
        }

        fn shutdown(&self) -> core::result::Result<(), IoError> {
            if let Some(state) = self.off {
                *self.state.lock() = state;
            }
            Ok(())
        }
    }

    impl DigitalOutput for Relay {
        fn address(&self) -> u32 {
            self.address
        }

        fn set_state(&self, state: DigitalState) -> core::result::Result<(), IoError> {
            *self.state.lock() = state;
            Ok(())
        }

        fn state(&self) -> core::result::Result<DigitalState, IoError> {
            Ok(*self.state.lock())
        }
    }

    struct RelayProvider {
        id: &'static str,
        created: AtomicUsize,
    }

    impl RelayProvider {
        fn new(id: &'static str) -> Self {
            Self {
                id,
                created: AtomicUsize::new(0),
            }
        }
    }

    impl Provider for RelayProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn io_type(&self) -> IoType {
            IoType::DigitalOutput
        }

        fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> Result<IoInstance> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let settings = config
                .settings()
                .digital_output()
                .ok_or(IoError::Unsupported("relay settings"))?;
            let relay: Arc<dyn DigitalOutput> = Arc::new(Relay {
                id: config.id().to_string(),
                provider: self.id,
                address: settings.address,
                state: Mutex::new(settings.initial.unwrap_or(DigitalState::Low)),
                off: settings.shutdown,
            });
            Ok(relay.into())
        }
    }

    /// Claims to build PWM but hands back a digital output
    #[derive(Default)]
    struct LyingProvider {
        last: Mutex<Option<IoInstance>>,
    }

    impl Provider for LyingProvider {
        fn id(&self) -> &str {
            "liar"
        }

        fn io_type(&self) -> IoType {
            IoType::Pwm
        }

        fn create(&self, config: &IoConfig, buses: &BusRegistry) -> Result<IoInstance> {
            let mut settings = hwio_hal::gpio::DigitalOutputSettings::new(0);
            settings.initial = Some(DigitalState::High);
            settings.shutdown = Some(DigitalState::Low);
            let dout = IoConfig::builder(config.id()).build(settings)?;
            let instance = RelayProvider::new("liar").create(&dout, buses)?;
            *self.last.lock() = Some(instance.clone());
            Ok(instance)
        }
    }

    struct Board;

    impl Platform for Board {
        fn id(&self) -> &str {
            "board"
        }

        fn provider_ids(&self) -> Vec<String> {
            vec!["board-relay".into()]
        }
    }

    fn context(props: &[(&str, &str)]) -> Context {
        Context::builder()
            .properties(Properties::from_pairs(props.iter().copied()))
            .add_provider(RelayProvider::new("relay"))
            .add_provider(RelayProvider::new("board-relay"))
            .add_provider(LyingProvider::default())
            .add_platform(Board)
            .build()
            .unwrap()
    }

    #[test]
    fn test_context_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Context>();
    }

    #[test]
    fn test_create_and_get_same_instance() {
        let ctx = context(&[("fan.type", "dout"), ("fan.address", "5")]);
        let created = ctx.create("fan").unwrap();
        let fetched = ctx.io("fan").unwrap();
        assert!(created.ptr_eq(&fetched));
        assert_eq!(created.io_type(), IoType::DigitalOutput);
        // Default platform "board" supplies the type default
        assert_eq!(created.provider_id(), "board-relay");
        assert_eq!(created.as_digital_output().unwrap().address(), 5);
        assert!(ctx.has_io("fan"));
        assert_eq!(ctx.io_ids(), vec!["fan".to_string()]);
    }

    #[test]
    fn test_duplicate_create_fails_without_calling_provider() {
        let ctx = context(&[("fan.provider", "relay"), ("fan.address", "5")]);
        ctx.create("fan").unwrap();
        let err = ctx.create("fan").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(id) if id == "fan"));
        assert_eq!(ctx.provider_of::<RelayProvider>().unwrap().created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_as_overrides_type_property() {
        let ctx = context(&[("fan.type", "pwm"), ("fan.address", "5")]);
        let fan = ctx.create_as("fan", IoType::DigitalOutput).unwrap();
        assert_eq!(fan.io_type(), IoType::DigitalOutput);
    }

    #[test]
    fn test_create_as_rejects_mismatched_provider() {
        let ctx = context(&[("fan.provider", "relay"), ("fan.address", "5")]);
        let err = ctx.create_as("fan", IoType::Pwm).unwrap_err();
        assert!(matches!(err, Error::ProviderMismatch { .. }));
        // A failed create leaves the id free
        assert!(ctx.create("fan").is_ok());
    }

    #[test]
    fn test_unresolvable_and_unknown_type() {
        let ctx = context(&[("ghost.address", "1"), ("odd.type", "flux-capacitor")]);
        assert!(matches!(ctx.create("ghost"), Err(Error::Unresolvable(_))));
        assert!(matches!(ctx.create("odd"), Err(Error::UnknownIoType(_))));
        assert!(matches!(ctx.create("  "), Err(Error::InvalidId(_))));
        assert!(matches!(ctx.io("ghost"), Err(Error::IoNotFound(_))));
    }

    #[test]
    fn test_provider_returning_wrong_type_is_rejected() {
        let ctx = context(&[("x.provider", "liar"), ("x.address", "1")]);
        let err = ctx.create("x").unwrap_err();
        assert!(matches!(
            err,
            Error::ProviderMismatch {
                required: IoType::Pwm,
                actual: IoType::DigitalOutput,
                ..
            }
        ));
        assert!(!ctx.has_io("x"));

        // The rejected instance was shut down, not just dropped
        let liar = ctx.provider_of::<LyingProvider>().unwrap();
        let last = liar.last.lock().clone().unwrap();
        let relay = last.into_digital_output().unwrap();
        assert_eq!(relay.state().unwrap(), DigitalState::Low);
    }

    #[test]
    fn test_blank_routing_properties_are_ignored() {
        let ctx = context(&[
            ("fan.platform", ""),
            ("fan.provider", "  "),
            ("fan.type", "dout"),
            ("fan.address", "5"),
        ]);
        assert_eq!(ctx.create("fan").unwrap().provider_id(), "board-relay");
    }

    #[test]
    fn test_create_with_config_records_resolution() {
        let ctx = context(&[]);
        let config = IoConfig::builder("lamp")
            .platform("board")
            .build(hwio_hal::gpio::DigitalOutputSettings::new(9))
            .unwrap();
        let lamp = ctx.create_with_config(config).unwrap();
        assert_eq!(lamp.provider_id(), "board-relay");
    }

    #[test]
    fn test_provider_accessors() {
        let ctx = context(&[]);
        assert!(ctx.has_provider("relay"));
        assert!(ctx.has_provider_of::<LyingProvider>());
        assert!(ctx.has_provider_for(IoType::Pwm));
        assert!(!ctx.has_provider_for(IoType::Spi));
        assert_eq!(ctx.provider_for(IoType::DigitalOutput).unwrap().id(), "board-relay");
        assert_eq!(ctx.platform().unwrap().id(), "board");
        assert!(ctx.has_platform("board"));
        assert!(matches!(ctx.platform_by_id("nope"), Err(Error::PlatformNotFound(_))));
    }

    #[test]
    fn test_shutdown_visits_instances_and_refuses_create() {
        let ctx = context(&[
            ("fan.provider", "relay"),
            ("fan.address", "5"),
            ("fan.initial", "high"),
            ("fan.shutdown", "low"),
        ]);
        let fan = ctx.create("fan").unwrap().into_digital_output().unwrap();
        assert!(fan.is_high().unwrap());

        ctx.shutdown().unwrap();
        assert!(ctx.is_shut_down());
        assert_eq!(fan.state().unwrap(), DigitalState::Low);
        assert!(!ctx.has_io("fan"));
        assert!(matches!(ctx.create("fan"), Err(Error::Shutdown)));
        // Idempotent
        ctx.shutdown().unwrap();
    }
    #[test]
    fn test_lifecycle_listeners_bracket_shutdown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = Context::builder()
            .properties(Properties::from_pairs([
                ("fan.type", "dout"),
                ("fan.address", "5"),
                ("fan.inject", "true"),
            ]))
            .add_provider(RelayProvider::new("board-relay"))
            .add_platform(Board)
            .auto_inject(true)
            .add_listener(Arc::new(move |ctx: &Context, event: LifecycleEvent| {
                sink.lock().push((event, ctx.has_io("fan")));
            }))
            .build()
            .unwrap();
        assert_eq!(*seen.lock(), vec![(LifecycleEvent::Initialized, true)]);

        let late = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&late);
        let id = ctx
            .add_listener(Arc::new(move |_: &Context, _: LifecycleEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert!(ctx.remove_listener(id));

        ctx.shutdown().unwrap();
        ctx.shutdown().unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                (LifecycleEvent::Initialized, true),
                (LifecycleEvent::BeforeShutdown, true),
                (LifecycleEvent::Shutdown, false),
            ]
        );
        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert!(matches!(
            ctx.add_listener(Arc::new(|_: &Context, _: LifecycleEvent| {})),
            Err(Error::Shutdown)
        ));
    }
}
