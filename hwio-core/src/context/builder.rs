//! Context construction

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use hwio_hal::Listeners;

use super::{Context, LifecycleEvent, LifecycleListener};
use crate::bus::{BusRegistry, BusSettings};
use crate::error::{Error, Result};
use crate::platform::{Platform, PlatformRegistry};
use crate::plugin::{Plugin, PluginService};
use crate::properties::Properties;
use crate::provider::{Provider, ProviderRegistry};
use crate::registry::InstanceRegistry;

/// Property suffix that requests creation at build time
const INJECT_SUFFIX: &str = "inject";

type Registration = Box<dyn FnOnce(&mut ProviderRegistry) -> Result<()>>;

/// Builder for [`Context`]
///
/// Providers, platforms and plugins are only registered in
/// [`ContextBuilder::build`], so registration errors surface there.
pub struct ContextBuilder {
    properties: Properties,
    providers: Vec<Registration>,
    platforms: Vec<Arc<dyn Platform>>,
    plugins: Vec<Box<dyn Plugin>>,
    default_platform: Option<String>,
    bus_timeout: Option<Duration>,
    bus_fair: Option<bool>,
    auto_inject: bool,
    listeners: Vec<Arc<LifecycleListener>>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            properties: Properties::new(),
            providers: Vec::new(),
            platforms: Vec::new(),
            plugins: Vec::new(),
            default_platform: None,
            bus_timeout: None,
            bus_fair: None,
            auto_inject: false,
            listeners: Vec::new(),
        }
    }

    // ---- properties ----

    /// Merge `properties`; later sources win on conflicting keys
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Merge only the `prefix.*` entries of `properties`, prefix stripped
    pub fn properties_with_prefix(self, properties: &Properties, prefix: &str) -> Self {
        self.properties(properties.sub_properties(prefix))
    }

    /// Merge `.properties` formatted text
    pub fn properties_text(self, text: &str) -> Result<Self> {
        Ok(self.properties(Properties::parse_properties(text)?))
    }

    /// Merge a TOML document, tables flattened into dot paths
    pub fn properties_toml(self, text: &str) -> Result<Self> {
        Ok(self.properties(Properties::parse_toml(text)?))
    }

    /// Merge a `.properties` or `.toml` file
    pub fn load_properties_file(self, path: impl AsRef<Path>) -> Result<Self> {
        Ok(self.properties(Properties::load_file(path)?))
    }

    // ---- registrations ----

    pub fn add_provider<P: Provider + 'static>(mut self, provider: P) -> Self {
        self.providers
            .push(Box::new(move |registry| registry.register(provider).map(drop)));
        self
    }

    pub fn add_platform<P: Platform + 'static>(mut self, platform: P) -> Self {
        self.platforms.push(Arc::new(platform));
        self
    }

    pub fn add_plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Use the platform `id` as default instead of electing one by priority
    pub fn default_platform(mut self, id: impl Into<String>) -> Self {
        self.default_platform = Some(id.into());
        self
    }

    // ---- buses ----

    /// Bus acquisition timeout; overrides `hwio.i2c.lock-timeout`
    pub fn bus_timeout(mut self, timeout: Duration) -> Self {
        self.bus_timeout = Some(timeout);
        self
    }

    /// FIFO bus acquisition; overrides `hwio.i2c.fair`
    pub fn bus_fairness(mut self, fair: bool) -> Self {
        self.bus_fair = Some(fair);
        self
    }

    /// Create every instance whose `<id>.inject` property is `true` while
    /// building
    pub fn auto_inject(mut self, enabled: bool) -> Self {
        self.auto_inject = enabled;
        self
    }

    /// Lifecycle listener; hears [`LifecycleEvent::Initialized`] once
    /// `build` succeeds
    pub fn add_listener(mut self, listener: Arc<LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Register everything and freeze the context
    pub fn build(self) -> Result<Context> {
        let ContextBuilder {
            properties,
            providers: registrations,
            platforms: mut pending_platforms,
            plugins,
            default_platform,
            bus_timeout,
            bus_fair,
            auto_inject,
            listeners: pending_listeners,
        } = self;

        let mut providers = ProviderRegistry::new();
        for register in registrations {
            register(&mut providers)?;
        }

        for plugin in &plugins {
            let mut service =
                PluginService::new(&properties, &mut providers, &mut pending_platforms);
            plugin.initialize(&mut service)?;
            tracing::debug!(plugin = plugin.name(), "plugin initialized");
        }

        let mut platforms = PlatformRegistry::new();
        for platform in pending_platforms {
            if !platform.enabled(&properties) {
                tracing::info!(platform = platform.id(), "platform disabled, skipping");
                continue;
            }
            platforms.register(platform, &providers)?;
        }
        match &default_platform {
            Some(id) => platforms.set_default(id)?,
            None => platforms.elect_default(),
        }

        let mut bus_settings = BusSettings::default().with_properties(&properties)?;
        if let Some(timeout) = bus_timeout {
            bus_settings.timeout = timeout;
        }
        if let Some(fair) = bus_fair {
            bus_settings.fair = fair;
        }

        let context = Context {
            properties,
            providers,
            platforms,
            instances: InstanceRegistry::new(),
            buses: BusRegistry::new(bus_settings),
            listeners: Listeners::new(),
            shut_down: AtomicBool::new(false),
        };
        for listener in pending_listeners {
            context.listeners.add(listener);
        }

        tracing::info!(
            providers = context.providers.len(),
            platforms = context.platforms.len(),
            default_platform = context.platforms.default_platform().map(|p| p.id()).unwrap_or("-"),
            bus_timeout_ms = bus_settings.timeout.as_millis() as u64,
            "context built"
        );

        if auto_inject {
            inject(&context)?;
        }
        context.notify(LifecycleEvent::Initialized);
        Ok(context)
    }
}

fn inject(context: &Context) -> Result<()> {
    let requested = context.properties.keys_ending_with(INJECT_SUFFIX);
    for (id, flag) in requested.iter() {
        let enabled: bool = flag.trim().to_ascii_lowercase().parse().map_err(|_| {
            Error::invalid_property(
                format!("{id}.{INJECT_SUFFIX}"),
                format!("'{flag}' is not a boolean"),
            )
        })?;
        if enabled {
            context.create(id)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DEFAULT_BUS_TIMEOUT;
    use crate::config::IoConfig;
    use crate::io::IoInstance;
    use crate::io_type::IoType;
    use crate::provider::tests::StubProvider;

    struct Disabled;

    impl Platform for Disabled {
        fn id(&self) -> &str {
            "disabled"
        }

        fn priority(&self) -> i32 {
            1000
        }

        fn enabled(&self, properties: &Properties) -> bool {
            properties.get("disabled.enabled") == Some("true")
        }

        fn provider_ids(&self) -> Vec<String> {
            Vec::new()
        }
    }

    struct Named(&'static str, i32);

    impl Platform for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }

        fn provider_ids(&self) -> Vec<String> {
            Vec::new()
        }
    }

    struct StubPlugin;

    impl Plugin for StubPlugin {
        fn name(&self) -> &str {
            "stub"
        }

        fn initialize(&self, service: &mut PluginService<'_>) -> Result<()> {
            service.register_provider(StubProvider::new("plugged", IoType::Spi))?;
            service.register_platform(Named("from-plugin", 1));
            Ok(())
        }
    }

    #[test]
    fn test_build_registers_everything() {
        let ctx = ContextBuilder::new()
            .add_provider(StubProvider::new("dout", IoType::DigitalOutput))
            .add_platform(Named("low", 0))
            .add_platform(Disabled)
            .add_plugin(StubPlugin)
            .build()
            .unwrap();
        assert!(ctx.has_provider("dout"));
        assert!(ctx.has_provider("plugged"));
        assert!(ctx.has_platform("from-plugin"));
        // Disabled platforms are skipped despite their priority
        assert!(!ctx.has_platform("disabled"));
        assert_eq!(ctx.platform().unwrap().id(), "from-plugin");
    }

    #[test]
    fn test_enabled_receives_properties() {
        let ctx = ContextBuilder::new()
            .property("disabled.enabled", "true")
            .add_platform(Disabled)
            .build()
            .unwrap();
        assert_eq!(ctx.platform().unwrap().id(), "disabled");
    }

    #[test]
    fn test_explicit_default_platform() {
        let ctx = ContextBuilder::new()
            .add_platform(Named("a", 0))
            .add_platform(Named("b", 5))
            .default_platform("a")
            .build()
            .unwrap();
        assert_eq!(ctx.platform().unwrap().id(), "a");

        let err = ContextBuilder::new()
            .add_platform(Named("a", 0))
            .default_platform("zzz")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::PlatformNotFound(_)));
    }

    #[test]
    fn test_duplicate_provider_fails_build() {
        let err = ContextBuilder::new()
            .add_provider(StubProvider::new("p", IoType::Pwm))
            .add_provider(StubProvider::new("p", IoType::Pwm))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateProvider(_)));
    }

    #[test]
    fn test_bus_settings_precedence() {
        let ctx = ContextBuilder::new().build().unwrap();
        assert_eq!(ctx.buses().settings(), BusSettings::default());
        assert_eq!(ctx.buses().settings().timeout, DEFAULT_BUS_TIMEOUT);

        let ctx = ContextBuilder::new()
            .property("hwio.i2c.lock-timeout", "250")
            .property("hwio.i2c.fair", "false")
            .build()
            .unwrap();
        assert_eq!(ctx.buses().settings().timeout, Duration::from_millis(250));
        assert!(!ctx.buses().settings().fair);

        let ctx = ContextBuilder::new()
            .property("hwio.i2c.lock-timeout", "250")
            .bus_timeout(Duration::from_millis(40))
            .bus_fairness(true)
            .build()
            .unwrap();
        assert_eq!(ctx.buses().settings().timeout, Duration::from_millis(40));
        assert!(ctx.buses().settings().fair);
    }

    #[test]
    fn test_property_loaders_merge() {
        let ctx = ContextBuilder::new()
            .properties_text("led.address = 4\nled.type: dout")
            .unwrap()
            .properties_toml("[fan]\naddress = 7\n")
            .unwrap()
            .properties_with_prefix(
                &Properties::from_pairs([("app.hwio.x", "1"), ("other.y", "2")]),
                "app.hwio",
            )
            .property("led.address", "5")
            .build()
            .unwrap();
        let props = ctx.properties();
        assert_eq!(props.get("led.address"), Some("5"));
        assert_eq!(props.get("led.type"), Some("dout"));
        assert_eq!(props.get("fan.address"), Some("7"));
        assert_eq!(props.get("x"), Some("1"));
        assert!(!props.contains_key("other.y"));
    }

    struct Counting;

    impl Provider for Counting {
        fn id(&self) -> &str {
            "counting"
        }

        fn io_type(&self) -> IoType {
            IoType::Pwm
        }

        fn create(&self, config: &IoConfig, _buses: &BusRegistry) -> Result<IoInstance> {
            Err(hwio_hal::IoError::Closed(config.id().to_string()).into())
        }
    }

    #[test]
    fn test_auto_inject_failure_aborts_build() {
        let builder = || {
            ContextBuilder::new()
                .add_provider(Counting)
                .property("motor.type", "pwm")
                .property("motor.address", "3")
                .property("motor.inject", "true")
        };
        // Disabled: nothing is created
        assert!(builder().build().is_ok());
        let err = builder().auto_inject(true).build().unwrap_err();
        assert!(matches!(err, Error::Io(hwio_hal::IoError::Closed(id)) if id == "motor"));

        let err = ContextBuilder::new()
            .property("motor.inject", "maybe")
            .auto_inject(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProperty { key, .. } if key == "motor.inject"));
    }
}
