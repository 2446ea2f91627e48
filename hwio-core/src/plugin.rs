//! Plugins
//!
//! A [`Plugin`] contributes providers and platforms to a context under
//! construction. Every plugin runs to completion before the registries are
//! frozen, so resolution never observes a partially registered bundle.

use std::sync::Arc;

use crate::error::Result;
use crate::platform::Platform;
use crate::properties::Properties;
use crate::provider::{Provider, ProviderRegistry};

/// Bundle of providers and platforms
pub trait Plugin: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Register providers and platforms
    fn initialize(&self, service: &mut PluginService<'_>) -> Result<()>;
}

/// Registration surface handed to [`Plugin::initialize`]
pub struct PluginService<'a> {
    properties: &'a Properties,
    providers: &'a mut ProviderRegistry,
    platforms: &'a mut Vec<Arc<dyn Platform>>,
}

impl<'a> PluginService<'a> {
    pub(crate) fn new(
        properties: &'a Properties,
        providers: &'a mut ProviderRegistry,
        platforms: &'a mut Vec<Arc<dyn Platform>>,
    ) -> Self {
        Self {
            properties,
            providers,
            platforms,
        }
    }

    /// Context properties, for plugins that configure themselves
    pub fn properties(&self) -> &Properties {
        self.properties
    }

    /// Register a provider; ids must be unique across the context
    pub fn register_provider<P: Provider + 'static>(&mut self, provider: P) -> Result<Arc<P>> {
        self.providers.register(provider)
    }

    /// Queue a platform; its provider ids are bound once all plugins ran
    pub fn register_platform<P: Platform + 'static>(&mut self, platform: P) -> &mut Self {
        self.platforms.push(Arc::new(platform));
        self
    }
}
