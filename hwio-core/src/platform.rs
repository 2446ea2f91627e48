//! Platforms and the platform registry
//!
//! A [`Platform`] bundles providers for one target environment (a board,
//! a simulator, ...). At registration its provider ids are bound to the
//! providers already in the [`ProviderRegistry`], after which the platform
//! answers provider queries scoped to that bundle.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io_type::IoType;
use crate::properties::Properties;
use crate::provider::{best_of, Provider, ProviderRegistry};

/// A named bundle of providers
pub trait Platform: Send + Sync {
    /// Unique platform id
    fn id(&self) -> &str;

    /// Human-readable name (defaults to the id)
    fn name(&self) -> &str {
        self.id()
    }

    /// Preference when choosing the default platform; higher wins
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this platform can run here
    ///
    /// Disabled platforms are skipped at build time.
    fn enabled(&self, _properties: &Properties) -> bool {
        true
    }

    /// Ids of the providers this platform bundles, in preference order
    fn provider_ids(&self) -> Vec<String>;

    /// Explicit default provider id for `io_type`
    ///
    /// `None` falls back to the first bundled provider of that type.
    fn default_provider(&self, _io_type: IoType) -> Option<String> {
        None
    }

    /// I/O type implied by an instance's properties (prefix stripped)
    ///
    /// Consulted when a request names this platform but neither a provider
    /// nor a type.
    fn infer_type(&self, _properties: &Properties) -> Option<IoType> {
        None
    }
}

/// A platform with its provider ids bound to provider instances
pub struct RegisteredPlatform {
    platform: Arc<dyn Platform>,
    providers: Vec<Arc<dyn Provider>>,
}

impl RegisteredPlatform {
    fn bind(platform: Arc<dyn Platform>, registry: &ProviderRegistry) -> Result<Self> {
        let providers = platform
            .provider_ids()
            .iter()
            .map(|id| registry.get(id))
            .collect::<Result<Vec<_>>>()?;
        let bound = Self {
            platform,
            providers,
        };
        // Explicit defaults must point at a bundled provider of that type
        for io_type in IoType::ALL {
            if bound.platform.default_provider(io_type).is_some() {
                bound.provider_for(io_type)?;
            }
        }
        Ok(bound)
    }

    pub fn id(&self) -> &str {
        self.platform.id()
    }

    pub fn name(&self) -> &str {
        self.platform.name()
    }

    pub fn priority(&self) -> i32 {
        self.platform.priority()
    }

    /// The platform implementation
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Bundled providers in preference order
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    fn scope(&self) -> String {
        format!("platform '{}'", self.id())
    }

    /// Bundled provider with `id`
    pub fn provider(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .cloned()
            .ok_or_else(|| Error::provider_not_found(id, self.scope()))
    }

    /// Default provider for `io_type` within this platform
    pub fn provider_for(&self, io_type: IoType) -> Result<Arc<dyn Provider>> {
        if let Some(id) = self.platform.default_provider(io_type) {
            let provider = self.provider(&id)?;
            if provider.io_type() != io_type {
                return Err(Error::no_provider_for(
                    io_type,
                    format!(
                        "{} (its default '{id}' implements {})",
                        self.scope(),
                        provider.io_type()
                    ),
                ));
            }
            return Ok(provider);
        }
        best_of(self.providers.iter().filter(|p| p.io_type() == io_type))
            .ok_or_else(|| Error::no_provider_for(io_type, self.scope()))
    }

    pub fn has_provider(&self, id: &str) -> bool {
        self.providers.iter().any(|p| p.id() == id)
    }

    pub fn has_provider_for(&self, io_type: IoType) -> bool {
        self.provider_for(io_type).is_ok()
    }
}

impl core::fmt::Debug for RegisteredPlatform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisteredPlatform")
            .field("id", &self.id())
            .field(
                "providers",
                &self.providers.iter().map(|p| p.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Platform lookup by id, plus the context default
#[derive(Debug, Default)]
pub struct PlatformRegistry {
    platforms: Vec<Arc<RegisteredPlatform>>,
    default: Option<usize>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a platform, binding its provider ids against `providers`
    pub fn register(
        &mut self,
        platform: Arc<dyn Platform>,
        providers: &ProviderRegistry,
    ) -> Result<Arc<RegisteredPlatform>> {
        if self.exists(platform.id()) {
            return Err(Error::DuplicatePlatform(platform.id().to_string()));
        }
        let registered = Arc::new(RegisteredPlatform::bind(platform, providers)?);
        tracing::debug!(
            platform = registered.id(),
            providers = registered.providers.len(),
            priority = registered.priority(),
            "platform registered"
        );
        self.platforms.push(Arc::clone(&registered));
        Ok(registered)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.platforms.iter().any(|p| p.id() == id)
    }

    pub fn get(&self, id: &str) -> Result<Arc<RegisteredPlatform>> {
        self.platforms
            .iter()
            .find(|p| p.id() == id)
            .cloned()
            .ok_or_else(|| Error::PlatformNotFound(id.to_string()))
    }

    /// Make the platform with `id` the default
    pub fn set_default(&mut self, id: &str) -> Result<()> {
        let index = self
            .platforms
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| Error::PlatformNotFound(id.to_string()))?;
        self.default = Some(index);
        Ok(())
    }

    /// Pick the highest-priority platform (earliest on ties) as default
    /// unless one was set explicitly
    pub fn elect_default(&mut self) {
        if self.default.is_some() {
            return;
        }
        let mut best: Option<usize> = None;
        for (i, platform) in self.platforms.iter().enumerate() {
            if best.map_or(true, |b| platform.priority() > self.platforms[b].priority()) {
                best = Some(i);
            }
        }
        self.default = best;
    }

    /// The default platform, if any platform is registered
    pub fn default_platform(&self) -> Option<&Arc<RegisteredPlatform>> {
        self.default.and_then(|i| self.platforms.get(i))
    }

    /// All platforms in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<RegisteredPlatform>> {
        self.platforms.iter()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}
