//! Providers and the provider registry
//!
//! A [`Provider`] builds I/O instances of exactly one [`IoType`]. The
//! registry indexes providers by id, by I/O type and by concrete Rust
//! type, and is frozen once the context is built.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use crate::bus::BusRegistry;
use crate::config::IoConfig;
use crate::error::{Error, Result};
use crate::io::IoInstance;
use crate::io_type::IoType;

/// Factory for I/O instances of one type
pub trait Provider: Send + Sync {
    /// Unique provider id
    fn id(&self) -> &str;

    /// Human-readable name (defaults to the id)
    fn name(&self) -> &str {
        self.id()
    }

    /// The single I/O type this provider builds
    fn io_type(&self) -> IoType;

    /// Preference when several providers implement the same type
    ///
    /// Higher wins; ties go to the earliest registration.
    fn priority(&self) -> i32 {
        0
    }

    /// Build an instance from a fully materialized configuration
    ///
    /// `config.io_type()` always equals [`Provider::io_type`]. Bus-attached
    /// instances take their arbiter from `buses`.
    fn create(&self, config: &IoConfig, buses: &BusRegistry) -> Result<IoInstance>;
}

struct Entry {
    provider: Arc<dyn Provider>,
    type_id: TypeId,
    any: Arc<dyn Any + Send + Sync>,
}

/// Provider lookup by id, I/O type and concrete type
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<Entry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider; ids must be unique
    pub fn register<P: Provider + 'static>(&mut self, provider: P) -> Result<Arc<P>> {
        let provider = Arc::new(provider);
        self.register_arc(Arc::clone(&provider))?;
        Ok(provider)
    }

    /// Register an already shared provider
    pub fn register_arc<P: Provider + 'static>(&mut self, provider: Arc<P>) -> Result<()> {
        if self.exists(provider.id()) {
            return Err(Error::DuplicateProvider(provider.id().to_string()));
        }
        tracing::debug!(
            provider = provider.id(),
            io_type = %provider.io_type(),
            priority = provider.priority(),
            "provider registered"
        );
        let any: Arc<dyn Any + Send + Sync> = provider.clone();
        self.entries.push(Entry {
            provider,
            type_id: TypeId::of::<P>(),
            any,
        });
        Ok(())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.provider.id() == id)
    }

    /// Check if a provider of concrete type `P` is registered
    pub fn exists_type<P: Provider + 'static>(&self) -> bool {
        self.entries.iter().any(|e| e.type_id == TypeId::of::<P>())
    }

    /// Check if any provider implements `io_type`
    pub fn exists_for(&self, io_type: IoType) -> bool {
        self.entries.iter().any(|e| e.provider.io_type() == io_type)
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.entries
            .iter()
            .find(|e| e.provider.id() == id)
            .map(|e| Arc::clone(&e.provider))
            .ok_or_else(|| Error::provider_not_found(id, "the context"))
    }

    /// First registered provider of concrete type `P`
    pub fn get_type<P: Provider + 'static>(&self) -> Result<Arc<P>> {
        self.entries
            .iter()
            .filter(|e| e.type_id == TypeId::of::<P>())
            .find_map(|e| Arc::clone(&e.any).downcast::<P>().ok())
            .ok_or(Error::ProviderTypeNotFound(type_name::<P>()))
    }

    /// Process-wide default for `io_type`: highest priority, earliest on ties
    pub fn default_for(&self, io_type: IoType) -> Result<Arc<dyn Provider>> {
        best_of(self.all().filter(|p| p.io_type() == io_type))
            .ok_or_else(|| Error::no_provider_for(io_type, "the context"))
    }

    /// All providers in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.entries.iter().map(|e| &e.provider)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Highest priority provider, earliest on ties
pub(crate) fn best_of<'a>(
    providers: impl Iterator<Item = &'a Arc<dyn Provider>>,
) -> Option<Arc<dyn Provider>> {
    let mut best: Option<&Arc<dyn Provider>> = None;
    for provider in providers {
        if best.map_or(true, |b| provider.priority() > b.priority()) {
            best = Some(provider);
        }
    }
    best.map(Arc::clone)
}

impl core::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.provider.id()))
            .finish()
    }
}
