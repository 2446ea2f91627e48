//! Provider resolution
//!
//! Every request shape (`create(id)`, `create_as(id, type)`,
//! `create_with_config(config)`) is reduced to a [`Request`] and run
//! through the same precedence:
//!
//! 1. a named platform takes over; the rest of the policy is applied to
//!    that platform's providers only
//! 2. a named provider is used directly; a required I/O type it does not
//!    implement is an error, never a silent substitution
//! 3. a known I/O type selects the default provider, the default
//!    platform's first, then the best process-wide one
//! 4. a named platform may infer the type from the instance's properties
//! 5. anything else is unresolvable
//!
//! The context scope and the platform scope differ only in where a
//! provider id or a default is looked up.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io_type::IoType;
use crate::platform::{PlatformRegistry, RegisteredPlatform};
use crate::properties::Properties;
use crate::provider::{Provider, ProviderRegistry};

/// Routing data of one creation request
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<'a> {
    pub id: &'a str,
    pub platform: Option<&'a str>,
    pub provider: Option<&'a str>,
    pub io_type: Option<IoType>,
    /// The id's own properties, prefix stripped
    pub properties: Option<&'a Properties>,
}

/// Outcome of resolution
pub(crate) struct Resolution {
    pub provider: Arc<dyn Provider>,
    /// Set when a named platform handled the request
    pub platform: Option<Arc<RegisteredPlatform>>,
}

/// Where provider ids and defaults are looked up
trait Scope {
    fn provider(&self, id: &str) -> Result<Arc<dyn Provider>>;
    fn default_for(&self, io_type: IoType) -> Result<Arc<dyn Provider>>;

    /// Type implied by the request's properties, if the scope can tell
    fn infer_type(&self, _properties: &Properties) -> Option<IoType> {
        None
    }

    /// Error for a request that names nothing this scope can use
    fn unresolvable(&self, id: &str) -> Error {
        Error::Unresolvable(id.to_string())
    }
}

/// Whole context: every registered provider, default platform preferred
struct ContextScope<'a> {
    providers: &'a ProviderRegistry,
    platforms: &'a PlatformRegistry,
}

impl Scope for ContextScope<'_> {
    fn provider(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers.get(id)
    }

    fn default_for(&self, io_type: IoType) -> Result<Arc<dyn Provider>> {
        if let Some(platform) = self.platforms.default_platform() {
            match platform.provider_for(io_type) {
                Ok(provider) => return Ok(provider),
                Err(Error::NoProviderFor { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        self.providers.default_for(io_type)
    }
}

/// One platform's bundle
struct PlatformScope<'a>(&'a RegisteredPlatform);

impl Scope for PlatformScope<'_> {
    fn provider(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.0.provider(id)
    }

    fn default_for(&self, io_type: IoType) -> Result<Arc<dyn Provider>> {
        self.0.provider_for(io_type)
    }

    fn infer_type(&self, properties: &Properties) -> Option<IoType> {
        self.0.platform().infer_type(properties)
    }

    fn unresolvable(&self, id: &str) -> Error {
        Error::UntypedOnPlatform {
            id: id.to_string(),
            platform: self.0.id().to_string(),
        }
    }
}

/// Read-only view of the frozen registries
pub(crate) struct Resolver<'a> {
    pub providers: &'a ProviderRegistry,
    pub platforms: &'a PlatformRegistry,
}

impl Resolver<'_> {
    pub fn resolve(&self, request: &Request<'_>) -> Result<Resolution> {
        if let Some(platform_id) = request.platform {
            let platform = self.platforms.get(platform_id)?;
            let provider = select(&PlatformScope(&platform), request)?;
            tracing::debug!(
                id = request.id,
                platform = platform_id,
                provider = provider.id(),
                "resolved through named platform"
            );
            return Ok(Resolution {
                provider,
                platform: Some(platform),
            });
        }

        let scope = ContextScope {
            providers: self.providers,
            platforms: self.platforms,
        };
        let provider = select(&scope, request)?;
        tracing::debug!(id = request.id, provider = provider.id(), "resolved");
        Ok(Resolution {
            provider,
            platform: None,
        })
    }

    /// Default provider for `io_type` in the context scope
    pub fn default_for(&self, io_type: IoType) -> Result<Arc<dyn Provider>> {
        ContextScope {
            providers: self.providers,
            platforms: self.platforms,
        }
        .default_for(io_type)
    }
}

fn select(scope: &impl Scope, request: &Request<'_>) -> Result<Arc<dyn Provider>> {
    if let Some(provider_id) = request.provider {
        let provider = scope.provider(provider_id)?;
        if let Some(required) = request.io_type {
            if provider.io_type() != required {
                return Err(Error::ProviderMismatch {
                    id: request.id.to_string(),
                    provider: provider_id.to_string(),
                    required,
                    actual: provider.io_type(),
                });
            }
        }
        return Ok(provider);
    }

    if let Some(io_type) = request.io_type {
        return scope.default_for(io_type);
    }

    if let Some(io_type) = request.properties.and_then(|props| scope.infer_type(props)) {
        tracing::debug!(id = request.id, io_type = %io_type, "I/O type inferred");
        return scope.default_for(io_type);
    }

    Err(scope.unresolvable(request.id))
}
