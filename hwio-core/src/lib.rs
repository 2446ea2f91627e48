//! Hardware I/O runtime
//!
//! Applications ask for an I/O resource by id, type or configuration; the
//! runtime picks the provider that builds it. This crate contains
//! everything that does not depend on a specific driver:
//!
//! - I/O type table and alias parsing
//! - Property store with prefix inheritance, `.properties` and TOML loaders
//! - Provider, platform and plugin registries
//! - Resolution engine and instance registry ([`Context`])
//! - Context lifecycle listeners
//! - Per-bus arbitration for multi-step transactions

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod io;
pub mod io_type;
pub mod platform;
pub mod plugin;
pub mod properties;
pub mod provider;
pub mod registry;

pub use bus::{BusArbiter, BusLease, BusRegistry, BusSettings};
pub use config::{IoConfig, IoConfigBuilder, IoSettings};
pub use context::{Context, ContextBuilder, LifecycleEvent, LifecycleListener};
pub use error::{Error, ErrorKind, Result};
pub use io::IoInstance;
pub use io_type::IoType;
pub use platform::{Platform, PlatformRegistry, RegisteredPlatform};
pub use plugin::{Plugin, PluginService};
pub use properties::Properties;
pub use provider::{Provider, ProviderRegistry};

pub use hwio_hal as hal;
