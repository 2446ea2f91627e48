//! Runtime errors.

use std::path::PathBuf;

use hwio_hal::{BusError, IoError, ParseValueError};
use thiserror::Error;

use crate::io_type::IoType;

/// Result alias used throughout the runtime.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Runtime error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No platform registered under the id.
    #[error("platform '{0}' not found")]
    PlatformNotFound(String),

    /// No provider registered under the id (within the searched scope).
    #[error("provider '{id}' not found in {scope}")]
    ProviderNotFound { id: String, scope: String },

    /// No provider registered with the requested concrete type.
    #[error("no provider of type {0} is registered")]
    ProviderTypeNotFound(&'static str),

    /// No provider implements the I/O type in the searched scope.
    #[error("no provider for I/O type {io_type} in {scope}")]
    NoProviderFor { io_type: IoType, scope: String },

    /// No I/O instance exists under the id.
    #[error("I/O instance '{0}' not found")]
    IoNotFound(String),

    /// The id is empty after trimming.
    #[error("invalid I/O id '{0}': ids must not be blank")]
    InvalidId(String),

    /// The selected provider does not implement the required I/O type.
    #[error("I/O instance '{id}': provider '{provider}' implements {actual}, but {required} is required")]
    ProviderMismatch {
        id: String,
        provider: String,
        required: IoType,
        actual: IoType,
    },

    /// The request names neither a platform, a provider, nor an I/O type.
    #[error("I/O instance '{0}' could not be resolved: it defines no platform, provider or I/O type")]
    Unresolvable(String),

    /// The request names only a platform, and the platform cannot infer
    /// an I/O type from the instance's properties.
    #[error("I/O instance '{id}' could not be resolved on platform '{platform}': it names no provider or I/O type and none could be inferred")]
    UntypedOnPlatform { id: String, platform: String },

    /// An I/O instance with the id already exists.
    #[error("I/O instance '{0}' already exists")]
    AlreadyExists(String),

    /// A provider with the id was already registered.
    #[error("provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// A platform with the id was already registered.
    #[error("platform '{0}' is already registered")]
    DuplicatePlatform(String),

    /// The string is not a known I/O type or alias.
    #[error("unknown I/O type '{0}'")]
    UnknownIoType(String),

    /// A property value does not parse into its setting.
    #[error("invalid property '{key}': {message}")]
    InvalidProperty { key: String, message: String },

    /// A property source could not be loaded.
    #[error("failed to load properties from {origin}: {message}")]
    Properties { origin: String, message: String },

    /// A properties file could not be read.
    #[error("failed to read properties file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A provider or instance failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Shared bus could not be acquired.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The context has been shut down.
    #[error("context has been shut down")]
    Shutdown,
}

/// Coarse error taxonomy callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Platform, provider or instance absent
    NotFound,
    /// Request contradicts itself or cannot be resolved
    Conflicting,
    /// Id registered twice
    DuplicateRegistration,
    /// Bus lock not acquired in time (retryable)
    BusTimeout,
    /// Bus wait interrupted (not retryable)
    BusInterrupted,
    /// Unknown I/O type string
    AliasParseFailure,
    /// Property or configuration value is malformed
    InvalidConfig,
    /// Failure inside a provider or instance
    Io,
    /// Context already shut down
    Shutdown,
}

impl Error {
    /// Creates a provider-not-found error.
    pub fn provider_not_found(id: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::ProviderNotFound {
            id: id.into(),
            scope: scope.into(),
        }
    }

    /// Creates a no-provider-for-type error.
    pub fn no_provider_for(io_type: IoType, scope: impl Into<String>) -> Self {
        Self::NoProviderFor {
            io_type,
            scope: scope.into(),
        }
    }

    /// Creates an invalid property error.
    pub fn invalid_property(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a property loader error.
    pub fn properties(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Properties {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Maps a value parse failure onto the property it came from.
    pub fn from_parse(key: impl Into<String>, err: ParseValueError) -> Self {
        Self::invalid_property(key, err.to_string())
    }

    /// Taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PlatformNotFound(_)
            | Error::ProviderNotFound { .. }
            | Error::ProviderTypeNotFound(_)
            | Error::NoProviderFor { .. }
            | Error::IoNotFound(_) => ErrorKind::NotFound,
            Error::InvalidId(_)
            | Error::ProviderMismatch { .. }
            | Error::Unresolvable(_)
            | Error::UntypedOnPlatform { .. } => ErrorKind::Conflicting,
            Error::AlreadyExists(_) | Error::DuplicateProvider(_) | Error::DuplicatePlatform(_) => {
                ErrorKind::DuplicateRegistration
            }
            Error::UnknownIoType(_) => ErrorKind::AliasParseFailure,
            Error::InvalidProperty { .. } | Error::Properties { .. } | Error::ReadFile { .. } => {
                ErrorKind::InvalidConfig
            }
            Error::Io(IoError::Bus(bus)) | Error::Bus(bus) => match bus {
                BusError::Timeout { .. } => ErrorKind::BusTimeout,
                BusError::Interrupted { .. } => ErrorKind::BusInterrupted,
            },
            Error::Io(_) => ErrorKind::Io,
            Error::Shutdown => ErrorKind::Shutdown,
        }
    }
}
