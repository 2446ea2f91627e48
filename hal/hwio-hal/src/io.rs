//! Base trait for every I/O instance

use crate::error::IoError;

/// Common surface of a realized I/O instance
///
/// Instances are created by a provider, stored by the runtime under their
/// id, and shared between threads.
pub trait Io: Send + Sync {
    /// Unique id this instance is registered under
    fn id(&self) -> &str;

    /// Human-readable name (defaults to the id)
    fn name(&self) -> &str {
        self.id()
    }

    /// Id of the provider that built this instance
    fn provider_id(&self) -> &str;

    /// Release the instance
    ///
    /// Called once by the runtime when the instance is removed. Outputs
    /// should move to their configured shutdown value here.
    fn shutdown(&self) -> Result<(), IoError> {
        Ok(())
    }
}
