//! Transport port boundary.
//!
//! The transport is the physical bus endpoint: the one thing that can make
//! an identity visible to (or withdraw it from) the attached peer. The mode
//! controller is its only caller.

use async_trait::async_trait;

use crate::controller::ActiveInstance;
use crate::error::TransportError;

/// Physical endpoint capable of presenting or withdrawing one identity.
///
/// Both operations may block and sleep; callers must run on a
/// blocking-capable task context. Implementations bound each operation with
/// their own timeout and report overruns as [`TransportError::Timeout`].
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Present the given instance's identity on the bus. The peer observes
    /// a device (re)connect.
    async fn attach(&self, instance: &ActiveInstance) -> Result<(), TransportError>;

    /// Withdraw the current identity. The peer observes a disconnect.
    /// Must be safe to call when nothing is attached.
    async fn detach(&self) -> Result<(), TransportError>;
}
