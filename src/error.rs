//! Error types for the gadget mode switching service.
//!
//! Each operation family gets its own typed enum so callers can match on the
//! exact failure kind instead of decoding strings or numeric codes.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A single failed configfs/sysfs filesystem operation.
#[derive(Debug, Error)]
#[error("{op} {path}: {source}")]
pub struct ConfigfsError {
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Errors from registering a template into the [`TemplateRegistry`].
///
/// [`TemplateRegistry`]: crate::registry::TemplateRegistry
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("template name must not be empty")]
    EmptyName,

    #[error("template '{0}' is already registered")]
    DuplicateName(String),

    #[error("template '{name}' has invalid configuration: {reason}")]
    InvalidConfig { name: String, reason: String },
}

/// Errors from resolving a template by name.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no template named '{0}'")]
    NotFound(String),
}

/// Errors from instantiating a profile from a template's configuration.
#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error("backing resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("profile configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Fs(#[from] ConfigfsError),
}

/// Errors from tearing a live profile down.
///
/// Teardown failures during a switch are surfaced but never abort the
/// sequence; the instance is considered gone either way.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error(transparent)]
    Fs(#[from] ConfigfsError),

    #[error("teardown incomplete: {0}")]
    Incomplete(String),
}

/// Errors from the transport port (UDC bind/unbind).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no USB device controller available")]
    NoUdc,

    #[error("transport operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Fs(#[from] ConfigfsError),

    #[error("transport worker failed: {0}")]
    Worker(String),
}

/// Result of a full mode switch, as returned by
/// [`ModeController::switch_to`](crate::controller::ModeController::switch_to).
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Target name is not in the registry. Nothing was touched.
    #[error("unknown mode '{0}'")]
    UnknownMode(String),

    /// The transport refused to release the current identity. The old
    /// instance remains authoritative and attached.
    #[error("failed to detach current identity")]
    DetachFailed(#[source] TransportError),

    /// The new template could not be realized. The system is left detached
    /// with no active instance.
    #[error("failed to instantiate mode '{name}'")]
    InstantiationFailed {
        name: String,
        #[source]
        source: InstantiateError,
    },

    /// The transport refused the freshly instantiated identity. The new
    /// instance was torn down again; the system is left detached with no
    /// active instance.
    #[error("transport rejected mode '{name}'")]
    AttachFailed {
        name: String,
        #[source]
        source: TransportError,
    },
}

/// Service-level error type for the daemon (startup, config, wiring).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gadget(#[from] ConfigfsError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Switch(#[from] SwitchError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for service-level operations.
pub type Result<T> = std::result::Result<T, AppError>;
