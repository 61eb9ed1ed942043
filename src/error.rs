//! Custom error types for the autofocus driver.
//!
//! This module defines the primary error type, `AutofocusError`. Using the
//! `thiserror` crate, it gives every layer of the driver (configuration loading,
//! property dispatch, connection management and device commands) one consistent
//! error to return through `?`.
//!
//! ## Error Hierarchy
//!
//! - **`Connection`**: The endpoint could not be opened or a sub-device/axis
//!   address did not resolve. The proxy stays disconnected; retrying later is safe.
//! - **`Communication`**: A command failed inside an established session (transport
//!   fault, device rejection, timeout). The connection is left as it was.
//! - **`Configuration`**: A value was rejected before any device interaction
//!   (out of range, wrong kind, unknown or read-only property).
//! - **`Config`**: Wraps `figment::Error` from loading the configuration file.
//!
//! [`AutofocusError::kind`] collapses the variants onto the three categories the
//! failure policy reasons about.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type AppResult<T> = std::result::Result<T, AutofocusError>;

/// Broad category of an [`AutofocusError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Endpoint unreachable or address resolution failure.
    Connection,
    /// Fault during an established session.
    Communication,
    /// Value rejected before reaching the device.
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Communication => "communication",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{}", label)
    }
}

/// Primary error type of the autofocus driver.
#[derive(Error, Debug)]
pub enum AutofocusError {
    /// Opening the endpoint or resolving an address failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command inside an established session failed.
    #[error("Device communication error: {0}")]
    Communication(String),

    /// A value failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// No property with this name exists.
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    /// The property cannot be written.
    #[error("Property '{0}' is read-only")]
    ReadOnlyProperty(String),

    /// The value kind does not match the property kind.
    #[error("Property '{name}' expects a {expected} value")]
    PropertyKindMismatch {
        /// Property name.
        name: String,
        /// Expected value kind.
        expected: &'static str,
    },

    /// Loading the configuration file or environment failed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),
}

impl AutofocusError {
    /// Category used by the failure policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutofocusError::Connection(_) => ErrorKind::Connection,
            AutofocusError::Communication(_) => ErrorKind::Communication,
            AutofocusError::Configuration(_)
            | AutofocusError::UnknownProperty(_)
            | AutofocusError::ReadOnlyProperty(_)
            | AutofocusError::PropertyKindMismatch { .. }
            | AutofocusError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Whether retrying the same call later can succeed without changing configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Communication
        )
    }
}
