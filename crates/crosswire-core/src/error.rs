//! Shared error type across crosswire crates.

use thiserror::Error;

/// Stable error categories (client-facing API).
///
/// The category decides how the dispatcher treats a failure: encoding and
/// configuration errors are local and non-retryable, transport errors feed the
/// policy-mismatch retry protocol, protocol and remote errors are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value could not be serialized (not whitelisted, or malformed).
    Encoding,
    /// Network or HTTP status failure.
    Transport,
    /// Malformed or unknown response body.
    Protocol,
    /// The server decoded the call and threw.
    Remote,
    /// Missing or invalid proxy configuration.
    Configuration,
    /// A policy manifest violated the manifest grammar.
    PolicyLoad,
}

impl ErrorKind {
    /// String representation used in logs and assertions.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Encoding => "ENCODING",
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::Remote => "REMOTE",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::PolicyLoad => "POLICY_LOAD",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CrosswireError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum CrosswireError {
    #[error("encoding failed: {0}")]
    Encoding(String),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("remote fault: {type_name}: {message}")]
    Remote { type_name: String, message: String },
    #[error("configuration invalid: {0}")]
    Configuration(String),
    #[error("policy load failed: {0}")]
    PolicyLoad(String),
}

impl CrosswireError {
    /// Map an error to its stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrosswireError::Encoding(_) => ErrorKind::Encoding,
            CrosswireError::Transport(_) => ErrorKind::Transport,
            CrosswireError::Protocol(_) => ErrorKind::Protocol,
            CrosswireError::Remote { .. } => ErrorKind::Remote,
            CrosswireError::Configuration(_) => ErrorKind::Configuration,
            CrosswireError::PolicyLoad(_) => ErrorKind::PolicyLoad,
        }
    }
}
