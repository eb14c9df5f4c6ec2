//! Typed error definitions for the reasoning core.
//!
//! NO PANICS in the core path - all errors are typed and recoverable.
//! Defense-in-depth: explicit error codes for observability and debugging.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, KolibriError>;

/// Errors surfaced by the reasoning core. Never swallowed silently; see
/// `is_recoverable`/`is_critical` for how a caller may choose to react.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KolibriError {
    /// Canonical payload, canonical config, or formula string would exceed
    /// its fixed buffer. Fatal for the tick that produced it.
    #[error("encoding overflow: {what} exceeds limit of {limit} bytes")]
    EncodingOverflow { what: &'static str, limit: usize },

    /// SHA-256 or HMAC context allocation failed.
    #[error("hash initialization failed: {context}")]
    HashInitFailure { context: &'static str },

    /// Filesystem open/read/write/flush failed.
    #[error("io error: {0}")]
    Io(String),

    /// Raised during `ledger::verify`: prev mismatch, hash mismatch, hmac
    /// mismatch, missing-key-with-hmac, unexpected-hmac-without-key,
    /// non-monotone step, parent mismatch, or parse error.
    #[error("chain invalid at step {step}: {reason}")]
    ChainInvalid { step: u64, reason: String },

    /// Config file unreadable or malformed. Not fatal - defaults are used
    /// and the source path is marked "not loaded"; callers log this as a
    /// warning rather than abort.
    #[error("config parse error for {path}: {reason}")]
    ConfigParse { path: String, reason: String },
}

impl From<std::io::Error> for KolibriError {
    fn from(e: std::io::Error) -> Self {
        KolibriError::Io(e.to_string())
    }
}

impl KolibriError {
    /// Error code for monitoring and alerting.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EncodingOverflow { .. } => "E1000",
            Self::HashInitFailure { .. } => "E2000",
            Self::Io(_) => "E3000",
            Self::ChainInvalid { .. } => "E4000",
            Self::ConfigParse { .. } => "E5000",
        }
    }

    /// Is this error recoverable? (for fallback logic)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChainInvalid { .. } | Self::ConfigParse { .. })
    }

    /// Should this error trigger an alert?
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::EncodingOverflow { .. } | Self::HashInitFailure { .. }
        )
    }
}
