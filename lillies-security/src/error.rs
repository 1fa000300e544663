//! Security error types.

use thiserror::Error;

/// Result type for security policy construction.
pub type Result<T> = std::result::Result<T, SecurityError>;

/// Errors raised while building a security policy.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// An origin pattern failed to compile.
    #[error("Invalid origin pattern '{pattern}': {source}")]
    InvalidOriginPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
