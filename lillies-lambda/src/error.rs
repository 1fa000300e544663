//! Lambda adapter error types.

use thiserror::Error;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, LambdaError>;

/// Boxed error returned by applications.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The inbound event could not be turned into a request.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The event does not have the expected shape.
    #[error("Malformed event: {0}")]
    Malformed(String),

    /// `isBase64Encoded` was set but the body is not valid base64.
    #[error("Invalid base64 body: {0}")]
    InvalidBody(#[from] base64::DecodeError),

    /// The method is not a valid HTTP token.
    #[error("Invalid HTTP method: {0:?}")]
    InvalidMethod(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// The application failed while handling a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The application returned an error, either from the call itself or
    /// while producing body chunks.
    #[error("{0}")]
    Application(String),

    /// The application panicked.
    #[error("Application panicked: {0}")]
    Panicked(String),

    /// The application returned without starting the response.
    #[error("Application returned without starting a response")]
    NotStarted,

    /// The response was started more than once.
    #[error("Response already started")]
    AlreadyStarted,

    /// The status line could not be parsed.
    #[error("Invalid status line: {0:?}")]
    InvalidStatus(String),
}

/// The captured response could not be put into a reply envelope.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A text response body is not valid UTF-8.
    #[error("Response body for content type {content_type:?} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        content_type: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Lambda adapter errors.
#[derive(Debug, Error)]
pub enum LambdaError {
    /// Event decoding error.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Application error.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Response encoding error.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lambda runtime error.
    #[error("Lambda runtime error: {0}")]
    Runtime(String),
}

impl From<lambda_runtime::Error> for LambdaError {
    fn from(err: lambda_runtime::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

impl From<lillies_security::SecurityError> for LambdaError {
    fn from(err: lillies_security::SecurityError) -> Self {
        Self::Config(err.to_string())
    }
}
