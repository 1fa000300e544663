//! # Lillies Lambda
//!
//! AWS Lambda adapter for the Lillies backend.
//!
//! API Gateway proxy events are decoded into a request, exposed to a
//! synchronous application as a CGI-style environment, and the captured
//! response is encoded back into the reply envelope the gateway expects.
//! Binary content types are base64 encoded and every reply, including error
//! replies, carries the cross-origin headers of the configured policy.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lillies_lambda::dispatch::body;
//! use lillies_lambda::{AdapterConfig, LambdaAdapter, application_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lillies_lambda::LambdaError> {
//!     // Initialize tracing for CloudWatch
//!     lillies_lambda::init_tracing();
//!
//!     let app = application_fn(|_env, start| {
//!         start.begin("200 OK", [("Content-Type", "application/json")])?;
//!         Ok(body::once(r#"{"status":"ok"}"#))
//!     });
//!
//!     LambdaAdapter::new(app)
//!         .with_config(AdapterConfig::from_env()?)
//!         .run()
//!         .await
//! }
//! ```
//!
//! ## Deployment
//!
//! ```bash
//! cargo lambda build --release
//! cargo lambda deploy
//! ```

mod classify;
mod config;
pub mod dispatch;
pub mod environ;
mod error;
pub mod event;
mod headers;
pub mod request;
pub mod response;
mod runtime;

pub use classify::is_binary;
pub use config::AdapterConfig;
pub use dispatch::{
    Application, CapturedResponse, ResponseBody, StartResponse, application_fn, invoke,
};
pub use environ::{BodyStream, DispatchEnvironment};
pub use error::{BoxError, DecodeError, DispatchError, EncodeError, LambdaError, Result};
pub use event::{InboundEvent, QueryParameters};
pub use headers::HeaderMap;
pub use request::{InvocationContext, NormalizedRequest, TransportMetadata, decode};
pub use response::{ReplyEnvelope, ResponseEncoder};
pub use runtime::LambdaAdapter;

// Re-export lambda types
pub use lambda_runtime;

/// Initialize tracing for Lambda/CloudWatch.
///
/// This sets up structured JSON logging suitable for CloudWatch Logs.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init();
}

/// Initialize tracing with a custom log level.
pub fn init_tracing_with_level(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::new(level);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init();
}
