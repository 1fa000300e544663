//! Security policy for the Lillies gateway.
//!
//! Currently this holds the cross-origin (CORS) policy that the Lambda
//! adapter stamps onto every reply envelope.
//!
//! # Example
//!
//! ```
//! use lillies_security::cors::CorsPolicy;
//!
//! // Development policy: every origin allowed
//! let cors = CorsPolicy::permissive();
//! assert!(cors.is_origin_allowed("https://anything.example"));
//!
//! // Production policy: explicit allow-list
//! let cors = CorsPolicy::new()
//!     .allow_origin("https://shop.example.com")
//!     .allow_methods(vec!["GET", "POST"]);
//! assert!(!cors.is_origin_allowed("https://evil.example"));
//! ```

pub mod cors;
mod error;

pub use cors::{AllowedOrigins, CorsPolicy};
pub use error::{Result, SecurityError};
