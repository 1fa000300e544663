// Lillies - serverless gateway for the Lillies e-commerce backend
//
// This library turns API Gateway proxy events into calls on a synchronous
// application and encodes the application's response back into the reply
// envelope, with cross-origin headers on every reply.

// Re-export the adapter
pub use lillies_lambda::*;

// Re-export the cross-origin policy crate
pub use lillies_security;
pub use lillies_security::{AllowedOrigins, CorsPolicy};

// Prelude for common imports
pub mod prelude {
    pub use crate::dispatch::body;
    pub use crate::{
        AdapterConfig, Application, CorsPolicy, DispatchEnvironment, InboundEvent, LambdaAdapter,
        LambdaError, ReplyEnvelope, StartResponse, application_fn,
    };
}
