//! Lambda runtime binding for Lillies applications.

use lambda_runtime::{LambdaEvent, service_fn};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::{
    AdapterConfig, Application, DecodeError, DispatchError, InboundEvent, ReplyEnvelope, Result,
    dispatch, environ, request,
    request::InvocationContext,
    response::ResponseEncoder,
};

/// Lambda adapter for a synchronous Lillies application.
///
/// Each invocation runs decode, build, invoke and encode in order. The
/// configuration is shared read-only across invocations.
pub struct LambdaAdapter<A> {
    app: Arc<A>,
    config: Arc<AdapterConfig>,
    encoder: ResponseEncoder,
}

impl<A> LambdaAdapter<A>
where
    A: Application + 'static,
{
    /// Create an adapter with the default configuration.
    pub fn new(app: A) -> Self {
        let config = AdapterConfig::default();
        Self {
            app: Arc::new(app),
            encoder: encoder_for(&config),
            config: Arc::new(config),
        }
    }

    /// Set the adapter configuration.
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.encoder = encoder_for(&config);
        self.config = Arc::new(config);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Handle one decoded event. Always produces an envelope.
    pub fn handle(&self, event: InboundEvent, invocation: Option<InvocationContext>) -> ReplyEnvelope {
        let origin = event
            .headers
            .as_ref()
            .and_then(|h| h.get("origin"))
            .map(str::to_string);

        let mut req = match request::decode(event, &self.config) {
            Ok(req) => req,
            Err(err) => return self.reject(&err, origin.as_deref()),
        };
        req.metadata.invocation = invocation;

        if self.config.log_requests {
            debug!(
                method = %req.method,
                path = %req.path,
                request_id = ?req.metadata.request_id,
                "Handling Lambda request"
            );
        }

        let environ = environ::build(req, &self.config);
        let result = dispatch::invoke(self.app.as_ref(), environ);

        if let Err(err) = &result {
            error!(error = %err, "Application dispatch failed");
        }

        let reply = self.encoder.encode(result, origin.as_deref());

        if self.config.log_responses {
            debug!(
                status = reply.status_code,
                base64 = reply.is_base64_encoded,
                "Lambda response"
            );
        }

        reply
    }

    /// Handle a raw event payload.
    ///
    /// A payload that does not have the event shape gets the decode error
    /// envelope.
    pub fn handle_value(&self, payload: Value, invocation: Option<InvocationContext>) -> ReplyEnvelope {
        let origin = origin_of(&payload);
        match serde_json::from_value::<InboundEvent>(payload) {
            Ok(event) => self.handle(event, invocation),
            Err(err) => self.reject(&DecodeError::from(err), origin.as_deref()),
        }
    }

    /// Handle a raw event payload on a blocking worker.
    pub async fn handle_blocking(
        self: Arc<Self>,
        payload: Value,
        invocation: Option<InvocationContext>,
    ) -> std::result::Result<ReplyEnvelope, lambda_runtime::Error> {
        let origin = origin_of(&payload);
        let adapter = self.clone();
        match tokio::task::spawn_blocking(move || adapter.handle_value(payload, invocation)).await {
            Ok(reply) => Ok(reply),
            Err(err) => self.worker_failed(err, origin.as_deref()),
        }
    }

    /// A panicked worker still gets a 500 envelope; a cancelled one gets none.
    fn worker_failed(
        &self,
        err: JoinError,
        origin: Option<&str>,
    ) -> std::result::Result<ReplyEnvelope, lambda_runtime::Error> {
        if !err.is_panic() {
            return Err(err.into());
        }
        error!(error = %err, "Adapter worker panicked");
        Ok(self
            .encoder
            .encode(Err(DispatchError::Panicked(err.to_string())), origin))
    }

    /// Run the Lambda runtime.
    ///
    /// This function never returns under normal operation.
    pub async fn run(self) -> Result<()> {
        info!("Starting Lillies Lambda adapter");

        let adapter = Arc::new(self);
        lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
            let adapter = adapter.clone();
            async move {
                let invocation = InvocationContext::from(&event.context);
                adapter.handle_blocking(event.payload, Some(invocation)).await
            }
        }))
        .await?;

        Ok(())
    }

    fn reject(&self, err: &DecodeError, origin: Option<&str>) -> ReplyEnvelope {
        warn!(error = %err, "Rejecting undecodable event");
        self.encoder.encode_decode_error(err, origin)
    }
}

fn encoder_for(config: &AdapterConfig) -> ResponseEncoder {
    ResponseEncoder::new(config.cors.clone()).decode_error_status(config.decode_error_status)
}

/// Best-effort `Origin` lookup on a payload that may not decode.
fn origin_of(payload: &Value) -> Option<String> {
    payload
        .get("headers")?
        .as_object()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("origin"))
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}
