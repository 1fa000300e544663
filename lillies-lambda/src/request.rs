//! Inbound event decoding.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;

use crate::{AdapterConfig, DecodeError, HeaderMap, InboundEvent};

/// A request decoded from an invocation event.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    /// HTTP method, upper case.
    pub method: String,
    /// Request path, base path stripped.
    pub path: String,
    /// Percent-encoded query string without the leading `?`.
    pub query_string: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw request body.
    pub body: Bytes,
    /// Effective content type.
    pub content_type: String,
    /// Always `body.len()`.
    pub content_length: usize,
    /// Platform context.
    pub metadata: TransportMetadata,
}

/// Platform-specific context carried alongside the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportMetadata {
    /// Client address, if known.
    pub client_ip: Option<String>,
    /// Where `client_ip` came from.
    pub client_ip_source: Option<ClientIpSource>,
    /// `X-Forwarded-Proto` as received.
    pub forwarded_proto: Option<String>,
    /// API Gateway request ID.
    pub request_id: Option<String>,
    /// Stage name.
    pub stage: Option<String>,
    /// Domain name.
    pub domain_name: Option<String>,
    /// User agent reported by the gateway.
    pub user_agent: Option<String>,
    /// Lambda invocation context.
    pub invocation: Option<InvocationContext>,
}

/// Source of the client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIpSource {
    /// The gateway's caller identity.
    RequestContext,
    /// First hop of `X-Forwarded-For`.
    ForwardedFor,
}

/// Lambda invocation context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    /// Lambda request ID.
    pub request_id: String,
    /// Invoked function ARN.
    pub function_arn: String,
    /// Deadline in milliseconds since the epoch.
    pub deadline_ms: u64,
}

impl From<&lambda_runtime::Context> for InvocationContext {
    fn from(ctx: &lambda_runtime::Context) -> Self {
        Self {
            request_id: ctx.request_id.clone(),
            function_arn: ctx.invoked_function_arn.clone(),
            deadline_ms: ctx.deadline,
        }
    }
}

/// Decode an invocation event into a request.
///
/// Missing fields take their defaults (`GET`, `/`, no query, no headers,
/// empty body). A base64 body that does not decode is an error, never an
/// empty or partial body.
pub fn decode(event: InboundEvent, config: &AdapterConfig) -> Result<NormalizedRequest, DecodeError> {
    let method = match event.http_method.as_deref().map(str::trim) {
        None | Some("") => "GET".to_string(),
        Some(raw) => {
            let upper = raw.to_ascii_uppercase();
            http::Method::from_bytes(upper.as_bytes())
                .map_err(|_| DecodeError::InvalidMethod(raw.to_string()))?;
            upper
        }
    };

    let path = strip_base_path(event.path.as_deref().unwrap_or("/"), config.base_path.as_deref());
    let headers = event.headers.unwrap_or_default();

    let query_string = match event.query_string_parameters {
        Some(params) => serde_urlencoded::to_string(params.as_slice())
            .map_err(|e| DecodeError::Malformed(format!("queryStringParameters: {e}")))?,
        None => String::new(),
    };

    let body = match event.body {
        None => Bytes::new(),
        Some(text) if event.is_base64_encoded => Bytes::from(decode_base64(&text)?),
        Some(text) => Bytes::from(text),
    };

    let content_type = headers
        .get("content-type")
        .map(str::to_string)
        .unwrap_or_else(|| config.default_content_type.clone());

    let context = event.request_context.unwrap_or_default();
    let identity = context.identity.unwrap_or_default();

    let (client_ip, client_ip_source) = match identity.source_ip {
        Some(ip) => (Some(ip), Some(ClientIpSource::RequestContext)),
        None => match headers
            .get("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            Some(ip) => (Some(ip.to_string()), Some(ClientIpSource::ForwardedFor)),
            None => (None, None),
        },
    };

    let metadata = TransportMetadata {
        client_ip,
        client_ip_source,
        forwarded_proto: headers.get("x-forwarded-proto").map(str::to_string),
        request_id: context.request_id,
        stage: context.stage,
        domain_name: context.domain_name,
        user_agent: identity
            .user_agent
            .or_else(|| headers.get("user-agent").map(str::to_string)),
        invocation: None,
    };

    Ok(NormalizedRequest {
        method,
        path,
        query_string,
        content_length: body.len(),
        headers,
        body,
        content_type,
        metadata,
    })
}

/// Standard base64, tolerating MIME-style line breaks and other ASCII
/// whitespace. Any other byte outside the alphabet is an error.
fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if text.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: Vec<u8> = text
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(text)
    }
}

fn strip_base_path(path: &str, base_path: Option<&str>) -> String {
    let Some(base) = base_path.map(|b| b.trim_end_matches('/')).filter(|b| !b.is_empty()) else {
        return path.to_string();
    };

    match path.strip_prefix(base) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        // `/products` must not be stripped by a `/prod` base path
        _ => path.to_string(),
    }
}
