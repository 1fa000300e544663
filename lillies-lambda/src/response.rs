//! Reply envelope encoding.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use lillies_security::CorsPolicy;
use serde::{Deserialize, Serialize};

use crate::{
    CapturedResponse, DecodeError, DispatchError, EncodeError, HeaderMap, classify::is_binary,
};

/// Reply returned to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    /// HTTP status code.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: HeaderMap,
    /// Response body, base64 text when `is_base64_encoded`.
    #[serde(default)]
    pub body: String,
    /// Whether the body is base64 encoded.
    #[serde(rename = "isBase64Encoded", default)]
    pub is_base64_encoded: bool,
}

impl ReplyEnvelope {
    /// Create an empty reply.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: HeaderMap::new(),
            body: String::new(),
            is_base64_encoded: false,
        }
    }

    /// Create a JSON error reply: `{"error": message}`.
    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        let body = serde_json::json!({
            "error": message.into()
        });
        let mut reply = Self::new(status_code);
        reply.headers.insert("Content-Type", "application/json");
        reply.body = body.to_string();
        reply
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The raw body bytes, undoing base64 if needed.
    pub fn body_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.is_base64_encoded {
            STANDARD.decode(&self.body)
        } else {
            Ok(self.body.as_bytes().to_vec())
        }
    }

    /// Convert to JSON string for the platform.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Turns dispatch outcomes into reply envelopes.
///
/// Every envelope it produces carries the cross-origin headers, set last so
/// they override anything the application sent.
#[derive(Debug, Clone)]
pub struct ResponseEncoder {
    cors: CorsPolicy,
    decode_error_status: u16,
}

impl ResponseEncoder {
    /// Create an encoder for a cross-origin policy.
    pub fn new(cors: CorsPolicy) -> Self {
        Self {
            cors,
            decode_error_status: 400,
        }
    }

    /// Set the status used for undecodable events.
    pub fn decode_error_status(mut self, status: u16) -> Self {
        self.decode_error_status = status;
        self
    }

    /// Encode the outcome of a dispatch.
    ///
    /// `request_origin` is the caller's `Origin` header, used by non-wildcard
    /// policies.
    pub fn encode(
        &self,
        result: Result<CapturedResponse, DispatchError>,
        request_origin: Option<&str>,
    ) -> ReplyEnvelope {
        let reply = match result {
            Ok(captured) => match encode_captured(captured) {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::error!(error = %err, "Failed to encode response body");
                    ReplyEnvelope::error(500, err.to_string())
                }
            },
            Err(err) => ReplyEnvelope::error(500, err.to_string()),
        };
        self.with_cors(reply, request_origin)
    }

    /// Encode a failure to decode the inbound event.
    pub fn encode_decode_error(
        &self,
        err: &DecodeError,
        request_origin: Option<&str>,
    ) -> ReplyEnvelope {
        self.with_cors(
            ReplyEnvelope::error(self.decode_error_status, err.to_string()),
            request_origin,
        )
    }

    fn with_cors(&self, mut reply: ReplyEnvelope, request_origin: Option<&str>) -> ReplyEnvelope {
        for (name, value) in self.cors.headers_for(request_origin) {
            reply.headers.insert(name, value);
        }
        reply
    }
}

/// Encode a captured response without cross-origin headers.
///
/// Headers are copied in order (a repeated name keeps its last value). An
/// empty body is an empty, unencoded string. Otherwise binary content types
/// are base64 encoded and everything else must be valid UTF-8.
pub fn encode_captured(captured: CapturedResponse) -> Result<ReplyEnvelope, EncodeError> {
    let body = captured.body();
    let content_type = captured.header("content-type").unwrap_or("").to_string();

    let mut reply = ReplyEnvelope::new(captured.status);
    reply.headers = captured.headers.into_iter().collect();

    if body.is_empty() {
        return Ok(reply);
    }

    if is_binary(&content_type) {
        reply.body = STANDARD.encode(&body);
        reply.is_base64_encoded = true;
    } else {
        reply.body = String::from_utf8(body.to_vec())
            .map_err(|source| EncodeError::InvalidUtf8 {
                content_type,
                source,
            })?;
    }

    Ok(reply)
}
