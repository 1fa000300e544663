//! Inbound API Gateway proxy event.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::HeaderMap;

/// HTTP invocation event delivered by the platform.
///
/// Every field is optional on the wire; defaults are applied when the event
/// is decoded, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    /// HTTP method.
    pub http_method: Option<String>,
    /// Request path.
    pub path: Option<String>,
    /// Query string parameters, in delivery order.
    pub query_string_parameters: Option<QueryParameters>,
    /// Request headers.
    pub headers: Option<HeaderMap>,
    /// Request body, possibly base64 text.
    pub body: Option<String>,
    /// Whether `body` is base64 encoded.
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_base64_encoded: bool,
    /// Request context from API Gateway.
    pub request_context: Option<EventRequestContext>,
}

/// Request context from API Gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequestContext {
    /// Request ID.
    pub request_id: Option<String>,
    /// Stage name.
    pub stage: Option<String>,
    /// Domain name.
    pub domain_name: Option<String>,
    /// Caller identity.
    pub identity: Option<EventIdentity>,
}

/// Caller identity from API Gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIdentity {
    /// Source IP.
    pub source_ip: Option<String>,
    /// User agent.
    pub user_agent: Option<String>,
}

/// Query string parameters in the order the gateway delivered them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters(Vec<(String, String)>);

impl QueryParameters {
    /// Create an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Get a parameter value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The parameters as name-value pairs.
    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}

impl Serialize for QueryParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QueryParameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QueryVisitor;

        impl<'de> Visitor<'de> for QueryVisitor {
            type Value = QueryParameters;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of query parameter names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<QueryParameters, A::Error> {
                let mut params = QueryParameters::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    params.set(name, value);
                }
                Ok(params)
            }
        }

        deserializer.deserialize_map(QueryVisitor)
    }
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl InboundEvent {
    /// Create an event for a method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: Some(method.into()),
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Parse from the platform's JSON payload.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .append(name, value);
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .get_or_insert_with(QueryParameters::new)
            .set(name, value);
        self
    }

    /// Set a text body.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.is_base64_encoded = false;
        self
    }

    /// Set a binary body, base64 encoded for transport.
    pub fn binary_body(mut self, data: &[u8]) -> Self {
        self.body = Some(STANDARD.encode(data));
        self.is_base64_encoded = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_event() {
        let event = InboundEvent::from_json(
            r#"{"httpMethod":"GET","path":"/health","headers":{},"queryStringParameters":null,"body":null}"#,
        )
        .unwrap();

        assert_eq!(event.http_method.as_deref(), Some("GET"));
        assert_eq!(event.path.as_deref(), Some("/health"));
        assert!(event.query_string_parameters.is_none());
        assert!(event.body.is_none());
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn test_parse_empty_object() {
        let event = InboundEvent::from_json("{}").unwrap();
        assert!(event.http_method.is_none());
        assert!(event.headers.is_none());
    }

    #[test]
    fn test_null_base64_flag_is_false() {
        let event = InboundEvent::from_json(r#"{"isBase64Encoded":null}"#).unwrap();
        assert!(!event.is_base64_encoded);
    }

    #[test]
    fn test_parse_request_context() {
        let event = InboundEvent::from_json(
            r#"{"requestContext":{"requestId":"r-1","stage":"prod","identity":{"sourceIp":"203.0.113.9"}}}"#,
        )
        .unwrap();

        let ctx = event.request_context.unwrap();
        assert_eq!(ctx.request_id.as_deref(), Some("r-1"));
        assert_eq!(ctx.stage.as_deref(), Some("prod"));
        assert_eq!(
            ctx.identity.and_then(|i| i.source_ip).as_deref(),
            Some("203.0.113.9")
        );
    }

    #[test]
    fn test_wrong_field_type_is_error() {
        assert!(InboundEvent::from_json(r#"{"headers": 5}"#).is_err());
        assert!(InboundEvent::from_json(r#"{"body": {"a": 1}}"#).is_err());
    }

    #[test]
    fn test_query_parameters_keep_delivery_order() {
        let event =
            InboundEvent::from_json(r#"{"queryStringParameters":{"zeta":"1","q":"red roses","a":"x"}}"#)
                .unwrap();

        let params = event.query_string_parameters.unwrap();
        assert_eq!(
            params.as_slice(),
            &[
                ("zeta".to_string(), "1".to_string()),
                ("q".to_string(), "red roses".to_string()),
                ("a".to_string(), "x".to_string()),
            ]
        );
        assert_eq!(params.get("q"), Some("red roses"));
    }

    #[test]
    fn test_query_builder_replaces_in_place() {
        let event = InboundEvent::new("GET", "/")
            .query("page", "1")
            .query("q", "lilies")
            .query("page", "2");

        let params = event.query_string_parameters.unwrap();
        assert_eq!(params.get("page"), Some("2"));
        assert_eq!(params.as_slice()[0].0, "page");
        assert_eq!(params.as_slice().len(), 2);
    }

    #[test]
    fn test_binary_body_builder() {
        let event = InboundEvent::new("POST", "/upload").binary_body(b"{\"a\":1}");
        assert_eq!(event.body.as_deref(), Some("eyJhIjoxfQ=="));
        assert!(event.is_base64_encoded);
    }
}
