//! Adapter configuration.
//!
//! Resolved once at process start and shared read-only by every invocation.

use lillies_security::CorsPolicy;

use crate::{LambdaError, Result};

/// Lambda adapter configuration.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Cross-origin policy applied to every reply.
    pub cors: CorsPolicy,
    /// Content type assumed when a request has none.
    pub default_content_type: String,
    /// `SERVER_NAME` seen by the application.
    pub server_name: String,
    /// `SERVER_PORT` seen by the application.
    pub server_port: u16,
    /// `SERVER_PROTOCOL` seen by the application.
    pub server_protocol: String,
    /// URL scheme, also the fallback forwarded protocol.
    pub url_scheme: String,
    /// Forwarded host used when the request names none.
    pub default_host: String,
    /// Custom base path to strip (e.g., "/prod", "/dev").
    pub base_path: Option<String>,
    /// Status code for events that cannot be decoded.
    pub decode_error_status: u16,
    /// Enable request logging.
    pub log_requests: bool,
    /// Enable response logging.
    pub log_responses: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            cors: CorsPolicy::permissive(),
            default_content_type: "application/json".to_string(),
            server_name: "lambda".to_string(),
            server_port: 443,
            server_protocol: "HTTP/1.1".to_string(),
            url_scheme: "https".to_string(),
            default_host: "execute-api.amazonaws.com".to_string(),
            base_path: None,
            decode_error_status: 400,
            log_requests: true,
            log_responses: false,
        }
    }
}

impl AdapterConfig {
    /// Create configuration from `LILLIES_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// Unset or blank variables keep their defaults. Unparseable numbers and
    /// flags also fall back to defaults; invalid origin patterns and
    /// out-of-range status codes are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let mut cors = match var("LILLIES_CORS_ORIGINS").as_deref() {
            None | Some("*") => CorsPolicy::permissive(),
            Some(list) => split_list(list)
                .fold(CorsPolicy::new(), |cors, origin| cors.allow_origin(origin)),
        };

        // A pattern narrows the wildcard default
        if let Some(patterns) = var("LILLIES_CORS_ORIGIN_REGEX") {
            for pattern in split_list(&patterns) {
                cors = cors.allow_origin_regex(pattern)?;
            }
        }

        if let Some(headers) = var("LILLIES_CORS_ALLOW_HEADERS") {
            cors = cors.allow_headers(split_list(&headers).collect());
        }

        if let Some(methods) = var("LILLIES_CORS_ALLOW_METHODS") {
            cors = cors.allow_methods(split_list(&methods).collect());
        }

        if let Some(flag) = var("LILLIES_CORS_ALLOW_CREDENTIALS").and_then(|v| parse_flag(&v)) {
            cors = cors.allow_credentials(flag);
        }

        let decode_error_status = match var("LILLIES_DECODE_ERROR_STATUS") {
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|s| (400..600).contains(s))
                .ok_or_else(|| {
                    LambdaError::Config(format!(
                        "LILLIES_DECODE_ERROR_STATUS must be an error status (400-599), got {raw:?}"
                    ))
                })?,
            None => defaults.decode_error_status,
        };

        Ok(Self {
            cors,
            default_content_type: var("LILLIES_DEFAULT_CONTENT_TYPE")
                .unwrap_or(defaults.default_content_type),
            server_name: var("LILLIES_SERVER_NAME").unwrap_or(defaults.server_name),
            server_port: var("LILLIES_SERVER_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.server_port),
            server_protocol: defaults.server_protocol,
            url_scheme: defaults.url_scheme,
            default_host: var("LILLIES_DEFAULT_HOST").unwrap_or(defaults.default_host),
            base_path: var("LILLIES_BASE_PATH"),
            decode_error_status,
            log_requests: var("LILLIES_LOG_REQUESTS")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.log_requests),
            log_responses: var("LILLIES_LOG_RESPONSES")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.log_responses),
        })
    }

    /// Set the cross-origin policy.
    pub fn cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = cors;
        self
    }

    /// Set the default request content type.
    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    /// Set a base path to strip from requests.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Set the status used for undecodable events.
    pub fn decode_error_status(mut self, status: u16) -> Self {
        self.decode_error_status = status;
        self
    }

    /// Set the fallback forwarded host.
    pub fn default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = host.into();
        self
    }

    /// Enable request logging.
    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    /// Enable response logging.
    pub fn log_responses(mut self, enabled: bool) -> Self {
        self.log_responses = enabled;
        self
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // std::env::set_var is unsafe under parallel tests, so these go through
    // `from_lookup` with an in-memory source.
    fn config_from(vars: &[(&str, &str)]) -> Result<AdapterConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AdapterConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.default_content_type, "application/json");
        assert_eq!(config.server_name, "lambda");
        assert_eq!(config.server_port, 443);
        assert_eq!(config.decode_error_status, 400);
        assert!(config.base_path.is_none());
        assert!(config.cors.is_origin_allowed("https://anything.example"));
    }

    #[test]
    fn test_origin_list() {
        let config = config_from(&[(
            "LILLIES_CORS_ORIGINS",
            "https://shop.example.com, https://admin.example.com",
        )])
        .unwrap();

        assert!(config.cors.is_origin_allowed("https://admin.example.com"));
        assert!(!config.cors.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_origin_regex_narrows_wildcard() {
        let config = config_from(&[(
            "LILLIES_CORS_ORIGIN_REGEX",
            r"^https://.*\.example\.com$",
        )])
        .unwrap();

        assert!(config.cors.is_origin_allowed("https://app.example.com"));
        assert!(!config.cors.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_invalid_origin_regex() {
        let err = config_from(&[("LILLIES_CORS_ORIGIN_REGEX", "(")]).unwrap_err();
        assert!(matches!(err, LambdaError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("LILLIES_DEFAULT_CONTENT_TYPE", "text/plain"),
            ("LILLIES_SERVER_PORT", "8443"),
            ("LILLIES_BASE_PATH", "/prod"),
            ("LILLIES_DECODE_ERROR_STATUS", "422"),
            ("LILLIES_LOG_REQUESTS", "off"),
            ("LILLIES_LOG_RESPONSES", "true"),
        ])
        .unwrap();

        assert_eq!(config.default_content_type, "text/plain");
        assert_eq!(config.server_port, 8443);
        assert_eq!(config.base_path.as_deref(), Some("/prod"));
        assert_eq!(config.decode_error_status, 422);
        assert!(!config.log_requests);
        assert!(config.log_responses);
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = config_from(&[("LILLIES_SERVER_PORT", "not-a-port")]).unwrap();
        assert_eq!(config.server_port, 443);
    }

    #[test]
    fn test_decode_error_status_must_be_error() {
        assert!(config_from(&[("LILLIES_DECODE_ERROR_STATUS", "200")]).is_err());
        assert!(config_from(&[("LILLIES_DECODE_ERROR_STATUS", "abc")]).is_err());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("LILLIES_BASE_PATH", "   ")]).unwrap();
        assert!(config.base_path.is_none());
    }
}
