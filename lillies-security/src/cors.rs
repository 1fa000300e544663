//! CORS (Cross-Origin Resource Sharing) Policy
//!
//! Resolves the cross-origin headers attached to every gateway reply.
//!
//! # Features
//!
//! - Allowed origins (wildcard, allow-list, regex)
//! - Allowed methods
//! - Allowed headers
//! - Credentials support
//!
//! Unlike a request-filtering middleware, the policy never *omits* the
//! cross-origin headers. When the caller's origin is not allowed the reply
//! carries a fixed origin that browsers will reject, so failure responses stay
//! well-formed.
//!
//! # Quick Start
//!
//! ```
//! use lillies_security::cors::CorsPolicy;
//!
//! // Allow all origins (dev only!)
//! let cors = CorsPolicy::permissive();
//!
//! // Production policy - specific origins
//! let cors = CorsPolicy::new()
//!     .allow_origin("https://shop.example.com")
//!     .allow_origin_regex(r"^https://.*\.shop\.example\.com$")
//!     .unwrap()
//!     .allow_methods(vec!["GET", "POST"])
//!     .allow_headers(vec!["Content-Type", "Authorization"]);
//! ```

use regex::Regex;

use crate::{Result, SecurityError};

/// Response header carrying the allowed origin.
pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
/// Response header carrying the allowed request headers.
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
/// Response header carrying the allowed methods.
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
/// Response header enabling credentialed requests.
pub const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";

/// Request headers allowed by the development policy.
pub const DEFAULT_ALLOW_HEADERS: &[&str] = &[
    "Content-Type",
    "X-Amz-Date",
    "Authorization",
    "X-Api-Key",
    "X-Amz-Security-Token",
];

/// Methods allowed by the development policy.
pub const DEFAULT_ALLOW_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "OPTIONS"];

/// How request origins are matched.
#[derive(Debug, Clone)]
pub enum AllowedOrigins {
    /// Every origin is allowed (`*`).
    Any,
    /// Exact origins.
    List(Vec<String>),
    /// Origins matching any of the patterns.
    Pattern(Vec<Regex>),
}

/// Cross-origin policy, resolved once at process start.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    /// Origin rules; empty allows nothing.
    origins: Vec<AllowedOrigins>,

    /// Allowed request headers, in emission order
    allowed_headers: Vec<String>,

    /// Allowed HTTP methods, in emission order
    allowed_methods: Vec<String>,

    /// Allow credentials
    allow_credentials: bool,
}

impl CorsPolicy {
    /// Create a strict policy: no origins allowed until added.
    ///
    /// Headers and methods start from the gateway defaults.
    pub fn new() -> Self {
        Self {
            origins: Vec::new(),
            allowed_headers: DEFAULT_ALLOW_HEADERS.iter().map(|h| h.to_string()).collect(),
            allowed_methods: DEFAULT_ALLOW_METHODS.iter().map(|m| m.to_string()).collect(),
            allow_credentials: false,
        }
    }

    /// Permissive policy (allow all origins) - USE ONLY IN DEVELOPMENT
    ///
    /// ```
    /// use lillies_security::cors::CorsPolicy;
    ///
    /// let cors = CorsPolicy::permissive();
    /// let headers = cors.headers_for(None);
    /// assert_eq!(headers[0], ("Access-Control-Allow-Origin", "*".to_string()));
    /// ```
    pub fn permissive() -> Self {
        Self::new().allow_any_origin()
    }

    /// Allow a specific origin. Narrows a wildcard policy.
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        let origins = self.narrowed();
        match origins.iter_mut().find_map(|o| match o {
            AllowedOrigins::List(list) => Some(list),
            _ => None,
        }) {
            Some(list) => list.push(origin),
            None => origins.push(AllowedOrigins::List(vec![origin])),
        }
        self
    }

    /// Allow origins matching a regex pattern. Narrows a wildcard policy.
    pub fn allow_origin_regex(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| SecurityError::InvalidOriginPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let origins = self.narrowed();
        match origins.iter_mut().find_map(|o| match o {
            AllowedOrigins::Pattern(patterns) => Some(patterns),
            _ => None,
        }) {
            Some(patterns) => patterns.push(regex),
            None => origins.push(AllowedOrigins::Pattern(vec![regex])),
        }
        Ok(self)
    }

    /// Allow all origins (wildcard) - NOT RECOMMENDED FOR PRODUCTION
    pub fn allow_any_origin(mut self) -> Self {
        self.origins = vec![AllowedOrigins::Any];
        self
    }

    fn is_wildcard(&self) -> bool {
        self.origins
            .iter()
            .any(|rule| matches!(rule, AllowedOrigins::Any))
    }

    fn narrowed(&mut self) -> &mut Vec<AllowedOrigins> {
        self.origins
            .retain(|rule| !matches!(rule, AllowedOrigins::Any));
        &mut self.origins
    }

    /// Set allowed request headers.
    pub fn allow_headers(mut self, headers: Vec<impl Into<String>>) -> Self {
        self.allowed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Set allowed HTTP methods.
    pub fn allow_methods(mut self, methods: Vec<impl Into<String>>) -> Self {
        self.allowed_methods = methods
            .into_iter()
            .map(|m| m.into().to_uppercase())
            .collect();
        self
    }

    /// Allow credentials (cookies, authorization headers).
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Check if origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|rule| match rule {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(list) => list.iter().any(|o| o == origin),
            AllowedOrigins::Pattern(patterns) => patterns.iter().any(|p| p.is_match(origin)),
        })
    }

    /// Resolve the `Access-Control-Allow-Origin` value for a caller.
    ///
    /// Returns the value and whether it depends on the request origin
    /// (and so needs `Vary: Origin`).
    pub fn resolve_origin(&self, request_origin: Option<&str>) -> (String, bool) {
        match (self.is_wildcard(), request_origin) {
            // `*` is not valid alongside credentials
            (true, Some(origin)) if self.allow_credentials => (origin.to_string(), true),
            (true, _) => ("*".to_string(), false),
            (false, Some(origin)) if self.is_origin_allowed(origin) => (origin.to_string(), true),
            (false, _) => {
                let fallback = self
                    .origins
                    .iter()
                    .find_map(|rule| match rule {
                        AllowedOrigins::List(list) => list.first().cloned(),
                        _ => None,
                    })
                    .unwrap_or_else(|| "null".to_string());
                (fallback, true)
            }
        }
    }

    /// Build the cross-origin headers for a reply.
    ///
    /// The three `Access-Control-Allow-*` headers are always returned, in a
    /// fixed order.
    pub fn headers_for(&self, request_origin: Option<&str>) -> Vec<(&'static str, String)> {
        let (origin, vary) = self.resolve_origin(request_origin);

        let mut headers = vec![
            (ALLOW_ORIGIN, origin),
            (ALLOW_HEADERS, self.allowed_headers.join(",")),
            (ALLOW_METHODS, self.allowed_methods.join(",")),
        ];

        if self.allow_credentials {
            headers.push((ALLOW_CREDENTIALS, "true".to_string()));
        }

        if vary {
            headers.push(("Vary", "Origin".to_string()));
        }

        headers
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_permissive() {
        let cors = CorsPolicy::permissive();
        assert!(cors.is_origin_allowed("https://anything.example"));
        assert!(cors.is_wildcard());
    }

    #[test]
    fn test_cors_new_allows_nothing() {
        let cors = CorsPolicy::new();
        assert!(!cors.is_origin_allowed("https://shop.example.com"));
    }

    #[test]
    fn test_allow_origin() {
        let cors = CorsPolicy::new()
            .allow_origin("https://shop.example.com")
            .allow_origin("https://admin.example.com");

        assert!(cors.is_origin_allowed("https://shop.example.com"));
        assert!(cors.is_origin_allowed("https://admin.example.com"));
        assert!(!cors.is_origin_allowed("https://evil.com"));
        assert_eq!(cors.origins.len(), 1);
    }

    #[test]
    fn test_allow_origin_regex() {
        let cors = CorsPolicy::new()
            .allow_origin_regex(r"^https://.*\.example\.com$")
            .unwrap();

        assert!(cors.is_origin_allowed("https://app.example.com"));
        assert!(!cors.is_origin_allowed("https://example.com"));
        assert!(!cors.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_allow_origin_narrows_wildcard() {
        let cors = CorsPolicy::permissive().allow_origin("https://shop.example.com");

        assert!(!cors.is_wildcard());
        assert!(!cors.is_origin_allowed("https://evil.com"));

        let cors = cors.allow_any_origin();
        assert!(cors.is_origin_allowed("https://evil.com"));
        assert_eq!(cors.resolve_origin(Some("https://evil.com")).0, "*");
    }

    #[test]
    fn test_invalid_regex() {
        let err = CorsPolicy::new().allow_origin_regex("(unclosed").unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_permissive_headers() {
        let headers = CorsPolicy::permissive().headers_for(Some("https://x.example"));

        assert_eq!(
            headers,
            vec![
                (ALLOW_ORIGIN, "*".to_string()),
                (
                    ALLOW_HEADERS,
                    "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token"
                        .to_string()
                ),
                (ALLOW_METHODS, "GET,POST,PUT,DELETE,OPTIONS".to_string()),
            ]
        );
    }

    #[test]
    fn test_allowed_origin_is_echoed() {
        let cors = CorsPolicy::new().allow_origin("https://shop.example.com");
        let (origin, vary) = cors.resolve_origin(Some("https://shop.example.com"));

        assert_eq!(origin, "https://shop.example.com");
        assert!(vary);
    }

    #[test]
    fn test_disallowed_origin_falls_back() {
        let cors = CorsPolicy::new()
            .allow_origin("https://shop.example.com")
            .allow_origin("https://admin.example.com");

        let (origin, _) = cors.resolve_origin(Some("https://evil.com"));
        assert_eq!(origin, "https://shop.example.com");

        let (origin, _) = cors.resolve_origin(None);
        assert_eq!(origin, "https://shop.example.com");
    }

    #[test]
    fn test_pattern_only_falls_back_to_null() {
        let cors = CorsPolicy::new()
            .allow_origin_regex(r"^https://.*\.example\.com$")
            .unwrap();

        let (origin, _) = cors.resolve_origin(Some("https://evil.com"));
        assert_eq!(origin, "null");
    }

    #[test]
    fn test_credentials_echo_origin() {
        let cors = CorsPolicy::permissive().allow_credentials(true);
        let headers = cors.headers_for(Some("https://shop.example.com"));

        assert_eq!(headers[0].1, "https://shop.example.com");
        assert!(headers.contains(&(ALLOW_CREDENTIALS, "true".to_string())));
        assert!(headers.contains(&("Vary", "Origin".to_string())));
    }

    #[test]
    fn test_allow_methods_uppercased() {
        let cors = CorsPolicy::permissive().allow_methods(vec!["get", "Post"]);
        let headers = cors.headers_for(None);

        assert_eq!(headers[2], (ALLOW_METHODS, "GET,POST".to_string()));
    }
}
