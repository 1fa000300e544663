//! Dispatch environment construction.
//!
//! The application sees a CGI-style environment: fixed slots for the request
//! line, body metadata and server identity, plus one `HTTP_*` key per inbound
//! header.

use bytes::Bytes;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{self, Read};

use crate::{AdapterConfig, NormalizedRequest, TransportMetadata};

/// Environment key for the forwarded protocol marker.
pub const FORWARDED_PROTO_KEY: &str = "HTTP_X_FORWARDED_PROTO";
/// Environment key for the forwarded host marker.
pub const FORWARDED_HOST_KEY: &str = "HTTP_X_FORWARDED_HOST";

/// Map a header name to its `HTTP_*` environment key.
///
/// Returns `None` for headers that live in the fixed `CONTENT_TYPE` and
/// `CONTENT_LENGTH` slots.
///
/// ```
/// use lillies_lambda::environ::header_key;
///
/// assert_eq!(header_key("X-Api-Key").as_deref(), Some("HTTP_X_API_KEY"));
/// assert_eq!(header_key("content-type"), None);
/// ```
pub fn header_key(name: &str) -> Option<String> {
    let transformed: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();

    match transformed.as_str() {
        "CONTENT_TYPE" | "CONTENT_LENGTH" => None,
        _ => Some(format!("HTTP_{transformed}")),
    }
}

/// Single-pass reader over the request body.
///
/// Starts at offset 0. Once drained it stays at end of input. The stream
/// cannot be cloned, so the body cannot be read twice:
///
/// ```compile_fail
/// fn assert_clone<T: Clone>() {}
/// assert_clone::<lillies_lambda::BodyStream>();
/// ```
#[derive(Debug)]
pub struct BodyStream {
    data: Bytes,
    pos: usize,
}

impl BodyStream {
    /// Wrap a body.
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the stream has been fully read.
    pub fn is_consumed(&self) -> bool {
        self.remaining() == 0
    }

    /// Take everything not yet read, leaving the stream at its end.
    pub fn read_all(&mut self) -> Bytes {
        let rest = self.data.slice(self.pos..);
        self.pos = self.data.len();
        rest
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Everything the application needs to run one request.
#[derive(Debug)]
pub struct DispatchEnvironment {
    /// `REQUEST_METHOD`
    pub request_method: String,
    /// `PATH_INFO`
    pub path_info: String,
    /// `QUERY_STRING`
    pub query_string: String,
    /// `CONTENT_TYPE`
    pub content_type: String,
    /// `CONTENT_LENGTH`
    pub content_length: usize,
    /// `SERVER_NAME`
    pub server_name: String,
    /// `SERVER_PORT`
    pub server_port: u16,
    /// `SERVER_PROTOCOL`
    pub server_protocol: String,
    /// URL scheme.
    pub url_scheme: String,
    /// The application may be called from several threads at once.
    pub multithread: bool,
    /// The application may be called from several processes at once.
    pub multiprocess: bool,
    /// The application is called once per process.
    pub run_once: bool,
    /// Platform context.
    pub metadata: TransportMetadata,
    headers: BTreeMap<String, String>,
    input: BodyStream,
}

impl DispatchEnvironment {
    /// Look up any environment variable by key.
    pub fn var(&self, key: &str) -> Option<Cow<'_, str>> {
        let fixed = match key {
            "REQUEST_METHOD" => &self.request_method,
            "PATH_INFO" => &self.path_info,
            "QUERY_STRING" => &self.query_string,
            "CONTENT_TYPE" => &self.content_type,
            "SERVER_NAME" => &self.server_name,
            "SERVER_PROTOCOL" => &self.server_protocol,
            "CONTENT_LENGTH" => return Some(Cow::Owned(self.content_length.to_string())),
            "SERVER_PORT" => return Some(Cow::Owned(self.server_port.to_string())),
            _ => return self.headers.get(key).map(|v| Cow::Borrowed(v.as_str())),
        };
        Some(Cow::Borrowed(fixed.as_str()))
    }

    /// Look up a request header by its HTTP name.
    pub fn header(&self, name: &str) -> Option<&str> {
        match header_key(name) {
            Some(key) => self.headers.get(&key).map(String::as_str),
            None if name.eq_ignore_ascii_case("content-type") => Some(self.content_type.as_str()),
            None => None,
        }
    }

    /// All `HTTP_*` entries, sorted by key.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The request body stream.
    pub fn input(&mut self) -> &mut BodyStream {
        &mut self.input
    }
}

/// Build the dispatch environment for a request. Never fails.
pub fn build(req: NormalizedRequest, config: &AdapterConfig) -> DispatchEnvironment {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in req.headers.iter() {
        let Some(key) = header_key(name) else {
            continue;
        };
        headers
            .entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    let forwarded_proto = req
        .headers
        .get("x-forwarded-proto")
        .unwrap_or(config.url_scheme.as_str())
        .to_string();
    let forwarded_host = req
        .headers
        .get("x-forwarded-host")
        .or_else(|| req.headers.get("host"))
        .unwrap_or(config.default_host.as_str())
        .to_string();

    headers.insert(FORWARDED_PROTO_KEY.to_string(), forwarded_proto);
    headers.insert(FORWARDED_HOST_KEY.to_string(), forwarded_host);

    DispatchEnvironment {
        request_method: req.method,
        path_info: req.path,
        query_string: req.query_string,
        content_type: req.content_type,
        content_length: req.content_length,
        server_name: config.server_name.clone(),
        server_port: config.server_port,
        server_protocol: config.server_protocol.clone(),
        url_scheme: config.url_scheme.clone(),
        multithread: false,
        multiprocess: false,
        run_once: false,
        metadata: req.metadata,
        headers,
        input: BodyStream::new(req.body),
    }
}
