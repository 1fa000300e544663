//! Application dispatch.
//!
//! Applications follow a two-phase contract: they start the response once
//! through [`StartResponse::begin`] and then return an iterator of body
//! chunks. [`invoke`] drives one call, drains the body eagerly and turns
//! every failure (returned errors, failing chunks, panics, protocol misuse)
//! into a [`DispatchError`]. Nothing is retried: the body stream is single
//! pass and a second call could repeat side effects.

use bytes::{Bytes, BytesMut};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::{BoxError, DispatchEnvironment, DispatchError};

/// Body chunks produced by an application.
pub type ResponseBody = Box<dyn Iterator<Item = Result<Bytes, BoxError>> + Send>;

/// A synchronous request-handling application.
pub trait Application: Send + Sync {
    /// Handle one request.
    ///
    /// Must call `start.begin` exactly once before returning the body.
    fn call(
        &self,
        environ: DispatchEnvironment,
        start: &mut StartResponse,
    ) -> Result<ResponseBody, BoxError>;
}

/// Application built from a closure, see [`application_fn`].
#[derive(Clone, Copy)]
pub struct ApplicationFn<F>(F);

/// Wrap a closure as an [`Application`].
///
/// ```
/// use lillies_lambda::dispatch::{application_fn, body};
///
/// let app = application_fn(|_env, start| {
///     start.begin("200 OK", [("Content-Type", "text/plain")])?;
///     Ok(body::once("hello"))
/// });
/// # let _ = app;
/// ```
pub fn application_fn<F>(f: F) -> ApplicationFn<F>
where
    F: Fn(DispatchEnvironment, &mut StartResponse) -> Result<ResponseBody, BoxError> + Send + Sync,
{
    ApplicationFn(f)
}

impl<F> Application for ApplicationFn<F>
where
    F: Fn(DispatchEnvironment, &mut StartResponse) -> Result<ResponseBody, BoxError> + Send + Sync,
{
    fn call(
        &self,
        environ: DispatchEnvironment,
        start: &mut StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        (self.0)(environ, start)
    }
}

/// Body constructors for applications.
pub mod body {
    use super::*;

    /// An empty body.
    pub fn empty() -> ResponseBody {
        Box::new(std::iter::empty::<Result<Bytes, BoxError>>())
    }

    /// A body of one chunk.
    pub fn once(chunk: impl Into<Bytes>) -> ResponseBody {
        let chunk: Bytes = chunk.into();
        Box::new(std::iter::once(Ok::<_, BoxError>(chunk)))
    }

    /// A body of several chunks.
    pub fn chunks<I, B>(chunks: I) -> ResponseBody
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Box::new(
            chunks
                .into_iter()
                .map(|c| -> Result<Bytes, BoxError> { Ok(c.into()) }),
        )
    }
}

/// Response-start callback handed to the application.
#[derive(Debug, Default)]
pub struct StartResponse {
    started: Option<(u16, Vec<(String, String)>)>,
    fault: Option<DispatchError>,
}

impl StartResponse {
    /// Start the response with a status line such as `"200 OK"` and the
    /// response headers.
    ///
    /// A second call or an unparseable status line fails the whole dispatch,
    /// even if the application ignores the returned error.
    pub fn begin<I, K, V>(&mut self, status: &str, headers: I) -> Result<(), DispatchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if self.started.is_some() {
            return Err(self.fail(DispatchError::AlreadyStarted));
        }

        let code = match parse_status_line(status) {
            Some(code) => code,
            None => return Err(self.fail(DispatchError::InvalidStatus(status.to_string()))),
        };

        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.started = Some((code, headers));
        Ok(())
    }

    /// Whether the response has been started.
    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    fn fail(&mut self, err: DispatchError) -> DispatchError {
        self.fault.get_or_insert(err).clone()
    }

    fn finish(self) -> Result<(u16, Vec<(String, String)>), DispatchError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        self.started.ok_or(DispatchError::NotStarted)
    }
}

fn parse_status_line(status: &str) -> Option<u16> {
    let code = status.split_whitespace().next()?;
    if code.len() != 3 {
        return None;
    }
    let code: u16 = code.parse().ok()?;
    http::StatusCode::from_u16(code).ok().map(|s| s.as_u16())
}

/// Status, headers and body captured from one application call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    /// Status code.
    pub status: u16,
    /// Headers in the order the application gave them.
    pub headers: Vec<(String, String)>,
    /// Non-empty body chunks, in order.
    pub chunks: Vec<Bytes>,
}

impl CapturedResponse {
    /// Create a response from a status, headers and a single body.
    pub fn new<K, V>(status: u16, headers: Vec<(K, V)>, body: impl Into<Bytes>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let body = body.into();
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            chunks: if body.is_empty() { Vec::new() } else { vec![body] },
        }
    }

    /// Last value for a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body chunks joined in order.
    pub fn body(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            chunks => {
                let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
                for chunk in chunks {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}

/// Call an application once and capture its response.
pub fn invoke<A>(app: &A, environ: DispatchEnvironment) -> Result<CapturedResponse, DispatchError>
where
    A: Application + ?Sized,
{
    let mut start = StartResponse::default();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let body = app
            .call(environ, &mut start)
            .map_err(|e| DispatchError::Application(e.to_string()))?;

        let mut chunks = Vec::new();
        for chunk in body {
            let chunk = chunk.map_err(|e| DispatchError::Application(e.to_string()))?;
            if !chunk.is_empty() {
                chunks.push(chunk);
            }
        }
        Ok::<_, DispatchError>(chunks)
    }));

    let chunks = match outcome {
        Ok(result) => result,
        Err(payload) => Err(DispatchError::Panicked(panic_message(payload.as_ref()))),
    };

    // A protocol fault recorded by `begin` wins over whatever the
    // application did afterwards.
    let chunks = match (chunks, &start.fault) {
        (_, Some(fault)) => return Err(fault.clone()),
        (result, None) => result?,
    };

    let (status, headers) = start.finish()?;
    Ok(CapturedResponse {
        status,
        headers,
        chunks,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdapterConfig, InboundEvent, environ, request};
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn env() -> DispatchEnvironment {
        env_for(InboundEvent::new("GET", "/health"))
    }

    fn env_for(event: InboundEvent) -> DispatchEnvironment {
        let config = AdapterConfig::default();
        environ::build(request::decode(event, &config).unwrap(), &config)
    }

    #[test]
    fn test_captures_status_headers_and_body() {
        let app = application_fn(|_env, start| {
            start.begin("201 Created", [("Content-Type", "application/json"), ("X-Id", "7")])?;
            Ok(body::chunks(vec!["{\"id\":", "", "7}"]))
        });

        let captured = invoke(&app, env()).unwrap();

        assert_eq!(captured.status, 201);
        assert_eq!(
            captured.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Id".to_string(), "7".to_string()),
            ]
        );
        assert_eq!(captured.chunks.len(), 2);
        assert_eq!(&captured.body()[..], b"{\"id\":7}");
    }

    #[test]
    fn test_application_reads_body() {
        let app = application_fn(|mut env, start| {
            let mut received = Vec::new();
            env.input().read_to_end(&mut received)?;
            start.begin("200 OK", Vec::<(String, String)>::new())?;
            Ok(body::once(received))
        });

        let captured =
            invoke(&app, env_for(InboundEvent::new("POST", "/echo").text_body("ping"))).unwrap();
        assert_eq!(&captured.body()[..], b"ping");
    }

    #[test]
    fn test_error_before_start() {
        let app = application_fn(|_env, _start| Err("database unavailable".into()));

        let err = invoke(&app, env()).unwrap_err();
        assert_eq!(err, DispatchError::Application("database unavailable".to_string()));
        assert_eq!(err.to_string(), "database unavailable");
    }

    #[test]
    fn test_never_started() {
        let app = application_fn(|_env, _start| Ok(body::once("orphan")));

        assert_eq!(invoke(&app, env()).unwrap_err(), DispatchError::NotStarted);
    }

    #[test]
    fn test_started_twice() {
        let app = application_fn(|_env, start| {
            start.begin("200 OK", [("A", "1")])?;
            let _ = start.begin("500 Oops", [("B", "2")]);
            Ok(body::empty())
        });

        assert_eq!(invoke(&app, env()).unwrap_err(), DispatchError::AlreadyStarted);
    }

    #[test]
    fn test_invalid_status_line() {
        for status in ["OK", "20 OK", "2000 OK", ""] {
            let app = application_fn(move |_env, start| {
                let _ = start.begin(status, [("A", "1")]);
                Ok(body::empty())
            });

            assert!(matches!(
                invoke(&app, env()),
                Err(DispatchError::InvalidStatus(_))
            ));
        }
    }

    #[test]
    fn test_chunk_failure() {
        let app = application_fn(|_env, start| {
            start.begin("200 OK", [("Content-Type", "text/plain")])?;
            let chunks: Vec<Result<Bytes, BoxError>> =
                vec![Ok(Bytes::from_static(b"partial")), Err("stream broke".into())];
            Ok(Box::new(chunks.into_iter()) as ResponseBody)
        });

        assert_eq!(
            invoke(&app, env()).unwrap_err(),
            DispatchError::Application("stream broke".to_string())
        );
    }

    #[test]
    fn test_panic_is_caught() {
        let app = application_fn(|_env, _start| panic!("handler exploded"));

        assert_eq!(
            invoke(&app, env()).unwrap_err(),
            DispatchError::Panicked("handler exploded".to_string())
        );
    }

    #[test]
    fn test_called_exactly_once() {
        let calls = AtomicUsize::new(0);
        let app = application_fn(|_env, _start| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("fail".into())
        });

        let _ = invoke(&app, env());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_application_trait_impl() {
        struct NoContent;

        impl Application for NoContent {
            fn call(
                &self,
                _environ: DispatchEnvironment,
                start: &mut StartResponse,
            ) -> Result<ResponseBody, BoxError> {
                start.begin("204 No Content", Vec::<(&str, &str)>::new())?;
                Ok(body::empty())
            }
        }

        let captured = invoke(&NoContent, env()).unwrap();
        assert_eq!(captured.status, 204);
        assert!(captured.body().is_empty());
    }
}
