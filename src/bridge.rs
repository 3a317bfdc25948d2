//! # Request Processing Bridge
//!
//! The fixed contract every generated operation calls back into. A generated
//! operation builds its request object and calls either [`RequestProcessor::process`]
//! or [`RequestProcessor::process_async`], keyed by the static
//! `(request type, response type)` pair of its definition.
//!
//! The bridge holds no state of its own. [`DefaultRequestProcessor`] delegates to
//! an external [`RequestDispatcher`] and wraps whatever it returns in a 200 JSON
//! [`HandlerResponse`]. Dispatcher failures are returned unchanged so the host's
//! own fault handling decides what the caller sees.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;

use crate::types::TypeRef;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for responses
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Response envelope produced by operations and handed to the host transport.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// HTTP response headers
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create an error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Static `(request, response)` type pair a dispatcher is keyed by.
///
/// The response is always stored without its `Async<..>` wrapper, so a
/// synchronous and an asynchronous definition over the same pair share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub request: TypeRef,
    pub response: TypeRef,
}

impl RequestKey {
    #[must_use]
    pub fn new(request: TypeRef, response: TypeRef) -> Self {
        let response = response.unwrap_async().clone();
        Self { request, response }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.request, self.response)
    }
}

/// Failure raised by the external dispatcher while processing a request.
#[derive(Debug)]
pub enum DispatchError {
    /// No handler is registered for the key (or none for the requested mode)
    NoHandler { key: RequestKey },
    /// The request object could not be turned into the handler's request type
    InvalidRequest { key: RequestKey, message: String },
    /// The handler itself failed
    Handler(anyhow::Error),
    /// The handler's response could not be serialized
    Serialize(serde_json::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoHandler { key } => write!(f, "no handler registered for {key}"),
            DispatchError::InvalidRequest { key, message } => {
                write!(f, "invalid request for {key}: {message}")
            }
            DispatchError::Handler(err) => write!(f, "handler failed: {err}"),
            DispatchError::Serialize(err) => write!(f, "failed to serialize response: {err}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Handler(err) => Some(err.as_ref()),
            DispatchError::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

/// Future returned by asynchronous dispatch.
pub type DispatchFuture<T> = BoxFuture<'static, Result<T, DispatchError>>;

/// External dispatcher: "process this request of type Req and produce a Res".
///
/// Resolved per call by the [`RequestKey`]. Request and response objects travel
/// as JSON values.
pub trait RequestDispatcher: Send + Sync {
    /// Process a request synchronously
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] raised while processing.
    fn process(&self, key: &RequestKey, request: Value) -> Result<Value, DispatchError>;

    /// Process a request, completing later
    fn process_async(&self, key: RequestKey, request: Value) -> DispatchFuture<Value>;
}

/// Contract generated operations call into.
pub trait RequestProcessor: Send + Sync {
    /// # Errors
    ///
    /// Returns the dispatcher's error unchanged.
    fn process(&self, key: &RequestKey, request: Value) -> Result<HandlerResponse, DispatchError>;

    fn process_async(&self, key: RequestKey, request: Value) -> DispatchFuture<HandlerResponse>;
}

/// Delegates to a [`RequestDispatcher`] and wraps results as 200 JSON responses.
#[derive(Clone)]
pub struct DefaultRequestProcessor {
    dispatcher: Arc<dyn RequestDispatcher>,
}

impl DefaultRequestProcessor {
    pub fn new(dispatcher: Arc<dyn RequestDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl RequestProcessor for DefaultRequestProcessor {
    fn process(&self, key: &RequestKey, request: Value) -> Result<HandlerResponse, DispatchError> {
        self.dispatcher
            .process(key, request)
            .map(|body| HandlerResponse::json(200, body))
    }

    fn process_async(&self, key: RequestKey, request: Value) -> DispatchFuture<HandlerResponse> {
        self.dispatcher
            .process_async(key, request)
            .map(|result| result.map(|body| HandlerResponse::json(200, body)))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl RequestDispatcher for Echo {
        fn process(&self, key: &RequestKey, request: Value) -> Result<Value, DispatchError> {
            if key.request.simple_name() == "Fail" {
                return Err(DispatchError::Handler(anyhow::anyhow!("boom")));
            }
            Ok(json!({ "echo": request }))
        }

        fn process_async(&self, key: RequestKey, request: Value) -> DispatchFuture<Value> {
            let result = self.process(&key, request);
            futures::future::ready(result).boxed()
        }
    }

    fn key(name: &str) -> RequestKey {
        RequestKey::new(
            TypeRef::named("app", name),
            TypeRef::asynchronous(TypeRef::named("app", "Pong")),
        )
    }

    #[test]
    fn test_request_key_unwraps_async() {
        assert_eq!(key("Ping").response, TypeRef::named("app", "Pong"));
        assert_eq!(key("Ping").to_string(), "app::Ping -> app::Pong");
    }

    #[test]
    fn test_processor_wraps_in_envelope() {
        let processor = DefaultRequestProcessor::new(Arc::new(Echo));
        let resp = processor.process(&key("Ping"), json!({ "Id": 5 })).unwrap_or_else(|e| {
            HandlerResponse::error(500, &e.to_string())
        });
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, json!({ "echo": { "Id": 5 } }));
        assert_eq!(resp.get_header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_processor_does_not_translate_errors() {
        let processor = DefaultRequestProcessor::new(Arc::new(Echo));
        let err = processor.process(&key("Fail"), Value::Null);
        assert!(matches!(err, Err(DispatchError::Handler(_))));

        let err = futures::executor::block_on(processor.process_async(key("Fail"), Value::Null));
        assert!(matches!(err, Err(DispatchError::Handler(_))));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut resp = HandlerResponse::json(200, Value::Null);
        resp.set_header("content-type", "text/plain".to_string());
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.get_header("content-type"), Some("text/plain"));
    }
}
