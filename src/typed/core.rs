use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::bridge::{DispatchError, DispatchFuture, RequestDispatcher, RequestKey};

/// Typed request data passed to a handler, with the key it was dispatched under.
#[derive(Debug, Clone)]
pub struct TypedHandlerRequest<T> {
    pub key: RequestKey,
    /// Request object decoded from the generated operation's JSON value
    pub data: T,
}

/// Synchronous typed handler.
///
/// A synchronous handler also serves asynchronous dispatch of its key.
pub trait Handler: Send + Sync + 'static {
    type Request: DeserializeOwned + Send + 'static;
    type Response: Serialize + Send + 'static;

    /// # Errors
    ///
    /// Any error is reported to the caller as [`DispatchError::Handler`].
    fn handle(&self, req: TypedHandlerRequest<Self::Request>) -> anyhow::Result<Self::Response>;
}

/// Asynchronous typed handler.
pub trait AsyncHandler: Send + Sync + 'static {
    type Request: DeserializeOwned + Send + 'static;
    type Response: Serialize + Send + 'static;

    fn handle(
        &self,
        req: TypedHandlerRequest<Self::Request>,
    ) -> BoxFuture<'static, anyhow::Result<Self::Response>>;
}

type SyncEntry = dyn Fn(&RequestKey, Value) -> Result<Value, DispatchError> + Send + Sync;
type AsyncEntry = dyn Fn(RequestKey, Value) -> DispatchFuture<Value> + Send + Sync;

#[derive(Default, Clone)]
struct Entry {
    sync: Option<Arc<SyncEntry>>,
    asynchronous: Option<Arc<AsyncEntry>>,
}

fn decode<T: DeserializeOwned>(key: &RequestKey, request: Value) -> Result<T, DispatchError> {
    serde_json::from_value(request).map_err(|err| DispatchError::InvalidRequest {
        key: key.clone(),
        message: err.to_string(),
    })
}

fn encode<T: Serialize>(response: anyhow::Result<T>) -> Result<Value, DispatchError> {
    let response = response.map_err(DispatchError::Handler)?;
    serde_json::to_value(response).map_err(DispatchError::Serialize)
}

fn panicked(key: &RequestKey) -> DispatchError {
    error!(key = %key, "handler panicked");
    DispatchError::Handler(anyhow::anyhow!("handler for {key} panicked"))
}

/// Reference [`RequestDispatcher`]: typed handlers registered per
/// [`RequestKey`], with serde conversion of request and response objects.
///
/// Handler panics are caught and reported as [`DispatchError::Handler`].
#[derive(Default, Clone)]
pub struct HandlerDispatcher {
    handlers: HashMap<RequestKey, Entry>,
}

impl fmt::Debug for HandlerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("HandlerDispatcher").field("keys", &keys).finish()
    }
}

impl HandlerDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous handler, replacing any previous one for `key`.
    pub fn register<H: Handler>(&mut self, key: RequestKey, handler: H) {
        debug!(key = %key, "registering handler");
        let handler = Arc::new(handler);
        let entry: Arc<SyncEntry> = Arc::new(move |key: &RequestKey, request: Value| {
            let data = decode::<H::Request>(key, request)?;
            let req = TypedHandlerRequest {
                key: key.clone(),
                data,
            };
            let handler = Arc::clone(&handler);
            match std::panic::catch_unwind(AssertUnwindSafe(move || handler.handle(req))) {
                Ok(response) => encode(response),
                Err(_) => Err(panicked(key)),
            }
        });
        self.handlers.entry(key).or_default().sync = Some(entry);
    }

    /// Register an asynchronous handler, replacing any previous one for `key`.
    pub fn register_async<H: AsyncHandler>(&mut self, key: RequestKey, handler: H) {
        debug!(key = %key, "registering async handler");
        let handler = Arc::new(handler);
        let entry: Arc<AsyncEntry> = Arc::new(move |key: RequestKey, request: Value| {
            let data = match decode::<H::Request>(&key, request) {
                Ok(data) => data,
                Err(err) => return futures::future::ready(Err(err)).boxed(),
            };
            let req = TypedHandlerRequest {
                key: key.clone(),
                data,
            };
            let handler = Arc::clone(&handler);
            let fut = match std::panic::catch_unwind(AssertUnwindSafe(move || handler.handle(req))) {
                Ok(fut) => fut,
                Err(_) => return futures::future::ready(Err(panicked(&key))).boxed(),
            };
            AssertUnwindSafe(fut)
                .catch_unwind()
                .map(move |result| match result {
                    Ok(response) => encode(response),
                    Err(_) => Err(panicked(&key)),
                })
                .boxed()
        });
        self.handlers.entry(key).or_default().asynchronous = Some(entry);
    }

    /// Register a closure as a synchronous handler.
    pub fn register_fn<Req, Res, F>(&mut self, key: RequestKey, f: F)
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Req) -> anyhow::Result<Res> + Send + Sync + 'static,
    {
        self.register(key, FnHandler::new(f));
    }

    /// Register a closure returning a future as an asynchronous handler.
    pub fn register_async_fn<Req, Res, F, Fut>(&mut self, key: RequestKey, f: F)
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Res>> + Send + 'static,
    {
        self.register_async(key, AsyncFnHandler::new(f));
    }

    #[must_use]
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.handlers.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl RequestDispatcher for HandlerDispatcher {
    fn process(&self, key: &RequestKey, request: Value) -> Result<Value, DispatchError> {
        // an async-only key is not served synchronously
        match self.handlers.get(key).and_then(|e| e.sync.as_ref()) {
            Some(handler) => handler(key, request),
            None => Err(DispatchError::NoHandler { key: key.clone() }),
        }
    }

    fn process_async(&self, key: RequestKey, request: Value) -> DispatchFuture<Value> {
        match self.handlers.get(&key) {
            Some(Entry {
                asynchronous: Some(handler),
                ..
            }) => handler(key, request),
            Some(Entry {
                sync: Some(handler), ..
            }) => futures::future::ready(handler(&key, request)).boxed(),
            _ => futures::future::ready(Err(DispatchError::NoHandler { key })).boxed(),
        }
    }
}

/// Adapts a closure to [`Handler`].
pub struct FnHandler<Req, Res, F> {
    f: F,
    _types: std::marker::PhantomData<fn(Req) -> Res>,
}

impl<Req, Res, F> FnHandler<Req, Res, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _types: std::marker::PhantomData,
        }
    }
}

impl<Req, Res, F> Handler for FnHandler<Req, Res, F>
where
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
    F: Fn(Req) -> anyhow::Result<Res> + Send + Sync + 'static,
{
    type Request = Req;
    type Response = Res;

    fn handle(&self, req: TypedHandlerRequest<Req>) -> anyhow::Result<Res> {
        (self.f)(req.data)
    }
}

/// Adapts a closure returning a future to [`AsyncHandler`].
pub struct AsyncFnHandler<Req, Res, F> {
    f: F,
    _types: std::marker::PhantomData<fn(Req) -> Res>,
}

impl<Req, Res, F> AsyncFnHandler<Req, Res, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _types: std::marker::PhantomData,
        }
    }
}

impl<Req, Res, F, Fut> AsyncHandler for AsyncFnHandler<Req, Res, F>
where
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Res>> + Send + 'static,
{
    type Request = Req;
    type Response = Res;

    fn handle(&self, req: TypedHandlerRequest<Req>) -> BoxFuture<'static, anyhow::Result<Res>> {
        (self.f)(req.data).boxed()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::types::TypeRef;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct GetValue {
        id: i32,
    }

    #[derive(Serialize)]
    struct ValueResponse {
        value: i32,
    }

    fn key(name: &str) -> RequestKey {
        RequestKey::new(TypeRef::named("app", name), TypeRef::named("app", "Value"))
    }

    fn dispatcher() -> HandlerDispatcher {
        let mut d = HandlerDispatcher::new();
        d.register_fn(key("GetValue"), |req: GetValue| Ok(ValueResponse { value: req.id }));
        d.register_async_fn(key("Slow"), |req: GetValue| async move {
            Ok(ValueResponse { value: req.id * 2 })
        });
        d
    }

    #[test]
    fn test_sync_dispatch() {
        let d = dispatcher();
        let out = d.process(&key("GetValue"), json!({ "Id": 5 })).unwrap();
        assert_eq!(out, json!({ "value": 5 }));
    }

    #[test]
    fn test_invalid_request_object() {
        let d = dispatcher();
        let err = d.process(&key("GetValue"), json!({ "Id": "five" })).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest { .. }));
    }

    #[test]
    fn test_async_only_handler_is_not_served_synchronously() {
        let d = dispatcher();
        let err = d.process(&key("Slow"), json!({ "Id": 1 })).unwrap_err();
        assert!(matches!(err, DispatchError::NoHandler { .. }));
        let out = futures::executor::block_on(d.process_async(key("Slow"), json!({ "Id": 4 })));
        assert_eq!(out.unwrap(), json!({ "value": 8 }));
    }

    #[test]
    fn test_sync_handler_serves_async_dispatch() {
        let d = dispatcher();
        let out = futures::executor::block_on(d.process_async(key("GetValue"), json!({ "Id": 3 })));
        assert_eq!(out.unwrap(), json!({ "value": 3 }));
    }

    #[test]
    fn test_unknown_key() {
        let d = dispatcher();
        let err = futures::executor::block_on(d.process_async(key("Missing"), Value::Null));
        assert!(matches!(err, Err(DispatchError::NoHandler { .. })));
    }

    #[test]
    fn test_panicking_handler_becomes_error() {
        let mut d = HandlerDispatcher::new();
        d.register_fn(key("Boom"), |_req: Value| -> anyhow::Result<Value> {
            panic!("boom")
        });
        let err = d.process(&key("Boom"), Value::Null).unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
    }
}
