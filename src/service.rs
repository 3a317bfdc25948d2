//! Host request handling over discovered endpoints.
//!
//! [`AppService`] routes a request target to an operation, invokes it with the
//! request processor and maps failures to responses:
//!
//! | Failure | Status |
//! |---------|--------|
//! | no route | 404 |
//! | wire value does not bind | 400 |
//! | dispatcher failure | 500 |
//!
//! Dispatcher failures are logged with the operation's generated-source location
//! when debug symbols are loaded; their text never reaches the client.

use std::sync::Arc;

use http::Method;
use tracing::{debug, error, warn};

use crate::bridge::{HandlerResponse, RequestProcessor};
use crate::endpoint::{OperationCall, OperationError};
use crate::registry::TypeDiscovery;
use crate::router::Router;

/// Routes requests to generated and hand-written operations alike.
#[derive(Clone)]
pub struct AppService {
    router: Arc<Router>,
    processor: Arc<dyn RequestProcessor>,
}

impl AppService {
    pub fn new(router: Router, processor: Arc<dyn RequestProcessor>) -> Self {
        Self {
            router: Arc::new(router),
            processor,
        }
    }

    /// Build the route table from every endpoint type `discovery` reports.
    pub fn from_discovery(discovery: &dyn TypeDiscovery, processor: Arc<dyn RequestProcessor>) -> Self {
        let modules = discovery.modules();
        let endpoints = discovery.endpoint_types(&modules);
        Self::new(Router::from_endpoints(&endpoints), processor)
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one request. `target` is the path with an optional query string.
    pub async fn call(&self, method: Method, target: &str, body: Option<String>) -> HandlerResponse {
        let Some(matched) = self.router.route(&method, target) else {
            debug!(method = %method, target, "no route");
            return HandlerResponse::error(404, "Not Found");
        };
        let operation = Arc::clone(&matched.route.operation);
        let call = OperationCall {
            path_params: matched.path_params,
            query_params: matched.query_params,
            body,
        };

        match operation.invoke(call, Arc::clone(&self.processor)).await {
            Ok(response) => response,
            Err(OperationError::Binding(err)) => {
                warn!(operation = %operation.name(), error = %err, "request did not bind");
                HandlerResponse::error(400, &err.to_string())
            }
            Err(OperationError::Dispatch(err)) => {
                match operation.source_location() {
                    Some(location) => error!(
                        operation = %operation.name(),
                        location = %location,
                        error = %err,
                        "request processing failed"
                    ),
                    None => error!(
                        operation = %operation.name(),
                        error = %err,
                        "request processing failed"
                    ),
                }
                HandlerResponse::error(500, "Internal Server Error")
            }
        }
    }
}
