//! # Endpoint Module
//!
//! The host's view of a routed operation. An endpoint-bearing type exposes a list
//! of [`Operation`]s, each carrying a [`RouteAnnotation`] (verb, route template,
//! declared response type). The router never distinguishes generated operations
//! from hand-written ones: both implement the same trait.
//!
//! Wire values arrive as strings (path and query parameters) or as a request body.
//! [`coerce_wire_value`] turns a string into the JSON value of a `core` primitive.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::Method;
use serde_json::{Number, Value};

use crate::bridge::{DispatchError, HandlerResponse, RequestProcessor};
use crate::types::{Primitive, TypeRef};

/// Routing metadata attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAnnotation {
    pub method: Method,
    /// Route template such as `/users/{id}`
    pub template: String,
    /// Declared response type, for documentation
    pub produces: Option<TypeRef>,
}

impl RouteAnnotation {
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: template.into(),
            produces: None,
        }
    }

    #[must_use]
    pub fn with_produces(mut self, ty: TypeRef) -> Self {
        self.produces = Some(ty);
        self
    }
}

/// Wire inputs for one invocation.
#[derive(Debug, Clone, Default)]
pub struct OperationCall {
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    /// Raw request body (JSON, or url-encoded for form parameters)
    pub body: Option<String>,
}

impl OperationCall {
    #[must_use]
    pub fn with_path_param(mut self, name: &str, value: &str) -> Self {
        self.path_params.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.query_params.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Where in generated source an operation was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub unit: String,
    pub path: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}:{}", path.display(), self.line, self.column),
            None => write!(f, "{}:{}:{}", self.unit, self.line, self.column),
        }
    }
}

/// A wire value could not be bound to an operation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    MissingPathParam { param: String },
    MissingBody { param: String },
    InvalidValue {
        param: String,
        expected: String,
        value: String,
    },
    InvalidBody { param: String, message: String },
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::MissingPathParam { param } => {
                write!(f, "missing path parameter '{param}'")
            }
            BindingError::MissingBody { param } => {
                write!(f, "missing request body for parameter '{param}'")
            }
            BindingError::InvalidValue {
                param,
                expected,
                value,
            } => write!(f, "parameter '{param}': expected {expected}, got '{value}'"),
            BindingError::InvalidBody { param, message } => {
                write!(f, "invalid body for parameter '{param}': {message}")
            }
        }
    }
}

impl std::error::Error for BindingError {}

/// Failure invoking an operation.
#[derive(Debug)]
pub enum OperationError {
    /// Wire inputs did not bind; the dispatcher was never called
    Binding(BindingError),
    /// Propagated unchanged from the dispatcher
    Dispatch(DispatchError),
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::Binding(err) => write!(f, "{err}"),
            OperationError::Dispatch(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OperationError::Binding(err) => Some(err),
            OperationError::Dispatch(err) => Some(err),
        }
    }
}

impl From<BindingError> for OperationError {
    fn from(err: BindingError) -> Self {
        OperationError::Binding(err)
    }
}

impl From<DispatchError> for OperationError {
    fn from(err: DispatchError) -> Self {
        OperationError::Dispatch(err)
    }
}

pub type OperationFuture = BoxFuture<'static, Result<HandlerResponse, OperationError>>;

/// A routed, callable endpoint operation.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn route(&self) -> &RouteAnnotation;

    /// Bind `call` and hand the request to `processor`.
    fn invoke(&self, call: OperationCall, processor: Arc<dyn RequestProcessor>) -> OperationFuture;

    /// Declaration site in generated source, when debug symbols were loaded.
    fn source_location(&self) -> Option<&SourceLocation> {
        None
    }
}

type OperationFn =
    dyn Fn(OperationCall, Arc<dyn RequestProcessor>) -> OperationFuture + Send + Sync;

/// Hand-written operation backed by a closure.
pub struct FnOperation {
    name: String,
    route: RouteAnnotation,
    f: Arc<OperationFn>,
}

impl FnOperation {
    pub fn new<F>(name: impl Into<String>, route: RouteAnnotation, f: F) -> Self
    where
        F: Fn(OperationCall, Arc<dyn RequestProcessor>) -> OperationFuture + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            route,
            f: Arc::new(f),
        }
    }
}

impl Operation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn route(&self) -> &RouteAnnotation {
        &self.route
    }

    fn invoke(&self, call: OperationCall, processor: Arc<dyn RequestProcessor>) -> OperationFuture {
        (self.f)(call, processor)
    }
}

/// Convert a wire string to the JSON value of a `core` primitive type.
///
/// # Errors
///
/// Returns [`BindingError::InvalidValue`] when `raw` does not parse as `ty`, or
/// `ty` is not a scalar primitive.
pub fn coerce_wire_value(param: &str, raw: &str, ty: &TypeRef) -> Result<Value, BindingError> {
    let invalid = || BindingError::InvalidValue {
        param: param.to_string(),
        expected: ty.to_string(),
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    match ty.primitive() {
        Some(Primitive::String) => Ok(Value::String(raw.to_string())),
        Some(Primitive::Int) => trimmed
            .parse::<i32>()
            .map(Value::from)
            .map_err(|_| invalid()),
        Some(Primitive::Long) => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        Some(Primitive::Float) => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        Some(Primitive::Bool) => match trimmed {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        Some(Primitive::Object) | None => Err(invalid()),
    }
}

/// Decode an `application/x-www-form-urlencoded` string into key/value pairs.
/// Later duplicates win.
#[must_use]
pub fn parse_form(encoded: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(encoded.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    #[test]
    fn test_coerce_primitives() {
        assert_eq!(coerce_wire_value("v", "5", &TypeRef::core("Int")).unwrap(), json!(5));
        assert_eq!(
            coerce_wire_value("v", "9000000000", &TypeRef::core("Long")).unwrap(),
            json!(9_000_000_000_i64)
        );
        assert_eq!(coerce_wire_value("v", "1.5", &TypeRef::core("Float")).unwrap(), json!(1.5));
        assert_eq!(coerce_wire_value("v", "true", &TypeRef::core("Bool")).unwrap(), json!(true));
        assert_eq!(
            coerce_wire_value("v", " padded ", &TypeRef::core("String")).unwrap(),
            json!(" padded ")
        );
    }

    #[test]
    fn test_coerce_rejects_bad_values() {
        let err = coerce_wire_value("value", "five", &TypeRef::core("Int")).unwrap_err();
        assert_eq!(
            err,
            BindingError::InvalidValue {
                param: "value".into(),
                expected: "core::Int".into(),
                value: "five".into(),
            }
        );
        assert!(coerce_wire_value("v", "NaN", &TypeRef::core("Float")).is_err());
        assert!(coerce_wire_value("v", "x", &TypeRef::named("app", "User")).is_err());
    }

    #[test]
    fn test_parse_form() {
        let form = parse_form("Name=Ada+Lovelace&Email=ada%40example.com");
        assert_eq!(form.get("Name").map(String::as_str), Some("Ada Lovelace"));
        assert_eq!(form.get("Email").map(String::as_str), Some("ada@example.com"));
    }

    #[test]
    fn test_fn_operation_invokes_closure() {
        struct NoProcessor;
        impl RequestProcessor for NoProcessor {
            fn process(
                &self,
                key: &crate::bridge::RequestKey,
                _request: Value,
            ) -> Result<HandlerResponse, DispatchError> {
                Err(DispatchError::NoHandler { key: key.clone() })
            }
            fn process_async(
                &self,
                key: crate::bridge::RequestKey,
                _request: Value,
            ) -> crate::bridge::DispatchFuture<HandlerResponse> {
                futures::future::ready(Err(DispatchError::NoHandler { key })).boxed()
            }
        }

        let op = FnOperation::new(
            "health",
            RouteAnnotation::new(Method::GET, "/health"),
            |call, _processor| {
                let status = call.query_params.get("status").cloned().unwrap_or_default();
                async move { Ok(HandlerResponse::json(200, json!({ "status": status }))) }.boxed()
            },
        );
        assert_eq!(op.name(), "health");
        assert_eq!(op.route().template, "/health");
        assert!(op.source_location().is_none());
        let resp = futures::executor::block_on(op.invoke(
            OperationCall::default().with_query_param("status", "ok"),
            Arc::new(NoProcessor),
        ))
        .unwrap();
        assert_eq!(resp.body, json!({ "status": "ok" }));
    }
}
