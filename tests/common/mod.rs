#![allow(dead_code)]

use std::sync::Arc;

use brrtforge::bridge::{DefaultRequestProcessor, HandlerResponse, RequestKey, RequestProcessor};
use brrtforge::config::ForgeConfig;
use brrtforge::definition::{BindingKind, HandlerDefinition, ParameterBinding};
use brrtforge::endpoint::{FnOperation, RouteAnnotation};
use brrtforge::synth::SurrogateMode;
use brrtforge::typed::HandlerDispatcher;
use brrtforge::types::{controller_type, Module, ModuleOrigin, TypeCatalog, TypeInfo, TypeRef};
use futures::FutureExt;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub fn int() -> TypeRef {
    TypeRef::core("Int")
}

pub fn string() -> TypeRef {
    TypeRef::core("String")
}

pub fn boolean() -> TypeRef {
    TypeRef::core("Bool")
}

/// Host catalog shared by the integration tests.
///
/// `app.ping` also carries a hand-written `StatusController` so generated and
/// static endpoints can be routed side by side.
pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog.insert(
        Module::new("app.values", ModuleOrigin::Static { path: None })
            .with_type(
                TypeInfo::new("app.values", "GetValue")
                    .with_field("Id", int())
                    .with_field("Verbose", boolean()),
            )
            .with_type(
                TypeInfo::new("app.values", "Value")
                    .with_field("Id", int())
                    .with_field("Doubled", int()),
            ),
    );
    catalog.insert(
        Module::new("app.users", ModuleOrigin::Static { path: None })
            .with_type(
                TypeInfo::new("app.users", "CreateUser")
                    .with_field("Name", string())
                    .with_field("Email", string()),
            )
            .with_type(
                TypeInfo::new("app.users", "User")
                    .with_field("Id", int())
                    .with_field("Name", string())
                    .with_field("Email", string()),
            ),
    );
    catalog.insert(
        Module::new("app.ping", ModuleOrigin::Static { path: None })
            .with_type(TypeInfo::new("app.ping", "Ping"))
            .with_type(TypeInfo::new("app.ping", "Pong").with_field("Message", string()))
            .with_type(
                TypeInfo::new("app.ping", "StatusController")
                    .with_base(controller_type())
                    .with_operation(Arc::new(FnOperation::new(
                        "Status",
                        RouteAnnotation::new(Method::GET, "/status"),
                        |_call, _processor| {
                            async { Ok(HandlerResponse::json(200, json!({ "status": "ok" }))) }.boxed()
                        },
                    ))),
            ),
    );
    catalog.insert(
        Module::new("app.legacy", ModuleOrigin::Static { path: None })
            .with_type(TypeInfo::new("app.legacy", "Ping")),
    );
    catalog.insert(
        Module::new("scratch", ModuleOrigin::InMemory)
            .with_type(TypeInfo::new("scratch", "Temp").with_field("Id", int())),
    );
    catalog
}

/// Release build with reproducible surrogate identifiers.
pub fn config() -> ForgeConfig {
    ForgeConfig::default().with_surrogates(SurrogateMode::Sequential)
}

pub fn get_value() -> HandlerDefinition {
    HandlerDefinition::new(
        TypeRef::named("app.values", "GetValue"),
        TypeRef::named("app.values", "Value"),
        Method::GET,
        "/values/{id}",
    )
    .with_parameter(ParameterBinding::new("Id", "id", BindingKind::FromQueryOrPath, int()))
    .with_parameter(ParameterBinding::new(
        "Verbose",
        "verbose",
        BindingKind::FromQueryOrPath,
        boolean(),
    ))
}

pub fn create_user() -> HandlerDefinition {
    HandlerDefinition::new(
        TypeRef::named("app.users", "CreateUser"),
        TypeRef::asynchronous(TypeRef::named("app.users", "User")),
        Method::POST,
        "/users",
    )
    .with_parameter(ParameterBinding::body("Name", string()))
    .with_parameter(ParameterBinding::body("Email", string()))
}

pub fn ping(module: &str, route: &str) -> HandlerDefinition {
    HandlerDefinition::new(
        TypeRef::named(module, "Ping"),
        TypeRef::named("app.ping", "Pong"),
        Method::GET,
        route,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetValue {
    pub id: i64,
    pub verbose: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Value {
    pub id: i64,
    pub doubled: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

pub fn key(request: (&str, &str), response: (&str, &str)) -> RequestKey {
    RequestKey::new(
        TypeRef::named(request.0, request.1),
        TypeRef::named(response.0, response.1),
    )
}

/// Dispatcher with handlers for `GetValue` (sync) and `CreateUser` (async).
pub fn dispatcher() -> HandlerDispatcher {
    let mut dispatcher = HandlerDispatcher::new();
    dispatcher.register_fn(
        key(("app.values", "GetValue"), ("app.values", "Value")),
        |req: GetValue| {
            if req.id < 0 {
                anyhow::bail!("negative id {}", req.id);
            }
            Ok(Value {
                id: req.id,
                doubled: req.id * 2,
            })
        },
    );
    dispatcher.register_async_fn(
        key(("app.users", "CreateUser"), ("app.users", "User")),
        |req: CreateUser| async move {
            Ok::<_, anyhow::Error>(User {
                id: 1,
                name: req.name,
                email: req.email,
            })
        },
    );
    dispatcher
}

pub fn processor() -> Arc<dyn RequestProcessor> {
    Arc::new(DefaultRequestProcessor::new(Arc::new(dispatcher())))
}
