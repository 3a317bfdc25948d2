use anyhow::{anyhow, Context};
use http::Method;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::expand::{expand_request_definitions, RequestDefinition, RouteAttribute};
use super::types::{BindingKind, HandlerDefinition, ParameterBinding};
use crate::types::{Module, ModuleOrigin, TypeCatalog, TypeInfo, TypeRef};

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    modules: Vec<ModuleSpec>,
    #[serde(default)]
    handlers: Vec<HandlerSpec>,
    #[serde(default)]
    requests: Vec<RequestSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OriginSpec {
    #[default]
    Static,
    InMemory,
}

#[derive(Debug, Deserialize)]
struct ModuleSpec {
    id: String,
    #[serde(default)]
    origin: OriginSpec,
    path: Option<PathBuf>,
    #[serde(default)]
    types: Vec<TypeSpec>,
}

#[derive(Debug, Deserialize)]
struct TypeSpec {
    name: String,
    #[serde(default)]
    generic_arity: usize,
    #[serde(default)]
    fields: Vec<FieldSpec>,
    base: Option<TypeRef>,
}

#[derive(Debug, Deserialize)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    ty: TypeRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BindingKindSpec {
    #[serde(alias = "path")]
    Query,
    Body,
    Form,
}

#[derive(Debug, Deserialize)]
struct BindingSpec {
    source: String,
    target: Option<String>,
    kind: BindingKindSpec,
    #[serde(rename = "type")]
    ty: TypeRef,
}

#[derive(Debug, Deserialize)]
struct HandlerSpec {
    request: TypeRef,
    response: TypeRef,
    method: String,
    route: String,
    #[serde(default)]
    parameters: Vec<BindingSpec>,
}

#[derive(Debug, Deserialize)]
struct RouteSpec {
    method: String,
    route: String,
}

#[derive(Debug, Deserialize)]
struct RequestSpec {
    request: TypeRef,
    response: TypeRef,
    routes: Vec<RouteSpec>,
}

/// Host type declarations and handler definitions read from a definitions file.
#[derive(Debug)]
pub struct LoadedDefinitions {
    pub catalog: TypeCatalog,
    pub handlers: Vec<HandlerDefinition>,
}

fn parse_method(method: &str) -> anyhow::Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method '{method}'"))
}

/// Load a definitions file (YAML or JSON, by extension).
///
/// `modules` are merged into a fresh [`TypeCatalog`]; `handlers` are taken as
/// written and `requests` are expanded with [`expand_request_definitions`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a request
/// definition names an undeclared type.
pub fn load_definitions(path: impl AsRef<Path>) -> anyhow::Result<LoadedDefinitions> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read definitions file {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    load_definitions_from_str(&content, is_json)
}

/// Parse definitions from text. See [`load_definitions`].
///
/// # Errors
///
/// Returns an error if the text cannot be parsed or a request definition names
/// an undeclared type.
pub fn load_definitions_from_str(content: &str, is_json: bool) -> anyhow::Result<LoadedDefinitions> {
    let file: DefinitionFile = if is_json {
        serde_json::from_str(content)?
    } else {
        serde_yaml::from_str(content)?
    };

    let mut catalog = TypeCatalog::new();
    for spec in file.modules {
        let origin = match spec.origin {
            OriginSpec::Static => ModuleOrigin::Static { path: spec.path },
            OriginSpec::InMemory => ModuleOrigin::InMemory,
        };
        let mut module = Module::new(spec.id.as_str(), origin);
        for ty in spec.types {
            let mut info = TypeInfo::new(spec.id.as_str(), ty.name).with_generic_arity(ty.generic_arity);
            info.base = ty.base;
            for field in ty.fields {
                info = info.with_field(field.name, field.ty);
            }
            module = module.with_type(info);
        }
        catalog.insert(module);
    }

    let mut handlers = Vec::with_capacity(file.handlers.len());
    for spec in file.handlers {
        let mut handler = HandlerDefinition::new(
            spec.request,
            spec.response,
            parse_method(&spec.method)?,
            spec.route,
        );
        for p in spec.parameters {
            let kind = match p.kind {
                BindingKindSpec::Query => BindingKind::FromQueryOrPath,
                BindingKindSpec::Body => BindingKind::FromBody,
                BindingKindSpec::Form => BindingKind::FromForm,
            };
            let target = p.target.unwrap_or_else(|| match kind {
                BindingKind::FromQueryOrPath => p.source.clone(),
                BindingKind::FromBody => "body".to_string(),
                BindingKind::FromForm => "form".to_string(),
            });
            handler
                .parameters
                .push(ParameterBinding::new(p.source, target, kind, p.ty));
        }
        handlers.push(handler);
    }

    let mut requests = Vec::with_capacity(file.requests.len());
    for spec in file.requests {
        let mut routes = Vec::with_capacity(spec.routes.len());
        for r in spec.routes {
            routes.push(RouteAttribute::new(parse_method(&r.method)?, r.route));
        }
        requests.push(RequestDefinition {
            request_type: spec.request,
            response_type: spec.response,
            routes,
        });
    }
    handlers.extend(expand_request_definitions(&requests, &catalog)?);

    info!(
        handlers = handlers.len(),
        modules = catalog.modules().count(),
        "Loaded handler definitions"
    );
    Ok(LoadedDefinitions { catalog, handlers })
}
