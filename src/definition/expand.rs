use http::Method;

use super::types::{route_placeholders, BindingKind, DefinitionError, HandlerDefinition, ParameterBinding};
use crate::types::{TypeCatalog, TypeRef};

/// Verb and route template attached to a request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAttribute {
    pub method: Method,
    pub route: String,
}

impl RouteAttribute {
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            method,
            route: route.into(),
        }
    }
}

/// A request type paired with its response type and the routes it answers on.
///
/// Bindings are not spelled out; [`expand_request_definitions`] infers them from
/// the request type's declared fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefinition {
    pub request_type: TypeRef,
    pub response_type: TypeRef,
    pub routes: Vec<RouteAttribute>,
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Expand each route attribute of each request definition into a
/// [`HandlerDefinition`].
///
/// A field named like a route placeholder (ASCII case-insensitive) binds from
/// the path; other fields bind from the query string on GET/DELETE/HEAD/OPTIONS
/// and from the `body` parameter on POST/PUT/PATCH.
///
/// # Errors
///
/// Returns [`DefinitionError::UnknownRequestType`] if a request type is not
/// declared in `catalog`.
pub fn expand_request_definitions(
    definitions: &[RequestDefinition],
    catalog: &TypeCatalog,
) -> Result<Vec<HandlerDefinition>, DefinitionError> {
    let mut expanded = Vec::new();
    for def in definitions {
        let info = catalog
            .lookup(&def.request_type)
            .ok_or_else(|| DefinitionError::UnknownRequestType {
                request: def.request_type.to_string(),
            })?;

        for attr in &def.routes {
            let placeholders = route_placeholders(&attr.route);
            let mut handler = HandlerDefinition::new(
                def.request_type.clone(),
                def.response_type.clone(),
                attr.method.clone(),
                attr.route.clone(),
            );
            for field in &info.fields {
                let placeholder = placeholders
                    .iter()
                    .find(|p| p.eq_ignore_ascii_case(&field.name));
                let binding = match placeholder {
                    Some(p) => ParameterBinding::new(
                        field.name.clone(),
                        p.clone(),
                        BindingKind::FromQueryOrPath,
                        field.ty.clone(),
                    ),
                    None if carries_body(&attr.method) => ParameterBinding::new(
                        field.name.clone(),
                        "body",
                        BindingKind::FromBody,
                        field.ty.clone(),
                    ),
                    None => ParameterBinding::new(
                        field.name.clone(),
                        field.name.clone(),
                        BindingKind::FromQueryOrPath,
                        field.ty.clone(),
                    ),
                };
                handler.parameters.push(binding);
            }
            expanded.push(handler);
        }
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Module, ModuleOrigin, TypeInfo};

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog.insert(
            Module::new("app.users", ModuleOrigin::Static { path: None }).with_type(
                TypeInfo::new("app.users", "UpdateUser")
                    .with_field("Id", TypeRef::core("Int"))
                    .with_field("Name", TypeRef::core("String")),
            ),
        );
        catalog
    }

    #[test]
    fn test_expand_put_binds_path_and_body() {
        let defs = [RequestDefinition {
            request_type: TypeRef::named("app.users", "UpdateUser"),
            response_type: TypeRef::named("app.users", "User"),
            routes: vec![RouteAttribute::new(Method::PUT, "/users/{id}")],
        }];
        let expanded = expand_request_definitions(&defs, &catalog()).unwrap_or_default();
        assert_eq!(expanded.len(), 1);
        let params = &expanded[0].parameters;
        assert_eq!(params[0].target_property, "id");
        assert_eq!(params[0].kind, BindingKind::FromQueryOrPath);
        assert_eq!(params[1].target_property, "body");
        assert_eq!(params[1].kind, BindingKind::FromBody);
    }

    #[test]
    fn test_expand_get_binds_query_per_route() {
        let defs = [RequestDefinition {
            request_type: TypeRef::named("app.users", "UpdateUser"),
            response_type: TypeRef::named("app.users", "User"),
            routes: vec![
                RouteAttribute::new(Method::GET, "/users"),
                RouteAttribute::new(Method::DELETE, "/users/{ID}"),
            ],
        }];
        let expanded = expand_request_definitions(&defs, &catalog()).unwrap_or_default();
        assert_eq!(expanded.len(), 2);
        assert!(expanded[0]
            .parameters
            .iter()
            .all(|p| p.kind == BindingKind::FromQueryOrPath && p.target_property == p.source_property));
        assert_eq!(expanded[1].parameters[0].target_property, "ID");
    }

    #[test]
    fn test_expand_unknown_request() {
        let defs = [RequestDefinition {
            request_type: TypeRef::named("app.users", "Nope"),
            response_type: TypeRef::named("app.users", "User"),
            routes: vec![RouteAttribute::new(Method::GET, "/nope")],
        }];
        assert!(matches!(
            expand_request_definitions(&defs, &catalog()),
            Err(DefinitionError::UnknownRequestType { .. })
        ));
    }
}
