use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::compiler::KEYWORDS;
use crate::types::TypeRef;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex")
});

/// HTTP verbs a handler definition may use.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// Where a parameter's value originates on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    FromQueryOrPath,
    FromBody,
    FromForm,
}

impl BindingKind {
    /// Body and form bindings are carried by an auxiliary shape.
    #[must_use]
    pub fn is_body_like(self) -> bool {
        matches!(self, BindingKind::FromBody | BindingKind::FromForm)
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::FromQueryOrPath => write!(f, "FromQueryOrPath"),
            BindingKind::FromBody => write!(f, "FromBody"),
            BindingKind::FromForm => write!(f, "FromForm"),
        }
    }
}

/// One request-shape property and where its value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    /// Property name on the request shape
    pub source_property: String,
    /// Name on the wire (query/path key, or the body/form parameter name)
    pub target_property: String,
    pub kind: BindingKind,
    /// Declared type of the request-shape property
    pub value_type: TypeRef,
}

impl ParameterBinding {
    pub fn new(
        source_property: impl Into<String>,
        target_property: impl Into<String>,
        kind: BindingKind,
        value_type: TypeRef,
    ) -> Self {
        Self {
            source_property: source_property.into(),
            target_property: target_property.into(),
            kind,
            value_type,
        }
    }

    pub fn query(name: &str, value_type: TypeRef) -> Self {
        Self::new(name, name, BindingKind::FromQueryOrPath, value_type)
    }

    pub fn body(name: &str, value_type: TypeRef) -> Self {
        Self::new(name, "body", BindingKind::FromBody, value_type)
    }

    pub fn form(name: &str, value_type: TypeRef) -> Self {
        Self::new(name, "form", BindingKind::FromForm, value_type)
    }
}

/// Declarative description of one endpoint. One definition maps to exactly one
/// generated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDefinition {
    pub request_type: TypeRef,
    /// May be wrapped in [`TypeRef::Async`].
    pub response_type: TypeRef,
    pub method: Method,
    pub route: String,
    pub parameters: Vec<ParameterBinding>,
}

impl HandlerDefinition {
    pub fn new(
        request_type: TypeRef,
        response_type: TypeRef,
        method: Method,
        route: impl Into<String>,
    ) -> Self {
        Self {
            request_type,
            response_type,
            method,
            route: route.into(),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, binding: ParameterBinding) -> Self {
        self.parameters.push(binding);
        self
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.response_type.is_async()
    }

    /// Check the structural invariants of the definition.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let request = self.request_type.to_string();
        if !SUPPORTED_METHODS.contains(&self.method) {
            return Err(DefinitionError::UnsupportedMethod {
                method: self.method.to_string(),
            });
        }
        if self.route.is_empty() {
            return Err(DefinitionError::EmptyRoute { request });
        }
        check_route(&self.route)?;
        if self.request_type.is_async() {
            return Err(DefinitionError::AsyncRequestType { request });
        }

        let mut seen = Vec::with_capacity(self.parameters.len());
        let mut body_target: Option<&str> = None;
        for binding in &self.parameters {
            if !is_property_name(&binding.source_property) {
                return Err(DefinitionError::InvalidPropertyName {
                    request,
                    property: binding.source_property.clone(),
                });
            }
            if seen.contains(&binding.source_property.as_str()) {
                return Err(DefinitionError::DuplicateSourceProperty {
                    request,
                    property: binding.source_property.clone(),
                });
            }
            seen.push(binding.source_property.as_str());

            if binding.kind.is_body_like() {
                match body_target {
                    Some(existing) if existing != binding.target_property => {
                        return Err(DefinitionError::SplitBody {
                            request,
                            first: existing.to_string(),
                            second: binding.target_property.clone(),
                        });
                    }
                    _ => body_target = Some(&binding.target_property),
                }
            }
        }
        Ok(())
    }
}

/// Names of the `{placeholder}` segments of a route template, in order.
#[must_use]
pub fn route_placeholders(route: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(route)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Request-shape properties are emitted verbatim into forge source, so they
/// must lex as a single identifier.
fn is_property_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.contains(&name)
}

fn check_route(route: &str) -> Result<(), DefinitionError> {
    let invalid = |reason: &str| DefinitionError::InvalidRoute {
        route: route.to_string(),
        reason: reason.to_string(),
    };
    if !route.starts_with('/') {
        return Err(invalid("route must start with '/'"));
    }
    if route.contains('"') || route.contains('\\') || route.contains(char::is_whitespace) {
        return Err(invalid("route contains quotes, backslashes or whitespace"));
    }
    let stripped = PLACEHOLDER.replace_all(route, "");
    if stripped.contains('{') || stripped.contains('}') {
        return Err(invalid("malformed placeholder"));
    }
    let placeholders = route_placeholders(route);
    for (i, name) in placeholders.iter().enumerate() {
        if placeholders[..i].contains(name) {
            return Err(invalid("duplicate placeholder"));
        }
    }
    Ok(())
}

/// Handler definition failed validation or expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    EmptyRoute {
        request: String,
    },
    InvalidRoute {
        route: String,
        reason: String,
    },
    UnsupportedMethod {
        method: String,
    },
    /// The request type itself is wrapped in the asynchronous-result marker.
    AsyncRequestType {
        request: String,
    },
    DuplicateSourceProperty {
        request: String,
        property: String,
    },
    /// A source property is not a forge identifier or is a keyword.
    InvalidPropertyName {
        request: String,
        property: String,
    },
    /// Body/form bindings name more than one wire parameter.
    SplitBody {
        request: String,
        first: String,
        second: String,
    },
    /// A request definition names a type the catalog does not declare.
    UnknownRequestType {
        request: String,
    },
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionError::EmptyRoute { request } => {
                write!(f, "handler definition for '{request}' has an empty route")
            }
            DefinitionError::InvalidRoute { route, reason } => {
                write!(f, "invalid route template '{route}': {reason}")
            }
            DefinitionError::UnsupportedMethod { method } => {
                write!(f, "unsupported HTTP method '{method}'")
            }
            DefinitionError::AsyncRequestType { request } => {
                write!(f, "request type '{request}' cannot be asynchronous")
            }
            DefinitionError::DuplicateSourceProperty { request, property } => write!(
                f,
                "handler definition for '{request}' binds property '{property}' more than once"
            ),
            DefinitionError::InvalidPropertyName { request, property } => write!(
                f,
                "handler definition for '{request}' binds '{property}', which is not a valid property name"
            ),
            DefinitionError::SplitBody {
                request,
                first,
                second,
            } => write!(
                f,
                "handler definition for '{request}' splits body bindings across '{first}' and '{second}'"
            ),
            DefinitionError::UnknownRequestType { request } => {
                write!(f, "request type '{request}' is not declared in the type catalog")
            }
        }
    }
}

impl std::error::Error for DefinitionError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> HandlerDefinition {
        HandlerDefinition::new(
            TypeRef::named("app", "Ping"),
            TypeRef::named("app", "Pong"),
            Method::GET,
            "/ping/{id}",
        )
    }

    #[test]
    fn test_route_placeholders() {
        assert_eq!(
            route_placeholders("/users/{user_id}/posts/{post_id}"),
            vec!["user_id", "post_id"]
        );
        assert!(route_placeholders("/health").is_empty());
    }

    #[test]
    fn test_validate_ok() {
        let def = ping().with_parameter(ParameterBinding::query("id", TypeRef::core("Int")));
        assert_eq!(def.validate(), Ok(()));
    }

    #[test]
    fn test_validate_routes() {
        let mut def = ping();
        def.route = String::new();
        assert!(matches!(def.validate(), Err(DefinitionError::EmptyRoute { .. })));
        def.route = "ping".into();
        assert!(matches!(def.validate(), Err(DefinitionError::InvalidRoute { .. })));
        def.route = "/ping/{id".into();
        assert!(matches!(def.validate(), Err(DefinitionError::InvalidRoute { .. })));
        def.route = "/a/{id}/b/{id}".into();
        assert!(matches!(def.validate(), Err(DefinitionError::InvalidRoute { .. })));
    }

    #[test]
    fn test_validate_split_body() {
        let def = ping()
            .with_parameter(ParameterBinding::new(
                "Name",
                "body",
                BindingKind::FromBody,
                TypeRef::core("String"),
            ))
            .with_parameter(ParameterBinding::new(
                "Email",
                "payload",
                BindingKind::FromForm,
                TypeRef::core("String"),
            ));
        assert!(matches!(def.validate(), Err(DefinitionError::SplitBody { .. })));
    }

    #[test]
    fn test_validate_duplicate_source() {
        let def = ping()
            .with_parameter(ParameterBinding::query("id", TypeRef::core("Int")))
            .with_parameter(ParameterBinding::new(
                "id",
                "other",
                BindingKind::FromQueryOrPath,
                TypeRef::core("Int"),
            ));
        assert!(matches!(
            def.validate(),
            Err(DefinitionError::DuplicateSourceProperty { .. })
        ));
    }

    #[test]
    fn test_validate_property_names() {
        for bad in ["new", "async", "return", "page-size", "1st", ""] {
            let def = ping().with_parameter(ParameterBinding::new(
                bad,
                "q",
                BindingKind::FromQueryOrPath,
                TypeRef::core("String"),
            ));
            assert!(
                matches!(
                    def.validate(),
                    Err(DefinitionError::InvalidPropertyName { ref property, .. }) if property == bad
                ),
                "{bad:?} accepted"
            );
        }
        for good in ["PageSize", "_raw", "new_", "Returned"] {
            let def = ping().with_parameter(ParameterBinding::query(good, TypeRef::core("String")));
            assert_eq!(def.validate(), Ok(()), "{good:?} rejected");
        }
    }

    #[test]
    fn test_validate_method_and_async_request() {
        let mut def = ping();
        def.method = Method::TRACE;
        assert!(matches!(def.validate(), Err(DefinitionError::UnsupportedMethod { .. })));
        let mut def = ping();
        def.request_type = TypeRef::asynchronous(TypeRef::named("app", "Ping"));
        assert!(matches!(def.validate(), Err(DefinitionError::AsyncRequestType { .. })));
    }
}
