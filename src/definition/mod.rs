//! # Definition Module
//!
//! Plain data describing endpoints: a request type, a response type (optionally
//! wrapped in `Async<..>`), an HTTP verb, a route template, and where each
//! request property comes from on the wire.
//!
//! Definitions are either built in code, loaded from a YAML/JSON definitions file
//! with [`load_definitions`], or expanded from request types carrying route
//! attributes with [`expand_request_definitions`].
//!
//! ```rust
//! use brrtforge::definition::{HandlerDefinition, ParameterBinding};
//! use brrtforge::types::TypeRef;
//! use http::Method;
//!
//! let def = HandlerDefinition::new(
//!     TypeRef::named("app.pets", "GetPet"),
//!     TypeRef::named("app.pets", "Pet"),
//!     Method::GET,
//!     "/pets/{id}",
//! )
//! .with_parameter(ParameterBinding::new(
//!     "Id",
//!     "id",
//!     brrtforge::definition::BindingKind::FromQueryOrPath,
//!     TypeRef::core("Int"),
//! ));
//! assert!(def.validate().is_ok());
//! ```

mod expand;
mod load;
mod types;

pub use expand::{expand_request_definitions, RequestDefinition, RouteAttribute};
pub use load::{load_definitions, load_definitions_from_str, LoadedDefinitions};
pub use types::{
    route_placeholders, BindingKind, DefinitionError, HandlerDefinition, ParameterBinding,
    SUPPORTED_METHODS,
};
