//! # brrtforge
//!
//! **brrtforge** turns declarative handler definitions into routed HTTP endpoint
//! operations at process startup. It does this by generating source, compiling
//! it in-process, and making the result discoverable next to the host's own
//! controllers.
//!
//! ## Overview
//!
//! A [`HandlerDefinition`](definition::HandlerDefinition) names a request type,
//! a response type, an HTTP verb, a route template, and where each request
//! property comes from on the wire. From a list of definitions brrtforge:
//!
//! 1. resolves the modules declaring every referenced type ([`resolver`]);
//! 2. synthesizes one operation (plus a body carrier shape when needed) per
//!    definition, as forge source ([`synth`]);
//! 3. compiles all units together into one module image, with a debug-symbol
//!    stream in debug builds ([`compiler`], [`diagnostics`]);
//! 4. loads the image and registers the module with the host's type discovery
//!    ([`registry`]).
//!
//! At request time a generated operation binds wire values into a request
//! object and hands it to the [`RequestProcessor`](bridge::RequestProcessor),
//! which delegates to an external dispatcher keyed by the
//! `(request, response)` type pair ([`bridge`], [`typed`]).
//!
//! ## Architecture
//!
//! - **[`types`]** - Modules, types and type references known to the host
//! - **[`definition`]** - Handler definitions, request definitions and definition files
//! - **[`resolver`]** - Reference resolution for a compilation
//! - **[`synth`]** - Source synthesis, naming and surrogate identifiers
//! - **[`compiler`]** - Lexer, parser, checker, emitter and loader for forge source
//! - **[`diagnostics`]** - Diagnostics and compilation errors
//! - **[`builder`]** - The `build` entry point
//! - **[`registry`]** - Dynamic type registry bridge over host discovery
//! - **[`bridge`]** - Request processing bridge and dispatcher contract
//! - **[`typed`]** - Typed handler registration for the dispatcher
//! - **[`endpoint`]** - Routed operations as the host sees them
//! - **[`router`]** / **[`service`]** - Host routing glue
//! - **[`config`]** / **[`logging`]** - Ambient configuration and logging
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use brrtforge::builder::ForgeBuilder;
//! use brrtforge::config::ForgeConfig;
//! use brrtforge::definition::HandlerDefinition;
//! use brrtforge::registry::{configure_request_handlers, DynamicDiscovery, StaticDiscovery};
//! use brrtforge::types::{Module, ModuleOrigin, TypeCatalog, TypeInfo, TypeRef};
//! use http::Method;
//!
//! let mut catalog = TypeCatalog::new();
//! catalog.insert(
//!     Module::new("app", ModuleOrigin::Static { path: None })
//!         .with_type(TypeInfo::new("app", "Ping"))
//!         .with_type(TypeInfo::new("app", "Pong")),
//! );
//! let discovery = DynamicDiscovery::new(StaticDiscovery::from_catalog(&catalog));
//! let builder = ForgeBuilder::new(catalog, ForgeConfig::default());
//!
//! let defs = [HandlerDefinition::new(
//!     TypeRef::named("app", "Ping"),
//!     TypeRef::named("app", "Pong"),
//!     Method::GET,
//!     "/ping",
//! )];
//! let module = configure_request_handlers(&discovery, &builder, &defs).unwrap();
//! assert!(module.operation("Ping").is_some());
//! ```

pub mod bridge;
pub mod builder;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod definition;
pub mod diagnostics;
pub mod endpoint;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod service;
pub mod synth;
pub mod typed;
pub mod types;

pub use bridge::{
    DefaultRequestProcessor, DispatchError, HandlerResponse, RequestDispatcher, RequestKey,
    RequestProcessor,
};
pub use builder::{BuildError, ForgeBuilder};
pub use compiler::{BuildMode, CompiledModule};
pub use config::ForgeConfig;
pub use definition::{BindingKind, HandlerDefinition, ParameterBinding};
pub use diagnostics::{CompilationError, Diagnostic};
pub use registry::{configure_request_handlers, DynamicDiscovery, StaticDiscovery, TypeDiscovery};
pub use service::AppService;
pub use typed::HandlerDispatcher;
