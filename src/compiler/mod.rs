//! # Compiler Module
//!
//! In-process toolchain for the forge source language the synthesizer emits.
//!
//! ## Pipeline
//!
//! 1. **Lexing / parsing** - each [`SourceUnit`] parses on its own; syntax errors
//!    are reported as `E00xx` diagnostics against that unit
//! 2. **Checking** - all parsed units are checked together as one program against
//!    the [`ReferenceSet`](crate::resolver::ReferenceSet), so an operation can use a
//!    carrier shape declared in another unit
//! 3. **Emission** - a [`ModuleImage`] (the executable artifact) and, in debug
//!    builds, a [`SymbolTable`] mapping operations back to generated source
//! 4. **Loading** - [`load`] turns the image into a [`CompiledModule`] whose
//!    operations are invoked through the request processing bridge
//!
//! ## Language
//!
//! ```text
//! shape CreateUserBody_01J9 {
//!     Name: core::String,
//! }
//!
//! #[http(POST, "/users")]
//! #[produces(app::User)]
//! op CreateUser(#[body] body: CreateUserBody_01J9) -> app::User {
//!     let request_01J9 = new app::CreateUser { Name = body.Name, };
//!     return process::<app::CreateUser, app::User>(request_01J9);
//! }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod ast;
mod check;
mod image;
mod lexer;
mod loader;
mod parser;
mod pipeline;

pub use image::{
    BridgeCall, FieldImage, ModuleImage, OperationImage, ParamImage, ParamSource, ShapeImage,
    Symbol, SymbolKind, SymbolTable, ValueExpr, IMAGE_FORMAT,
};
pub use lexer::KEYWORDS;
pub use loader::{load, CompiledModule, GeneratedOperation, LoadError};
pub use parser::{parse_source, parse_type_text, ParseError};
pub use pipeline::{compile, Artifact, CompileOptions, CONTROLLER_NAME};

/// One named piece of generated source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Operation or carrier shape name
    pub name: String,
    pub text: String,
    /// Set once a debug build has persisted the unit
    pub path: Option<PathBuf>,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            path: None,
        }
    }
}

/// Whether a compilation carries debug symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Debug,
    #[default]
    Release,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Debug => f.write_str("debug"),
            BuildMode::Release => f.write_str("release"),
        }
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildMode::Debug),
            "release" => Ok(BuildMode::Release),
            other => Err(format!("unknown build mode '{other}'")),
        }
    }
}
