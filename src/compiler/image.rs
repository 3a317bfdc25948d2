//! Serialized forms produced by the emitter: the module image (the executable
//! artifact) and, in debug builds, the symbol table that maps loaded items back
//! to generated source.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ModuleId, TypeRef};

/// Version of the image layout understood by the loader.
pub const IMAGE_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleImage {
    pub format: u32,
    pub module: ModuleId,
    /// Name of the shared controller type holding every operation
    pub controller: String,
    pub shapes: Vec<ShapeImage>,
    pub operations: Vec<OperationImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeImage {
    pub name: String,
    pub fields: Vec<FieldImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldImage {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Path,
    Query,
    Body,
    Form,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamImage {
    pub name: String,
    /// Key on the wire (path placeholder, query key, or body/form name)
    pub wire_name: String,
    pub source: ParamSource,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Pure value expression evaluated when an operation is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpr {
    Param(usize),
    Local(usize),
    Field { base: Box<ValueExpr>, name: String },
    New {
        #[serde(rename = "type")]
        ty: TypeRef,
        fields: Vec<(String, ValueExpr)>,
    },
}

impl ValueExpr {
    /// Replace every local reference with the local's own (inlined) expression.
    #[must_use]
    pub fn inline_locals(&self, locals: &[ValueExpr]) -> ValueExpr {
        match self {
            ValueExpr::Local(i) => match locals.get(*i) {
                Some(value) => value.inline_locals(&locals[..*i]),
                None => self.clone(),
            },
            ValueExpr::Param(_) => self.clone(),
            ValueExpr::Field { base, name } => ValueExpr::Field {
                base: Box::new(base.inline_locals(locals)),
                name: name.clone(),
            },
            ValueExpr::New { ty, fields } => ValueExpr::New {
                ty: ty.clone(),
                fields: fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.inline_locals(locals)))
                    .collect(),
            },
        }
    }
}

/// Call into the request processing bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCall {
    pub request: TypeRef,
    pub response: TypeRef,
    pub is_async: bool,
    pub arg: ValueExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationImage {
    pub name: String,
    pub method: String,
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces: Option<TypeRef>,
    pub params: Vec<ParamImage>,
    /// `let` bindings, in order; a local may only refer to earlier ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locals: Vec<ValueExpr>,
    pub call: BridgeCall,
}

impl OperationImage {
    /// Fold every `let` binding into the bridge call argument.
    pub fn inline_locals(&mut self) {
        if self.locals.is_empty() {
            return;
        }
        self.call.arg = self.call.arg.inline_locals(&self.locals);
        self.locals.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Shape,
    Operation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
}

/// Debug-symbol stream emitted alongside the image in debug builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub module: ModuleId,
    pub symbols: Vec<Symbol>,
}

impl SymbolTable {
    #[must_use]
    pub fn find(&self, kind: SymbolKind, name: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|s| s.kind == kind && s.name == name)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn op() -> OperationImage {
        OperationImage {
            name: "CreateUser".into(),
            method: "POST".into(),
            route: "/users".into(),
            produces: None,
            params: vec![ParamImage {
                name: "body".into(),
                wire_name: "body".into(),
                source: ParamSource::Body,
                ty: TypeRef::named("forge.generated", "CreateUserBody_0001"),
            }],
            locals: vec![
                ValueExpr::Field {
                    base: Box::new(ValueExpr::Param(0)),
                    name: "Name".into(),
                },
                ValueExpr::New {
                    ty: TypeRef::named("app", "CreateUser"),
                    fields: vec![("Name".into(), ValueExpr::Local(0))],
                },
            ],
            call: BridgeCall {
                request: TypeRef::named("app", "CreateUser"),
                response: TypeRef::named("app", "User"),
                is_async: false,
                arg: ValueExpr::Local(1),
            },
        }
    }

    #[test]
    fn test_inline_locals_folds_chain() {
        let mut op = op();
        op.inline_locals();
        assert!(op.locals.is_empty());
        assert_eq!(
            op.call.arg,
            ValueExpr::New {
                ty: TypeRef::named("app", "CreateUser"),
                fields: vec![(
                    "Name".into(),
                    ValueExpr::Field {
                        base: Box::new(ValueExpr::Param(0)),
                        name: "Name".into(),
                    }
                )],
            }
        );
    }

    #[test]
    fn test_image_serializes_types_as_text() {
        let text = serde_json::to_string(&op()).unwrap();
        assert!(text.contains("\"type\":\"forge.generated::CreateUserBody_0001\""));
        let back: OperationImage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, op());
    }
}
