use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::type_ref::{ModuleId, TypeRef};
use crate::endpoint::Operation;

/// Where a module's code lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Shipped with this crate (`core`, `forge.host`, `forge.bridge`).
    Builtin,
    /// Statically known to the host, optionally backed by a file on disk.
    Static { path: Option<PathBuf> },
    /// Produced at runtime without any binary identity. Cannot be referenced by
    /// a compilation.
    InMemory,
    /// Produced by the compiler pipeline and loaded into this process.
    Dynamic,
}

/// A declared field of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub ty: TypeRef,
}

/// A type exported by a module, as seen by discovery and by the compiler.
pub struct TypeInfo {
    pub module: ModuleId,
    pub name: String,
    pub generic_arity: usize,
    pub fields: Vec<FieldInfo>,
    pub base: Option<TypeRef>,
    /// Routed operations; non-empty only for endpoint-bearing types.
    pub operations: Vec<Arc<dyn Operation>>,
}

impl TypeInfo {
    pub fn new(module: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            generic_arity: 0,
            fields: Vec::new(),
            base: None,
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldInfo {
            name: name.into(),
            ty,
        });
        self
    }

    #[must_use]
    pub fn with_generic_arity(mut self, arity: usize) -> Self {
        self.generic_arity = arity;
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: Arc<dyn Operation>) -> Self {
        self.operations.push(operation);
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reference to this (non-generic) type.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(self.module.clone(), self.name.clone())
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("generic_arity", &self.generic_arity)
            .field("fields", &self.fields)
            .field("base", &self.base)
            .field(
                "operations",
                &self.operations.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A binary module: an identity, an origin and its exported types.
#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    pub origin: ModuleOrigin,
    pub types: Vec<Arc<TypeInfo>>,
}

impl Module {
    pub fn new(id: impl Into<ModuleId>, origin: ModuleOrigin) -> Self {
        Self {
            id: id.into(),
            origin,
            types: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, ty: TypeInfo) -> Self {
        self.types.push(Arc::new(ty));
        self
    }

    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Whether the module can be handed to a compilation as a reference.
    #[must_use]
    pub fn has_binary_identity(&self) -> bool {
        !matches!(self.origin, ModuleOrigin::InMemory)
    }
}
