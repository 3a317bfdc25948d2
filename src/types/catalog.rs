use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::module::{Module, ModuleOrigin, TypeInfo};
use super::type_ref::{ModuleId, TypeRef};

pub const CORE_MODULE: &str = "core";
pub const HOST_MODULE: &str = "forge.host";
pub const BRIDGE_MODULE: &str = "forge.bridge";

/// Base object type every compilation references.
pub fn object_type() -> TypeRef {
    TypeRef::core("Object")
}

/// Base type of endpoint-bearing controllers.
pub fn controller_type() -> TypeRef {
    TypeRef::named(HOST_MODULE, "Controller")
}

/// Contract type of the request processing bridge.
pub fn processor_type() -> TypeRef {
    TypeRef::named(BRIDGE_MODULE, "RequestProcessor")
}

fn core_module() -> Module {
    let mut module = Module::new(CORE_MODULE, ModuleOrigin::Builtin);
    for name in ["Object", "Bool", "Int", "Long", "Float", "String"] {
        module = module.with_type(TypeInfo::new(CORE_MODULE, name));
    }
    module
        .with_type(TypeInfo::new(CORE_MODULE, "List").with_generic_arity(1))
        .with_type(TypeInfo::new(CORE_MODULE, "Map").with_generic_arity(2))
}

/// Every module the host knows about, keyed by identity.
///
/// Always contains the bootstrap modules (`core`, `forge.host`, `forge.bridge`).
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    modules: BTreeMap<ModuleId, Arc<Module>>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalog {
    #[must_use]
    pub fn new() -> Self {
        let mut catalog = Self {
            modules: BTreeMap::new(),
        };
        catalog.insert(core_module());
        catalog.insert(
            Module::new(HOST_MODULE, ModuleOrigin::Builtin)
                .with_type(TypeInfo::new(HOST_MODULE, "Controller").with_base(object_type())),
        );
        catalog.insert(
            Module::new(BRIDGE_MODULE, ModuleOrigin::Builtin)
                .with_type(TypeInfo::new(BRIDGE_MODULE, "RequestProcessor")),
        );
        catalog
    }

    /// Add a module, replacing any module with the same identity.
    pub fn insert(&mut self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);
        if self
            .modules
            .insert(module.id.clone(), Arc::clone(&module))
            .is_some()
        {
            debug!(module = %module.id, "replaced module in type catalog");
        }
        module
    }

    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<&Arc<Module>> {
        self.modules.get(id)
    }

    /// Declaration of a named type, if its module is known and declares it.
    #[must_use]
    pub fn lookup(&self, ty: &TypeRef) -> Option<&Arc<TypeInfo>> {
        match ty {
            TypeRef::Named {
                module: Some(module),
                name,
                ..
            } => self.modules.get(module)?.find_type(name),
            _ => None,
        }
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_modules_present() {
        let catalog = TypeCatalog::new();
        assert!(catalog.lookup(&object_type()).is_some());
        assert!(catalog.lookup(&controller_type()).is_some());
        assert!(catalog.lookup(&processor_type()).is_some());
        assert_eq!(
            catalog
                .lookup(&TypeRef::core("List"))
                .map(|t| t.generic_arity),
            Some(1)
        );
    }

    #[test]
    fn test_lookup_unknown() {
        let catalog = TypeCatalog::new();
        assert!(catalog.lookup(&TypeRef::named("app", "Missing")).is_none());
        assert!(catalog.lookup(&TypeRef::anonymous("Int")).is_none());
    }
}
