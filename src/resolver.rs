//! # Reference Resolver
//!
//! Computes the set of modules a compilation must reference so that every type
//! named in generated source resolves. Starts from the bootstrap set (base
//! object, base controller, request processing bridge) and adds the declaring
//! module of every request/response/binding type, recursing into generic
//! arguments and array elements.
//!
//! Resolution of the types handed in is strict: a type with no locatable
//! declaring module fails the build with [`UnresolvableReferenceError`]. Field
//! types of those types are then followed on a best-effort basis, so the set
//! errs on the side of including too much; an under-resolved set would only
//! surface later as a compile failure.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::definition::HandlerDefinition;
use crate::types::{
    controller_type, object_type, processor_type, Module, ModuleId, TypeCatalog, TypeInfo, TypeRef,
};

/// Deduplicated modules required by a compilation, in module-id order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    modules: BTreeMap<ModuleId, Arc<Module>>,
}

impl ReferenceSet {
    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<&Arc<Module>> {
        self.modules.get(id)
    }

    /// Declaration of a named type within the referenced modules.
    #[must_use]
    pub fn lookup(&self, module: &ModuleId, name: &str) -> Option<&Arc<TypeInfo>> {
        self.modules.get(module)?.find_type(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn insert(&mut self, module: &Arc<Module>) -> bool {
        if self.modules.contains_key(&module.id) {
            return false;
        }
        debug!(module = %module.id, "adding compilation reference");
        self.modules.insert(module.id.clone(), Arc::clone(module));
        true
    }
}

/// Why a type's declaring module could not be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvableReason {
    /// The type names no module at all.
    NoDeclaringModule,
    /// The named module is not known to the host.
    UnknownModule(ModuleId),
    /// The module exists only in memory and cannot be referenced.
    NoBinaryIdentity(ModuleId),
}

/// A type used by a definition has no locatable declaring module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvableReferenceError {
    /// The type handed to the resolver
    pub ty: TypeRef,
    /// The (possibly nested) type that failed
    pub offending: TypeRef,
    pub reason: UnresolvableReason,
}

impl fmt::Display for UnresolvableReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let within = if self.ty == self.offending {
            String::new()
        } else {
            format!(" (in '{}')", self.ty)
        };
        match &self.reason {
            UnresolvableReason::NoDeclaringModule => write!(
                f,
                "cannot resolve a reference for type '{}'{within}: it has no declaring module",
                self.offending
            ),
            UnresolvableReason::UnknownModule(m) => write!(
                f,
                "cannot resolve a reference for type '{}'{within}: module '{m}' is not known",
                self.offending
            ),
            UnresolvableReason::NoBinaryIdentity(m) => write!(
                f,
                "cannot resolve a reference for type '{}'{within}: module '{m}' has no binary identity",
                self.offending
            ),
        }
    }
}

impl std::error::Error for UnresolvableReferenceError {}

/// Types every compilation references regardless of its definitions.
#[must_use]
pub fn bootstrap_types() -> [TypeRef; 3] {
    [object_type(), controller_type(), processor_type()]
}

/// Every type a set of definitions mentions: request, unwrapped response and
/// binding value types, in definition order.
#[must_use]
pub fn definition_types(definitions: &[HandlerDefinition]) -> Vec<TypeRef> {
    let mut types = Vec::new();
    for def in definitions {
        types.push(def.request_type.clone());
        types.push(def.response_type.unwrap_async().clone());
        for binding in &def.parameters {
            types.push(binding.value_type.clone());
        }
    }
    types
}

/// Resolves types to the modules declaring them.
pub struct ReferenceResolver<'a> {
    catalog: &'a TypeCatalog,
}

impl<'a> ReferenceResolver<'a> {
    #[must_use]
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Compute the reference set for `types` plus the bootstrap set.
    ///
    /// # Errors
    ///
    /// Returns [`UnresolvableReferenceError`] naming the first type whose
    /// declaring module (or a generic argument's / element's) cannot be located.
    pub fn resolve<'t>(
        &self,
        types: impl IntoIterator<Item = &'t TypeRef>,
    ) -> Result<ReferenceSet, UnresolvableReferenceError> {
        let mut set = ReferenceSet::default();
        let mut named = Vec::new();

        for ty in bootstrap_types().iter() {
            self.add_strict(ty, ty, &mut set, &mut named)?;
        }
        for ty in types {
            self.add_strict(ty, ty, &mut set, &mut named)?;
        }

        let mut visited = HashSet::new();
        for ty in named {
            self.add_transitive(&ty, &mut set, &mut visited);
        }
        debug!(references = set.len(), "resolved compilation references");
        Ok(set)
    }

    fn locate(&self, ty: &TypeRef) -> Result<&'a Arc<Module>, UnresolvableReason> {
        let module = ty.module().ok_or(UnresolvableReason::NoDeclaringModule)?;
        let found = self
            .catalog
            .get(module)
            .ok_or_else(|| UnresolvableReason::UnknownModule(module.clone()))?;
        if !found.has_binary_identity() {
            return Err(UnresolvableReason::NoBinaryIdentity(module.clone()));
        }
        Ok(found)
    }

    fn add_strict(
        &self,
        root: &TypeRef,
        ty: &TypeRef,
        set: &mut ReferenceSet,
        named: &mut Vec<TypeRef>,
    ) -> Result<(), UnresolvableReferenceError> {
        if let TypeRef::Named { .. } = ty {
            let module = self.locate(ty).map_err(|reason| UnresolvableReferenceError {
                ty: root.clone(),
                offending: ty.clone(),
                reason,
            })?;
            set.insert(module);
            named.push(ty.clone());
        }
        for child in ty.children() {
            self.add_strict(root, child, set, named)?;
        }
        Ok(())
    }

    fn add_transitive(&self, ty: &TypeRef, set: &mut ReferenceSet, visited: &mut HashSet<TypeRef>) {
        if !visited.insert(ty.clone()) {
            return;
        }
        match self.locate(ty) {
            Ok(module) => {
                set.insert(module);
            }
            Err(reason) => {
                if matches!(ty, TypeRef::Named { .. }) {
                    debug!(ty = %ty, ?reason, "skipping transitive reference");
                }
            }
        }
        for child in ty.children() {
            self.add_transitive(child, set, visited);
        }
        if let Some(info) = self.catalog.lookup(ty) {
            for field in &info.fields {
                self.add_transitive(&field.ty, set, visited);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::types::{ModuleOrigin, BRIDGE_MODULE, CORE_MODULE, HOST_MODULE};

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog.insert(
            Module::new("app.orders", ModuleOrigin::Static { path: None }).with_type(
                TypeInfo::new("app.orders", "Order")
                    .with_field("Customer", TypeRef::named("app.customers", "Customer"))
                    .with_field("Draft", TypeRef::named("scratch", "Draft")),
            ),
        );
        catalog.insert(
            Module::new("app.customers", ModuleOrigin::Static { path: None })
                .with_type(TypeInfo::new("app.customers", "Customer")),
        );
        catalog.insert(
            Module::new("app.tags", ModuleOrigin::Static { path: None })
                .with_type(TypeInfo::new("app.tags", "Tag")),
        );
        catalog.insert(
            Module::new("scratch", ModuleOrigin::InMemory).with_type(TypeInfo::new("scratch", "Draft")),
        );
        catalog
    }

    #[test]
    fn test_bootstrap_always_included() {
        let catalog = catalog();
        let set = ReferenceResolver::new(&catalog).resolve(&[]).unwrap();
        let ids: Vec<_> = set.ids().map(|m| m.as_str().to_string()).collect();
        assert_eq!(ids, vec![CORE_MODULE, BRIDGE_MODULE, HOST_MODULE]);
    }

    #[test]
    fn test_generic_args_and_arrays_resolved() {
        let catalog = catalog();
        let ty = TypeRef::generic(
            "core",
            "List",
            vec![TypeRef::array(TypeRef::named("app.tags", "Tag"))],
        );
        let set = ReferenceResolver::new(&catalog).resolve([&ty]).unwrap();
        assert!(set.contains(&ModuleId::from("app.tags")));
    }

    #[test]
    fn test_transitive_field_modules_over_included() {
        let catalog = catalog();
        let ty = TypeRef::named("app.orders", "Order");
        let set = ReferenceResolver::new(&catalog).resolve([&ty]).unwrap();
        assert!(set.contains(&ModuleId::from("app.customers")));
        // in-memory module reached transitively is skipped, not fatal
        assert!(!set.contains(&ModuleId::from("scratch")));
    }

    #[test]
    fn test_deduplicates_by_module() {
        let catalog = catalog();
        let a = TypeRef::named("app.tags", "Tag");
        let b = TypeRef::array(TypeRef::named("app.tags", "Tag"));
        let set = ReferenceResolver::new(&catalog).resolve([&a, &b]).unwrap();
        assert_eq!(set.iter().filter(|m| m.id.as_str() == "app.tags").count(), 1);
    }

    #[test]
    fn test_unresolvable_types() {
        let catalog = catalog();
        let resolver = ReferenceResolver::new(&catalog);

        let anon = TypeRef::anonymous("Widget");
        let err = resolver.resolve([&anon]).unwrap_err();
        assert_eq!(err.reason, UnresolvableReason::NoDeclaringModule);
        assert!(err.to_string().contains("Widget"));

        let nested = TypeRef::generic("core", "List", vec![TypeRef::named("app.nowhere", "X")]);
        let err = resolver.resolve([&nested]).unwrap_err();
        assert_eq!(err.offending, TypeRef::named("app.nowhere", "X"));
        assert_eq!(err.ty, nested);

        let draft = TypeRef::named("scratch", "Draft");
        let err = resolver.resolve([&draft]).unwrap_err();
        assert!(matches!(err.reason, UnresolvableReason::NoBinaryIdentity(_)));
    }
}
