//! # Dynamic Type Registry Bridge
//!
//! Makes generated modules visible to the host's type discovery.
//!
//! The host answers two questions through [`TypeDiscovery`]: which modules exist,
//! and which types within a set of modules are endpoint-bearing. The default
//! host implementation, [`StaticDiscovery`], only knows the modules it was
//! created with and skips dynamic modules when asked for endpoints.
//! [`DynamicDiscovery`] wraps any host discovery and adds registered modules to
//! both answers, leaving the host's own answers untouched.
//!
//! ## Registration
//!
//! ```text
//! Unregistered --register(module)--> Registered
//! ```
//!
//! Registering the same module handle again is a no-op. There is no way back:
//! a registered module lives for the rest of the process.
//!
//! Bootstrap code goes through [`configure_request_handlers`], which builds and
//! then registers, so a failed build leaves discovery unchanged.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::builder::{BuildError, ForgeBuilder};
use crate::compiler::CompiledModule;
use crate::definition::HandlerDefinition;
use crate::types::{controller_type, Module, ModuleId, ModuleOrigin, TypeCatalog, TypeInfo};

/// Host type-discovery queries.
pub trait TypeDiscovery: Send + Sync {
    /// Every module known to the host.
    fn modules(&self) -> Vec<Arc<Module>>;

    /// Endpoint-bearing types declared by `modules`.
    fn endpoint_types(&self, modules: &[Arc<Module>]) -> Vec<Arc<TypeInfo>>;
}

/// The host's endpoint predicate.
///
/// A type is endpoint-bearing when it extends `forge.host::Controller`, its name
/// ends with `Controller`, and it exposes at least one routed operation.
#[must_use]
pub fn is_endpoint_type(ty: &TypeInfo) -> bool {
    ty.base.as_ref() == Some(&controller_type())
        && ty.name.ends_with("Controller")
        && !ty.operations.is_empty()
}

fn endpoint_types_of<'a>(modules: impl IntoIterator<Item = &'a Arc<Module>>) -> Vec<Arc<TypeInfo>> {
    modules
        .into_iter()
        .flat_map(|m| m.types.iter())
        .filter(|ty| is_endpoint_type(ty))
        .cloned()
        .collect()
}

/// Discovery over a fixed list of statically known modules.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    modules: Vec<Arc<Module>>,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(modules: Vec<Arc<Module>>) -> Self {
        Self { modules }
    }

    #[must_use]
    pub fn from_catalog(catalog: &TypeCatalog) -> Self {
        Self::new(catalog.modules().cloned().collect())
    }
}

impl TypeDiscovery for StaticDiscovery {
    fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.clone()
    }

    fn endpoint_types(&self, modules: &[Arc<Module>]) -> Vec<Arc<TypeInfo>> {
        endpoint_types_of(
            modules
                .iter()
                .filter(|m| !matches!(m.origin, ModuleOrigin::Dynamic)),
        )
    }
}

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A different module already claims this identity.
    ModuleIdConflict { id: ModuleId },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::ModuleIdConflict { id } => {
                write!(f, "a different module is already registered as '{id}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Host discovery extended with registered dynamic modules.
pub struct DynamicDiscovery<D> {
    inner: D,
    registered: RwLock<Vec<Arc<Module>>>,
}

impl<D: TypeDiscovery> DynamicDiscovery<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            registered: RwLock::new(Vec::new()),
        }
    }

    /// The wrapped host discovery.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Make `module` discoverable.
    ///
    /// Returns `Ok(false)` if this very module is already registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ModuleIdConflict`] if a different module, static
    /// or registered, has the same identity.
    pub fn register(&self, module: &Arc<Module>) -> Result<bool, RegistryError> {
        let mut registered = self
            .registered
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = registered.iter().find(|m| m.id == module.id) {
            if Arc::ptr_eq(existing, module) {
                debug!(module = %module.id, "module already registered");
                return Ok(false);
            }
            return Err(RegistryError::ModuleIdConflict {
                id: module.id.clone(),
            });
        }
        if self.inner.modules().iter().any(|m| m.id == module.id) {
            return Err(RegistryError::ModuleIdConflict {
                id: module.id.clone(),
            });
        }
        registered.push(Arc::clone(module));
        info!(
            module = %module.id,
            types = module.types.len(),
            "registered dynamic module"
        );
        Ok(true)
    }

    /// Register the module of a build result.
    ///
    /// # Errors
    ///
    /// See [`DynamicDiscovery::register`].
    pub fn register_compiled(&self, compiled: &CompiledModule) -> Result<bool, RegistryError> {
        self.register(compiled.module())
    }

    /// Modules registered so far, in registration order.
    pub fn registered(&self) -> Vec<Arc<Module>> {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_registered(&self, module: &Arc<Module>) -> bool {
        self.registered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|m| Arc::ptr_eq(m, module))
    }
}

impl<D: TypeDiscovery> TypeDiscovery for DynamicDiscovery<D> {
    fn modules(&self) -> Vec<Arc<Module>> {
        let mut modules = self.inner.modules();
        for module in self.registered() {
            if !modules.iter().any(|m| m.id == module.id) {
                modules.push(module);
            }
        }
        modules
    }

    fn endpoint_types(&self, modules: &[Arc<Module>]) -> Vec<Arc<TypeInfo>> {
        let (dynamic, host): (Vec<_>, Vec<_>) = modules
            .iter()
            .cloned()
            .partition(|m| self.is_registered(m));
        let mut types = self.inner.endpoint_types(&host);
        types.extend(endpoint_types_of(&dynamic));
        types
    }
}

/// Build a module from `definitions` and make it discoverable.
///
/// Nothing is registered when the build fails.
///
/// # Errors
///
/// Returns the build failure, or [`RegistryError`] wrapped in
/// [`BuildError::Registry`] if the module identity is already taken.
pub fn configure_request_handlers<D: TypeDiscovery>(
    discovery: &DynamicDiscovery<D>,
    builder: &ForgeBuilder,
    definitions: &[HandlerDefinition],
) -> Result<Arc<CompiledModule>, BuildError> {
    let compiled = builder.build(definitions)?;
    discovery.register_compiled(&compiled)?;
    Ok(compiled)
}
