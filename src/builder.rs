//! # Builder Module
//!
//! The single build entry point: handler definitions in, one loaded
//! [`CompiledModule`] out.
//!
//! ```text
//! validate -> resolve references -> synthesize -> compile -> load
//! ```
//!
//! Every stage is fatal; a failed build produces no module and registers
//! nothing. Builds are independent: each one starts from a fresh naming table,
//! so two builders in the same process (or two tests) never interfere.

use std::fmt;
use std::sync::Arc;

use tracing::{info, info_span};

use crate::compiler::{compile, Artifact, CompileOptions, CompiledModule, LoadError};
use crate::config::ForgeConfig;
use crate::definition::{DefinitionError, HandlerDefinition};
use crate::diagnostics::CompilationError;
use crate::registry::RegistryError;
use crate::resolver::{definition_types, ReferenceResolver, ReferenceSet, UnresolvableReferenceError};
use crate::synth::{OperationSpec, SynthesisError, Synthesizer};
use crate::types::TypeCatalog;

/// Any failure of [`ForgeBuilder::build`] or of registering its result.
#[derive(Debug)]
pub enum BuildError {
    Definition(DefinitionError),
    Unresolvable(UnresolvableReferenceError),
    Synthesis(SynthesisError),
    Compilation(CompilationError),
    Load(LoadError),
    Registry(RegistryError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Definition(err) => write!(f, "invalid handler definition: {err}"),
            BuildError::Unresolvable(err) => write!(f, "{err}"),
            BuildError::Synthesis(err) => write!(f, "synthesis failed: {err}"),
            BuildError::Compilation(err) => write!(f, "{err}"),
            BuildError::Load(err) => write!(f, "failed to load compiled module: {err}"),
            BuildError::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Definition(err) => Some(err),
            BuildError::Unresolvable(err) => Some(err),
            BuildError::Synthesis(err) => Some(err),
            BuildError::Compilation(err) => Some(err),
            BuildError::Load(err) => Some(err),
            BuildError::Registry(err) => Some(err),
        }
    }
}

impl From<DefinitionError> for BuildError {
    fn from(err: DefinitionError) -> Self {
        BuildError::Definition(err)
    }
}

impl From<UnresolvableReferenceError> for BuildError {
    fn from(err: UnresolvableReferenceError) -> Self {
        BuildError::Unresolvable(err)
    }
}

impl From<SynthesisError> for BuildError {
    fn from(err: SynthesisError) -> Self {
        BuildError::Synthesis(err)
    }
}

impl From<CompilationError> for BuildError {
    fn from(err: CompilationError) -> Self {
        BuildError::Compilation(err)
    }
}

impl From<LoadError> for BuildError {
    fn from(err: LoadError) -> Self {
        BuildError::Load(err)
    }
}

impl From<RegistryError> for BuildError {
    fn from(err: RegistryError) -> Self {
        BuildError::Registry(err)
    }
}

impl BuildError {
    /// The compilation failure, if that is what this is.
    #[must_use]
    pub fn as_compilation(&self) -> Option<&CompilationError> {
        match self {
            BuildError::Compilation(err) => Some(err),
            _ => None,
        }
    }
}

/// Turns handler definitions into a loaded module.
#[derive(Debug, Clone)]
pub struct ForgeBuilder {
    config: ForgeConfig,
    catalog: TypeCatalog,
}

impl ForgeBuilder {
    /// Build against the host's `catalog` of known modules.
    #[must_use]
    pub fn new(catalog: TypeCatalog, config: ForgeConfig) -> Self {
        Self { config, catalog }
    }

    #[must_use]
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Validate every definition and resolve the references they need.
    ///
    /// # Errors
    ///
    /// Returns the first invalid definition or unresolvable type.
    pub fn resolve(&self, definitions: &[HandlerDefinition]) -> Result<ReferenceSet, BuildError> {
        for def in definitions {
            def.validate()?;
        }
        let types = definition_types(definitions);
        Ok(ReferenceResolver::new(&self.catalog).resolve(&types)?)
    }

    /// Synthesize source for every definition without compiling it.
    ///
    /// # Errors
    ///
    /// Returns the first invalid definition or naming failure.
    pub fn synthesize(&self, definitions: &[HandlerDefinition]) -> Result<Vec<OperationSpec>, BuildError> {
        for def in definitions {
            def.validate()?;
        }
        Ok(Synthesizer::from_config(&self.config).synthesize_all(definitions)?)
    }

    /// Run every stage up to and including emission.
    ///
    /// # Errors
    ///
    /// See [`ForgeBuilder::build`].
    pub fn build_artifact(&self, definitions: &[HandlerDefinition]) -> Result<Artifact, BuildError> {
        let span = info_span!("forge_build", module = %self.config.module_name, mode = %self.config.mode);
        let _guard = span.enter();

        let references = self.resolve(definitions)?;
        let specs = Synthesizer::from_config(&self.config).synthesize_all(definitions)?;
        let units = specs.iter().flat_map(OperationSpec::units).collect();
        Ok(compile(units, &references, &CompileOptions::from_config(&self.config))?)
    }

    /// Build one module exposing one operation per definition.
    ///
    /// An empty definition list yields a module whose controller has no
    /// operations.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] for the first stage that fails; nothing is loaded
    /// in that case.
    pub fn build(&self, definitions: &[HandlerDefinition]) -> Result<Arc<CompiledModule>, BuildError> {
        let artifact = self.build_artifact(definitions)?;
        let module = artifact.load()?;
        info!(
            module = %module.id(),
            operations = module.operations().count(),
            "generated module loaded"
        );
        Ok(Arc::new(module))
    }
}
