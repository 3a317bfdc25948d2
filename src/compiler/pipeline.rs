use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::check::{check_program, ParsedUnit};
use super::image::SymbolTable;
use super::loader::{load, CompiledModule, LoadError};
use super::parser::parse_source;
use super::{BuildMode, SourceUnit};
use crate::config::ForgeConfig;
use crate::diagnostics::{CompilationError, Diagnostic, Severity};
use crate::resolver::ReferenceSet;
use crate::types::ModuleId;

/// Name of the shared controller type every generated operation lives on.
pub const CONTROLLER_NAME: &str = "GeneratedController";

/// Settings for one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub module: ModuleId,
    pub controller: String,
    pub mode: BuildMode,
    /// Where debug builds persist their source units
    pub debug_dir: PathBuf,
    /// Debug unit files are named `<prefix>_<unit>.fg`
    pub file_prefix: String,
}

impl CompileOptions {
    #[must_use]
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            module: ModuleId::new(config.module_name.as_str()),
            controller: CONTROLLER_NAME.to_string(),
            mode: config.mode,
            debug_dir: config.debug_dir.clone(),
            file_prefix: config.file_prefix.clone(),
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::from_config(&ForgeConfig::default())
    }
}

/// Emitted streams of a successful compilation.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub module: ModuleId,
    /// The executable module image
    pub image: Vec<u8>,
    /// Debug-symbol stream, debug builds only
    pub symbols: Option<Vec<u8>>,
    pub units: Vec<SourceUnit>,
    /// Warnings reported by the compilation
    pub warnings: Vec<Diagnostic>,
}

impl Artifact {
    /// Load both streams into the running process.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the image cannot be decoded.
    pub fn load(&self) -> Result<CompiledModule, LoadError> {
        load(&self.image, self.symbols.as_deref())
    }
}

fn debug_file_name(prefix: &str, unit: &str) -> String {
    format!("{prefix}_{unit}.fg")
}

fn persist_units(units: &mut [SourceUnit], dir: &Path, prefix: &str) {
    if let Err(err) = fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %err, "cannot create debug source directory");
        return;
    }
    for unit in units {
        let path = dir.join(debug_file_name(prefix, &unit.name));
        match fs::write(&path, &unit.text) {
            Ok(()) => {
                debug!(unit = %unit.name, path = %path.display(), "persisted debug source unit");
                unit.path = Some(path);
            }
            Err(err) => {
                warn!(unit = %unit.name, path = %path.display(), error = %err, "cannot persist debug source unit");
            }
        }
    }
}

fn emit_failure(units: Vec<SourceUnit>, err: &serde_json::Error) -> CompilationError {
    CompilationError {
        diagnostics: vec![Diagnostic::new(
            Severity::Error,
            "E0901",
            format!("failed to emit module image: {err}"),
            "<emit>",
            "",
            0..0,
        )],
        units,
    }
}

/// Compile every unit together into one module.
///
/// Units are checked as one program, so an operation may use a shape declared
/// in another unit. Debug builds first persist each unit to
/// `<debug_dir>/<prefix>_<name>.fg`, pretty-print the image and emit a symbol
/// table; release builds inline `let` bindings and emit a compact image.
///
/// # Errors
///
/// Returns [`CompilationError`] carrying every diagnostic and every unit if any
/// error is reported.
pub fn compile(
    mut units: Vec<SourceUnit>,
    references: &ReferenceSet,
    options: &CompileOptions,
) -> Result<Artifact, CompilationError> {
    info!(
        units = units.len(),
        references = references.len(),
        mode = %options.mode,
        module = %options.module,
        "compiling generated source"
    );
    if options.mode == BuildMode::Debug {
        persist_units(&mut units, &options.debug_dir, &options.file_prefix);
    }

    let (output, mut diagnostics) = {
        let mut diagnostics = Vec::new();
        let mut parsed = Vec::with_capacity(units.len());
        for unit in &units {
            match parse_source(&unit.text) {
                Ok(file) => parsed.push(ParsedUnit { unit, file }),
                Err(err) => diagnostics.push(
                    Diagnostic::new(
                        Severity::Error,
                        "E0001",
                        err.message,
                        &unit.name,
                        &unit.text,
                        err.span,
                    )
                    .with_label("syntax error"),
                ),
            }
        }
        let output = check_program(&parsed, references, &options.module, &options.controller);
        (output, diagnostics)
    };
    diagnostics.extend(output.diagnostics);

    for warning in diagnostics.iter().filter(|d| !d.is_error()) {
        warn!(code = warning.code, unit = %warning.unit, line = warning.line, "{}", warning.message);
    }
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(CompilationError { diagnostics, units });
    }

    let mut image = output.image;
    let (image_bytes, symbols) = match options.mode {
        BuildMode::Release => {
            for op in &mut image.operations {
                op.inline_locals();
            }
            match serde_json::to_vec(&image) {
                Ok(bytes) => (bytes, None),
                Err(err) => return Err(emit_failure(units, &err)),
            }
        }
        BuildMode::Debug => {
            let table = SymbolTable {
                module: options.module.clone(),
                symbols: output.symbols,
            };
            let emitted = serde_json::to_vec_pretty(&image)
                .and_then(|img| serde_json::to_vec_pretty(&table).map(|sym| (img, sym)));
            match emitted {
                Ok((img, sym)) => (img, Some(sym)),
                Err(err) => return Err(emit_failure(units, &err)),
            }
        }
    };

    info!(
        operations = image.operations.len(),
        shapes = image.shapes.len(),
        image_bytes = image_bytes.len(),
        "compilation succeeded"
    );
    Ok(Artifact {
        module: options.module.clone(),
        image: image_bytes,
        symbols,
        units,
        warnings: diagnostics,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::compiler::image::ModuleImage;
    use crate::resolver::ReferenceResolver;
    use crate::types::{Module, ModuleOrigin, TypeCatalog, TypeInfo, TypeRef};

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog.insert(
            Module::new("app", ModuleOrigin::Static { path: None })
                .with_type(
                    TypeInfo::new("app", "CreateUser")
                        .with_field("Name", TypeRef::core("String"))
                        .with_field("Email", TypeRef::core("String")),
                )
                .with_type(TypeInfo::new("app", "User").with_field("Id", TypeRef::core("Int"))),
        );
        catalog
    }

    fn references(catalog: &TypeCatalog) -> ReferenceSet {
        let types = [TypeRef::named("app", "CreateUser")];
        ReferenceResolver::new(catalog).resolve(types.iter()).unwrap()
    }

    const CARRIER: &str = "shape CreateUserBody_0001 {\n    Name: core::String,\n    Email: core::String,\n}\n";

    const OP: &str = r#"#[http(POST, "/users")]
#[produces(app::User)]
op CreateUser(#[body] body: CreateUserBody_0001) -> app::User {
    let request_0001 = new app::CreateUser {
        Name = body.Name,
        Email = body.Email,
    };
    return process::<app::CreateUser, app::User>(request_0001);
}
"#;

    fn units() -> Vec<SourceUnit> {
        vec![
            SourceUnit::new("CreateUserBody_0001", CARRIER),
            SourceUnit::new("CreateUser", OP),
        ]
    }

    #[test]
    fn test_release_build_inlines_locals() {
        let catalog = catalog();
        let artifact = compile(units(), &references(&catalog), &CompileOptions::default()).unwrap();
        assert!(artifact.symbols.is_none());
        let image: ModuleImage = serde_json::from_slice(&artifact.image).unwrap();
        assert_eq!(image.controller, CONTROLLER_NAME);
        assert_eq!(image.shapes.len(), 1);
        assert!(image.operations[0].locals.is_empty());
        assert!(!String::from_utf8_lossy(&artifact.image).contains('\n'));
    }

    #[test]
    fn test_debug_build_persists_units_and_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog();
        let options = CompileOptions {
            mode: BuildMode::Debug,
            debug_dir: dir.path().to_path_buf(),
            ..CompileOptions::default()
        };
        let artifact = compile(units(), &references(&catalog), &options).unwrap();
        let path = dir.path().join("rc_CreateUser.fg");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), OP);
        assert!(dir.path().join("rc_CreateUserBody_0001.fg").exists());
        assert_eq!(artifact.units[1].path.as_deref(), Some(path.as_path()));

        let module = artifact.load().unwrap();
        assert_eq!(module.mode(), BuildMode::Debug);
        let op = module.operation("CreateUser").unwrap();
        let location = op.source_location().unwrap();
        assert_eq!((location.line, location.column), (3, 4));
        assert_eq!(location.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_failure_carries_all_units() {
        let catalog = catalog();
        let broken = OP.replace("body.Email", "body.Emial");
        let units = vec![
            SourceUnit::new("CreateUserBody_0001", CARRIER),
            SourceUnit::new("CreateUser", broken),
        ];
        let err = compile(units, &references(&catalog), &CompileOptions::default()).unwrap_err();
        let codes: Vec<_> = err.errors().map(|d| d.code).collect();
        assert_eq!(codes, vec!["E0302"]);
        assert_eq!(err.errors().next().unwrap().unit, "CreateUser");
        let text = err.to_string();
        assert!(text.contains("shape CreateUserBody_0001"));
        assert!(text.contains("body.Emial"));
    }

    #[test]
    fn test_syntax_errors_reported_per_unit() {
        let catalog = catalog();
        let units = vec![
            SourceUnit::new("A", "shape A { Name core::String }"),
            SourceUnit::new("B", "op"),
        ];
        let err = compile(units, &references(&catalog), &CompileOptions::default()).unwrap_err();
        let units: Vec<_> = err.errors().map(|d| (d.unit.as_str(), d.code)).collect();
        assert_eq!(units, vec![("A", "E0001"), ("B", "E0001")]);
    }
}
