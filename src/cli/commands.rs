use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};

use crate::builder::{BuildError, ForgeBuilder};
use crate::compiler::BuildMode;
use crate::config::ForgeConfig;
use crate::definition::{load_definitions, LoadedDefinitions};
use crate::logging::{init_logging_with_config, LogConfig};
use crate::synth::SurrogateMode;

/// Command-line interface for brrtforge
///
/// Inspects what a definitions file turns into: the synthesized source, the
/// compiler's diagnostics, and the routes of the compiled module.
#[derive(Parser)]
#[command(name = "brrtforge")]
#[command(about = "brrtforge CLI", long_about = None)]
pub struct Cli {
    /// YAML configuration file; `BRRTR_FORGE_*` variables are used otherwise
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless BRRTR_LOG_LEVEL is set
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands for brrtforge
#[derive(Subcommand)]
pub enum Commands {
    /// Print the synthesized source units of a definitions file
    Synth {
        /// Path to the definitions file (YAML or JSON)
        #[arg(short, long)]
        defs: PathBuf,

        /// Surrogate identifier source (overrides configuration)
        #[arg(long, value_enum)]
        surrogates: Option<SurrogateArg>,
    },
    /// Compile a definitions file and print its routes or diagnostics
    Check {
        /// Path to the definitions file (YAML or JSON)
        #[arg(short, long)]
        defs: PathBuf,

        /// Build in debug mode: persist source units and load debug symbols
        #[arg(long, default_value_t = false)]
        debug: bool,

        /// Directory for debug source units (overrides configuration)
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
}

/// Surrogate identifier sources selectable on the command line
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SurrogateArg {
    /// ULIDs, different on every run
    Random,
    /// A counter, identical on every run
    Sequential,
}

impl From<SurrogateArg> for SurrogateMode {
    fn from(arg: SurrogateArg) -> Self {
        match arg {
            SurrogateArg::Random => SurrogateMode::Random,
            SurrogateArg::Sequential => SurrogateMode::Sequential,
        }
    }
}

fn base_config(path: Option<&Path>) -> anyhow::Result<ForgeConfig> {
    match path {
        Some(path) => ForgeConfig::from_yaml_file(path),
        None => Ok(ForgeConfig::from_env()),
    }
}

fn load(defs: &Path) -> anyhow::Result<LoadedDefinitions> {
    load_definitions(defs).with_context(|| format!("cannot load definitions from {}", defs.display()))
}

/// Execute a parsed command, writing its report to `out`
///
/// # Errors
///
/// Returns an error if configuration or definitions cannot be loaded, or the
/// build fails. Compilation diagnostics are written to `out` first.
pub fn execute(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut config = base_config(cli.config.as_deref())?;
    match &cli.command {
        Commands::Synth { defs, surrogates } => {
            if let Some(surrogates) = surrogates {
                config.surrogates = (*surrogates).into();
            }
            let loaded = load(defs)?;
            let specs = ForgeBuilder::new(loaded.catalog, config).synthesize(&loaded.handlers)?;
            for unit in specs.iter().flat_map(|spec| spec.units()) {
                writeln!(out, "// ---- {} ----", unit.name)?;
                write!(out, "{}", unit.text)?;
            }
            Ok(())
        }
        Commands::Check {
            defs,
            debug,
            debug_dir,
        } => {
            if *debug {
                config.mode = BuildMode::Debug;
            }
            if let Some(dir) = debug_dir {
                config.debug_dir = dir.clone();
            }
            let loaded = load(defs)?;
            let builder = ForgeBuilder::new(loaded.catalog, config);
            let module = match builder.build(&loaded.handlers) {
                Ok(module) => module,
                Err(BuildError::Compilation(err)) => {
                    write!(out, "{err}")?;
                    return Err(anyhow!(
                        "compilation failed with {} error(s)",
                        err.errors().count()
                    ));
                }
                Err(err) => return Err(err.into()),
            };

            writeln!(out, "module {} ({} build)", module.id(), module.mode())?;
            for op in module.operations() {
                let route = op.route();
                write!(out, "{:<8}{:<32}{}", route.method.as_str(), route.template, op.name())?;
                if let Some(location) = op.source_location() {
                    write!(out, "  [{location}]")?;
                }
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

/// Execute the CLI command provided by the user
///
/// # Errors
///
/// See [`execute`]; also fails if logging cannot be initialised.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if env::var("BRRTR_LOG_LEVEL").is_err() {
        log_config.log_level = if cli.verbose { "debug" } else { "warn" }.to_string();
    }
    let _guard = init_logging_with_config(&log_config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&cli, &mut out)
}
