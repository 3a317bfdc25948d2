//! # CLI Module
//!
//! Command-line inspection of definitions files.
//!
//! ## Commands
//!
//! ### `synth`
//!
//! Print the forge source synthesized for every definition:
//!
//! ```bash
//! brrtforge synth --defs handlers.yaml --surrogates sequential
//! ```
//!
//! ### `check`
//!
//! Compile the definitions. On success the route table of the compiled module
//! is printed; on failure every diagnostic is printed together with the full
//! generated source, and the exit code is non-zero.
//!
//! ```bash
//! brrtforge check --defs handlers.yaml --debug --debug-dir target/forge
//! ```
//!
//! Both commands read `BRRTR_FORGE_*` variables, or `--config <FILE>` when given.

mod commands;


pub use commands::{execute, run_cli, Cli, Commands, SurrogateArg};
