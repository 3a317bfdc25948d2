//! # Configuration Module
//!
//! Build-time settings for the forge pipeline.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `BRRTR_FORGE_MODE` | `mode` (`debug` / `release`) | `release` |
//! | `BRRTR_FORGE_MODULE` | `module_name` | `forge.generated` |
//! | `BRRTR_FORGE_DEBUG_DIR` | `debug_dir` | OS temp dir |
//! | `BRRTR_FORGE_PREFIX` | `file_prefix` | `rc` |
//! | `BRRTR_FORGE_SURROGATES` | `surrogates` (`random` / `sequential`) | `random` |
//!
//! Unparseable values fall back to the default.
//!
//! ## Usage
//!
//! ```rust
//! use brrtforge::config::ForgeConfig;
//!
//! let config = ForgeConfig::from_env();
//! println!("building {} in {} mode", config.module_name, config.mode);
//! ```
//!
//! The same fields can be loaded from YAML with [`ForgeConfig::from_yaml_file`]:
//!
//! ```yaml
//! module_name: app.generated
//! mode: debug
//! surrogates: sequential
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use crate::compiler::BuildMode;
pub use crate::synth::SurrogateMode;
use crate::synth::DEFAULT_MAX_NAME_SUFFIX;

/// Settings for one forge build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Identity of the compiled module
    pub module_name: String,
    pub mode: BuildMode,
    /// Where debug builds write their source units
    pub debug_dir: PathBuf,
    /// Prefix of debug source file names
    pub file_prefix: String,
    pub surrogates: SurrogateMode,
    /// Largest numeric suffix tried for a colliding operation name
    pub max_name_suffix: u32,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            module_name: "forge.generated".to_string(),
            mode: BuildMode::Release,
            debug_dir: env::temp_dir(),
            file_prefix: "rc".to_string(),
            surrogates: SurrogateMode::Random,
            max_name_suffix: DEFAULT_MAX_NAME_SUFFIX,
        }
    }
}

impl ForgeConfig {
    /// Load configuration from `BRRTR_FORGE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            module_name: var("BRRTR_FORGE_MODULE").unwrap_or(defaults.module_name),
            mode: var("BRRTR_FORGE_MODE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mode),
            debug_dir: var("BRRTR_FORGE_DEBUG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.debug_dir),
            file_prefix: var("BRRTR_FORGE_PREFIX").unwrap_or(defaults.file_prefix),
            surrogates: var("BRRTR_FORGE_SURROGATES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.surrogates),
            max_name_suffix: defaults.max_name_suffix,
        }
    }

    /// Load configuration from a YAML file; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    #[must_use]
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_surrogates(mut self, surrogates: SurrogateMode) -> Self {
        self.surrogates = surrogates;
        self
    }

    #[must_use]
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.module_name, "forge.generated");
        assert_eq!(config.mode, BuildMode::Release);
        assert_eq!(config.file_prefix, "rc");
        assert_eq!(config.surrogates, SurrogateMode::Random);
        assert_eq!(config.max_name_suffix, 65_535);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("BRRTR_FORGE_MODE", "Debug"),
            ("BRRTR_FORGE_MODULE", "app.generated"),
            ("BRRTR_FORGE_PREFIX", "gen"),
            ("BRRTR_FORGE_SURROGATES", "sequential"),
            ("BRRTR_FORGE_DEBUG_DIR", "/tmp/forge"),
        ]
        .into_iter()
        .collect();
        let config = ForgeConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.mode, BuildMode::Debug);
        assert_eq!(config.module_name, "app.generated");
        assert_eq!(config.file_prefix, "gen");
        assert_eq!(config.surrogates, SurrogateMode::Sequential);
        assert_eq!(config.debug_dir, PathBuf::from("/tmp/forge"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ForgeConfig::from_lookup(|k| match k {
            "BRRTR_FORGE_MODE" => Some("fast".to_string()),
            "BRRTR_FORGE_PREFIX" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.mode, BuildMode::Release);
        assert_eq!(config.file_prefix, "rc");
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.yaml");
        fs::write(&path, "module_name: app.generated\nmode: debug\nsurrogates: sequential\n").unwrap();
        let config = ForgeConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.module_name, "app.generated");
        assert_eq!(config.mode, BuildMode::Debug);
        assert_eq!(config.surrogates, SurrogateMode::Sequential);
        assert_eq!(config.file_prefix, "rc");
    }
}
