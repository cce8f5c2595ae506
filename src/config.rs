//! Run manifest loading (TOML), in the teacher's `from_file`-via-`serde`
//! style. The HDL lexer/parser is an external collaborator (§1): this
//! config names which AST items the CLI should feed to [`crate::program`]
//! and how to run them, it does not itself parse HDL source text.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CascadeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Name of the module to instantiate as the simulation root.
    pub top: String,
    /// Back-end march (§6) to apply at startup; `None` runs unmarched.
    #[serde(default)]
    pub march: Option<String>,
    /// Include search path for `$fopen`-style file lookups performed by
    /// the (external) stream plumbing.
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    /// Tick budget; `None` runs until `$finish` or EOF.
    #[serde(default)]
    pub max_ticks: Option<u64>,
    /// Restore a prior save file (§6) before the first tick.
    #[serde(default)]
    pub restore_file: Option<PathBuf>,
    /// Write a save file (§6) on a clean `$finish`.
    #[serde(default)]
    pub save_file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CascadeConfig {
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CascadeConfig =
            toml::from_str(&content).map_err(|e| CascadeError::Config(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_manifest_fills_in_defaults() {
        let cfg: CascadeConfig = toml::from_str("top = \"counter\"").unwrap();
        assert_eq!(cfg.top, "counter");
        assert!(cfg.march.is_none());
        assert_eq!(cfg.log_level, "info");
    }
}
