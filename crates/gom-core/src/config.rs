//! Runtime configuration.
//!
//! # Example
//!
//! ```
//! use gom_core::GomConfig;
//!
//! let config = GomConfig::from_toml_str(r#"
//! log_commands = true
//! history_limit = 100
//!
//! [environment]
//! data_dir = "/tmp/gom"
//! "#).unwrap();
//! assert_eq!(config.history_limit, Some(100));
//! assert_eq!(config.environment["data_dir"], "/tmp/gom");
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::logging::targets;

/// Settings of a [`GomContext`](crate::GomContext) and its interpreters.
///
/// Every field is optional in the TOML source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GomConfig {
    /// Initial floating-point trap policy of the thread creating the context.
    pub trap_fpe: bool,
    /// Log every executed script command at debug level.
    pub log_commands: bool,
    /// Maximum number of commands kept in each interpreter's history.
    pub history_limit: Option<usize>,
    /// Scripts run by [`GomContext::run_startup`](crate::GomContext::run_startup),
    /// each with the interpreter registered for its extension.
    pub startup_scripts: Vec<PathBuf>,
    /// Initial environment values of every interpreter.
    pub environment: BTreeMap<String, String>,
}

impl GomConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read a configuration file.
    ///
    /// Relative startup script paths are resolved against the directory of
    /// the configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&source)?;
        if let Some(dir) = path.parent() {
            for script in &mut config.startup_scripts {
                if script.is_relative() {
                    *script = dir.join(&*script);
                }
            }
        }
        tracing::debug!(target: targets::META, path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_is_default() {
        assert_eq!(GomConfig::from_toml_str("").unwrap(), GomConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = GomConfig::from_toml_str("trap_fpe = true\nverbose = 3\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_resolves_startup_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gom.toml");
        std::fs::write(
            &path,
            "trap_fpe = true\nstartup_scripts = [\"init.lua\", \"/abs/boot.rhai\"]\n",
        )
        .unwrap();
        let config = GomConfig::load(&path).unwrap();
        assert!(config.trap_fpe);
        assert_eq!(config.startup_scripts[0], dir.path().join("init.lua"));
        assert_eq!(config.startup_scripts[1], PathBuf::from("/abs/boot.rhai"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = GomConfig::load("/nonexistent/gom.toml");
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }
}
