//! Binding configuration
//!
//! Controls where native libraries are searched for and whether loaded handles are shared
//! between bindings. The defaults reproduce the plain loader behaviour: candidate names are
//! handed to the platform loader as-is and every binding loads its library independently.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding extra search directories, separated like `PATH`.
pub const LIBRARY_PATH_VAR: &str = "SHIMFORGE_LIBRARY_PATH";
/// Environment variable enabling the shared handle cache (`1`/`true`).
pub const CACHE_HANDLES_VAR: &str = "SHIMFORGE_CACHE_HANDLES";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BindingConfig {
    /// Directories probed, in order, before the bare candidate names
    pub search_paths: Vec<PathBuf>,

    /// Reuse one handle per (library, version) across bindings
    pub cache_handles: bool,
}

impl BindingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let search_paths = std::env::var_os(LIBRARY_PATH_VAR)
            .map(|raw| {
                std::env::split_paths(&raw)
                    .filter(|path| !path.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cache_handles = std::env::var(CACHE_HANDLES_VAR)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        Self {
            search_paths,
            cache_handles,
        }
    }

    /// Load configuration from TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BindingConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(_path: &Path) -> anyhow::Result<Self> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Save configuration to TOML file
    #[cfg(feature = "toml-config")]
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Save configuration to TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn save_to_file(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Merge with environment variables (env vars take precedence)
    pub fn merge_with_env(mut self) -> Self {
        let env_config = Self::from_env();

        if std::env::var_os(LIBRARY_PATH_VAR).is_some() {
            self.search_paths = env_config.search_paths;
        }
        if std::env::var_os(CACHE_HANDLES_VAR).is_some() {
            self.cache_handles = env_config.cache_handles;
        }

        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_cache_handles(mut self, enabled: bool) -> Self {
        self.cache_handles = enabled;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_side_channels() {
        let config = BindingConfig::default();
        assert!(config.search_paths.is_empty());
        assert!(!config.cache_handles);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("on"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }

    #[test]
    fn test_builder() {
        let config = BindingConfig::new()
            .with_search_path("/opt/lib")
            .with_search_path("/usr/local/lib")
            .with_cache_handles(true);
        assert_eq!(
            config.search_paths,
            vec![PathBuf::from("/opt/lib"), PathBuf::from("/usr/local/lib")]
        );
        assert!(config.cache_handles);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shimforge.toml");
        let config = BindingConfig::new()
            .with_search_path("/opt/native")
            .with_cache_handles(true);
        config.save_to_file(&path).unwrap();
        assert_eq!(BindingConfig::from_file(&path).unwrap(), config);
    }

    #[cfg(not(feature = "toml-config"))]
    #[test]
    fn test_toml_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shimforge.toml");
        assert!(BindingConfig::from_file(&path).is_err());
        assert!(BindingConfig::default().save_to_file(&path).is_err());
    }
}
