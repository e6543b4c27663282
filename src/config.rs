//! Loader Configuration
//!
//! Handles parsing of bindload.toml configuration files.
//!
//! ```toml
//! [resolve]
//! extension = "node"
//! modules_dir = "node_modules"
//! package_dirs = true
//! generic_fallback = true
//! fallback_filename = "binding.node"
//!
//! [platform]
//! libc = "musl"
//!
//! [load]
//! entry_symbol = "napi_register_module_v1"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::platform::{Libc, PlatformError};

/// Configuration file name searched for by [`LoaderConfig::find_and_load`].
pub const CONFIG_FILE: &str = "bindload.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config value: {0}")]
    Invalid(#[from] PlatformError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching bindload.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Candidate generation
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Platform key overrides
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Load-time checks
    #[serde(default)]
    pub load: LoadConfig,
}

impl LoaderConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that would only fail later at resolve time.
    pub fn validate(&self) -> ConfigResult<()> {
        self.platform.libc_override()?;
        Ok(())
    }
}

/// Candidate generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveConfig {
    /// File extension of binding binaries
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Directory holding per-platform packages
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// Probe `<modules_dir>/<package>-<platform>/` after each local name
    #[serde(default = "default_true")]
    pub package_dirs: bool,

    /// Probe a platform-less file last
    #[serde(default = "default_true")]
    pub generic_fallback: bool,

    /// Name of the platform-less file (default `<binding>.<extension>`)
    #[serde(default)]
    pub fallback_filename: Option<String>,
}

fn default_extension() -> String {
    "node".to_string()
}

fn default_modules_dir() -> String {
    "node_modules".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            modules_dir: default_modules_dir(),
            package_dirs: true,
            generic_fallback: true,
            fallback_filename: None,
        }
    }
}

/// Platform key overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Force a libc variant (`gnu`, `musl`, ... or `none`)
    #[serde(default)]
    pub libc: Option<String>,
}

impl PlatformConfig {
    /// `None` when no override is set, `Some(None)` for an explicit `none`.
    pub fn libc_override(&self) -> Result<Option<Option<Libc>>, PlatformError> {
        match self.libc.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some("none") => Ok(Some(None)),
            Some(value) => Ok(Some(Some(value.parse()?))),
        }
    }
}

/// Load-time checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadConfig {
    /// Symbol every candidate must export to count as loaded
    #[serde(default)]
    pub entry_symbol: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.resolve.extension, "node");
        assert_eq!(config.resolve.modules_dir, "node_modules");
        assert!(config.resolve.package_dirs);
        assert!(config.resolve.generic_fallback);
        assert!(config.load.entry_symbol.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[resolve]
extension = "so"
package_dirs = false
fallback_filename = "any.so"

[platform]
libc = "musl"

[load]
entry_symbol = "napi_register_module_v1"
"#;
        let config: LoaderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.resolve.extension, "so");
        assert_eq!(config.resolve.modules_dir, "node_modules");
        assert!(!config.resolve.package_dirs);
        assert_eq!(config.resolve.fallback_filename.as_deref(), Some("any.so"));
        assert_eq!(
            config.load.entry_symbol.as_deref(),
            Some("napi_register_module_v1")
        );

        assert_eq!(
            config.platform.libc_override().unwrap(),
            Some(Some(Libc::Musl))
        );
    }

    #[test]
    fn test_libc_none_override() {
        let mut config = LoaderConfig::default();
        config.platform.libc = Some("none".to_string());
        assert_eq!(config.platform.libc_override().unwrap(), Some(None));
    }

    #[test]
    fn test_invalid_libc_rejected() {
        let mut config = LoaderConfig::default();
        config.platform.libc = Some("bionic".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let mut config = LoaderConfig::default();
        config.resolve.extension = "dylib".to_string();
        config.save(&dir.path().join(CONFIG_FILE)).unwrap();

        let found = LoaderConfig::find_and_load(&nested).unwrap();
        assert_eq!(found, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LoaderConfig::load(Path::new("/no/such/bindload.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
