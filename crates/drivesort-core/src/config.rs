/// User configuration, read from `config.toml` in the platform config
/// directory (`~/.config/drivesort/config.toml` on Linux).
///
/// Every field has a default, so a missing file or a partial file is fine.
///
/// ```toml
/// tool_path = "/usr/local/sbin/fatsort"
/// elevation = "pkexec"
/// watch_interval_ms = 500
/// default_order = "files-first"
/// ```
use crate::error::ConfigError;
use crate::model::SortOrder;
use crate::privilege::ElevationPreference;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The external sorting tool. A bare name is looked up on `PATH`.
    pub tool_path: PathBuf,
    pub elevation: ElevationPreference,
    pub udisksctl_path: PathBuf,
    /// How often the watcher re-enumerates volumes.
    pub watch_interval_ms: u64,
    pub default_order: SortOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from("fatsort"),
            elevation: ElevationPreference::Auto,
            udisksctl_path: PathBuf::from("udisksctl"),
            watch_interval_ms: 1_000,
            default_order: SortOrder::DirectoriesFirst,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("", "", "drivesort")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Absolute path of the tool, resolving bare names through `PATH`.
    pub fn resolve_tool(&self) -> Result<PathBuf, ConfigError> {
        if self.tool_path.components().count() > 1 {
            return Ok(self.tool_path.clone());
        }
        which::which(&self.tool_path)
            .map_err(|_| ConfigError::ToolNotFound(self.tool_path.display().to_string()))
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "elevation = \"sudo\"\ndefault_order = \"mixed\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.elevation, ElevationPreference::Sudo);
        assert_eq!(config.default_order, SortOrder::Mixed);
        assert_eq!(config.tool_path, PathBuf::from("fatsort"));
        assert_eq!(config.watch_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "elevation = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_explicit_tool_path_is_not_searched() {
        let config = Config {
            tool_path: PathBuf::from("/opt/fatsort/bin/fatsort"),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_tool().unwrap(),
            PathBuf::from("/opt/fatsort/bin/fatsort")
        );
    }
}
