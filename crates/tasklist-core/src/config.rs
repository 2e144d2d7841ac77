use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;

/// Environment variable overriding the database path.
pub const DB_ENV_VAR: &str = "TASKLIST_DB";

/// Project-relative directory holding config and the default database.
pub const PROJECT_DIR: &str = ".tasklist";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Nesting deeper than this is logged and reported, never rejected.
    #[serde(default = "default_recommended_max_depth")]
    pub recommended_max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            recommended_max_depth: default_recommended_max_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// A config file exists but could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// `E1002` for syntax and schema errors; read failures carry no code.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Read { .. } => None,
            Self::Parse { .. } => Some(ErrorCode::ConfigParseError),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path.as_path(),
        }
    }
}

/// Load `.tasklist/config.toml` under `project_root`, falling back to the
/// user config and then to defaults.
///
/// # Errors
///
/// [`ConfigError`] if the first config file found cannot be read or parsed.
/// A missing file is not an error.
pub fn load_config(project_root: &Path) -> Result<EngineConfig, ConfigError> {
    let project_path = project_root.join(PROJECT_DIR).join("config.toml");
    if project_path.exists() {
        return load_config_file(&project_path);
    }

    match user_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => Ok(EngineConfig::default()),
    }
}

/// Parse one TOML config file. Absent sections and keys take defaults.
///
/// # Errors
///
/// [`ConfigError::Read`] if the file cannot be read,
/// [`ConfigError::Parse`] for invalid TOML or wrongly typed values.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<EngineConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tasklist/config.toml"))
}

/// Resolve the database path.
///
/// Precedence: explicit flag, `TASKLIST_DB`, `[storage] path` (relative paths
/// resolve against `project_root`), then `.tasklist/tasklist.db`.
#[must_use]
pub fn resolve_db_path(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    config: &EngineConfig,
    project_root: &Path,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(value) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
        return PathBuf::from(value);
    }
    if let Some(path) = &config.storage.path {
        if path.is_absolute() {
            return path.clone();
        }
        return project_root.join(path);
    }
    project_root.join(PROJECT_DIR).join("tasklist.db")
}

const fn default_recommended_max_depth() -> usize {
    3
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let config: EngineConfig = toml::from_str("").expect("parse empty");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.hierarchy.recommended_max_depth, 3);
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
    }

    #[test]
    fn project_file_is_loaded() {
        let dir = TempDir::new().expect("tempdir");
        let cfg_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&cfg_dir).expect("mkdir");
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[hierarchy]\nrecommended_max_depth = 5\n\n[storage]\npath = \"data/tl.db\"\n",
        )
        .expect("write config");

        let config = load_config(dir.path()).expect("load");
        assert_eq!(config.hierarchy.recommended_max_depth, 5);
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
        assert_eq!(
            resolve_db_path(None, None, &config, dir.path()),
            dir.path().join("data/tl.db")
        );
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[hierarchy\n").expect("write");
        let err = load_config_file(&path).expect_err("should fail");
        assert!(err.to_string().contains("Failed to parse"));
        assert_eq!(err.path(), path.as_path());
        assert_eq!(err.code(), Some(ErrorCode::ConfigParseError));
    }

    #[test]
    fn wrongly_typed_value_is_a_parse_error() {
        let dir = TempDir::new().expect("tempdir");
        let cfg_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&cfg_dir).expect("mkdir");
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[hierarchy]\nrecommended_max_depth = \"deep\"\n",
        )
        .expect("write config");

        let err = load_config(dir.path()).expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = TempDir::new().expect("tempdir");
        // A directory cannot be read as a file.
        let err = load_config_file(dir.path()).expect_err("should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn db_path_precedence() {
        let root = Path::new("/work");
        let config = EngineConfig::default();

        assert_eq!(
            resolve_db_path(Some(Path::new("/x.db")), Some("/env.db"), &config, root),
            PathBuf::from("/x.db")
        );
        assert_eq!(
            resolve_db_path(None, Some("/env.db"), &config, root),
            PathBuf::from("/env.db")
        );
        assert_eq!(
            resolve_db_path(None, Some("  "), &config, root),
            PathBuf::from("/work/.tasklist/tasklist.db")
        );
    }
}
