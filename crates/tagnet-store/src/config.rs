//! Store configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Store configuration.
///
/// All fields have defaults, so a TOML file only needs to name the options
/// it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file path. The containing directory is created if missing.
    pub storage_path: PathBuf,
    /// Advisory per-table row cap. Exceeding it logs a warning; nothing is
    /// enforced or evicted.
    pub max_table_size: Option<u64>,
    /// Default cutoff, in days, for cleanup when the caller gives none.
    pub retention_days: u32,
    /// When false, writes to an unknown tag fail instead of creating a table.
    pub auto_create_tables: bool,
    /// Toggles debug-level diagnostics only; no behavioral effect.
    pub logging_enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_path: crate::default_db_path(),
            max_table_size: None,
            retention_days: 30,
            auto_create_tables: true,
            logging_enabled: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.storage_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage_path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        if self.max_table_size == Some(0) {
            errors.push(ValidationError {
                field: "max_table_size".to_string(),
                message: "advisory table size cannot be 0 (use null/omit instead)".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The configuration field that failed validation.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StoreConfig::default();
        config.validate().unwrap();
        assert!(config.auto_create_tables);
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn test_empty_path_fails_validation() {
        let config = StoreConfig {
            storage_path: PathBuf::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage_path"));
    }

    #[test]
    fn test_zero_max_table_size_fails_validation() {
        let config = StoreConfig {
            max_table_size: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");

        let config = StoreConfig {
            retention_days: 7,
            auto_create_tables: false,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = StoreConfig::load_validated(&path).unwrap();
        assert_eq!(loaded.retention_days, 7);
        assert!(!loaded.auto_create_tables);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: StoreConfig = toml::from_str("retention_days = 14").unwrap();
        assert_eq!(config.retention_days, 14);
        assert!(config.auto_create_tables);
    }
}
