use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tables::TableConfig;

/// Configuration for a single migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
  /// Table naming for credentials, workflows and executions.
  pub tables: TableConfig,

  /// How many of the most recent unfinished, non-waiting executions to
  /// rewrite. Waiting executions are always included regardless of count.
  pub recent_execution_limit: u32,

  /// Maximum number of record writes in flight at once.
  pub concurrency: usize,

  /// Deadline for the whole run, in seconds.
  pub timeout_secs: u64,

  /// Rewrite in memory and report, but never persist.
  pub dry_run: bool,
}

impl Default for MigrationConfig {
  fn default() -> Self {
    Self {
      tables: TableConfig::default(),
      recent_execution_limit: 200,
      concurrency: 8,
      timeout_secs: 600,
      dry_run: false,
    }
  }
}

impl MigrationConfig {
  /// Load a config from a JSON file. Missing fields take their defaults.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: MigrationConfig = serde_json::from_str(&content)?;
    Ok(config)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  /// Validate table naming and the run limits.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.tables.validate()?;
    self.validate_limits()
  }

  /// Validate the run limits only.
  pub fn validate_limits(&self) -> Result<(), ConfigError> {
    if self.concurrency == 0 {
      return Err(ConfigError::InvalidValue {
        field: "concurrency",
        message: "must be at least 1".to_string(),
      });
    }

    if self.timeout_secs == 0 {
      return Err(ConfigError::InvalidValue {
        field: "timeout_secs",
        message: "must be at least 1".to_string(),
      });
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = MigrationConfig::default();
    assert_eq!(config.recent_execution_limit, 200);
    assert!(!config.dry_run);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_json_fills_defaults() {
    let config: MigrationConfig =
      serde_json::from_str(r#"{ "tables": { "prefix": "n8n_" }, "dry_run": true }"#).unwrap();

    assert_eq!(config.tables.prefix, "n8n_");
    assert_eq!(config.tables.schema, None);
    assert_eq!(config.recent_execution_limit, 200);
    assert_eq!(config.concurrency, 8);
    assert!(config.dry_run);
  }

  #[test]
  fn test_zero_concurrency_rejected() {
    let config = MigrationConfig {
      concurrency: 0,
      ..Default::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::InvalidValue {
        field: "concurrency",
        ..
      })
    ));
  }

  #[test]
  fn test_limits_checked_apart_from_tables() {
    let mut config = MigrationConfig::default();
    config.tables.prefix = "bad-prefix".to_string();

    assert!(config.validate_limits().is_ok());
    assert!(matches!(
      config.validate(),
      Err(ConfigError::InvalidIdentifier { .. })
    ));

    config.timeout_secs = 0;
    assert!(matches!(
      config.validate_limits(),
      Err(ConfigError::InvalidValue {
        field: "timeout_secs",
        ..
      })
    ));
  }

  #[test]
  fn test_from_file_missing() {
    let result = MigrationConfig::from_file("/nonexistent/credref.json");
    assert!(matches!(result, Err(ConfigError::Io(_))));
  }
}
