use credref_config::ConfigError;

/// Errors that stop a run before it can attempt its records.
///
/// Failures writing individual records are not errors; they are collected
/// into the [`crate::MigrationReport`].
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
  /// The configuration was rejected.
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),

  /// Loading the catalog or a record set failed.
  #[error("failed to load {what}: {source}")]
  Load {
    what: &'static str,
    #[source]
    source: credref_store::Error,
  },
}
