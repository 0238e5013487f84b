use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid {field} '{value}': only ASCII letters, digits and '_' are allowed")]
  InvalidIdentifier { field: &'static str, value: String },

  #[error("invalid value for {field}: {message}")]
  InvalidValue {
    field: &'static str,
    message: String,
  },

  #[error("failed to read config file: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse config file: {0}")]
  Parse(#[from] serde_json::Error),
}
