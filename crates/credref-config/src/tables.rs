use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CREDENTIALS_TABLE: &str = "credentials_entity";
const WORKFLOWS_TABLE: &str = "workflow_entity";
const EXECUTIONS_TABLE: &str = "execution_entity";

/// Table naming for the three record collections.
///
/// Table names cannot be bound as statement parameters, so both parts are
/// restricted to `[A-Za-z0-9_]` and always emitted double-quoted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
  /// Prefix prepended to every table name, e.g. "n8n_".
  pub prefix: String,

  /// Optional schema qualifier, e.g. "automation".
  #[serde(skip_serializing_if = "Option::is_none")]
  pub schema: Option<String>,
}

impl TableConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_identifier("table prefix", &self.prefix, true)?;
    if let Some(schema) = &self.schema {
      check_identifier("schema", schema, false)?;
    }
    Ok(())
  }

  /// Derive the fully qualified, quoted table names.
  pub fn table_names(&self) -> Result<TableNames, ConfigError> {
    self.validate()?;
    Ok(self.names_unchecked())
  }

  fn names_unchecked(&self) -> TableNames {
    TableNames {
      credentials: self.qualify(CREDENTIALS_TABLE),
      workflows: self.qualify(WORKFLOWS_TABLE),
      executions: self.qualify(EXECUTIONS_TABLE),
    }
  }

  fn qualify(&self, table: &str) -> String {
    match &self.schema {
      Some(schema) => format!("\"{}\".\"{}{}\"", schema, self.prefix, table),
      None => format!("\"{}{}\"", self.prefix, table),
    }
  }
}

fn check_identifier(field: &'static str, value: &str, allow_empty: bool) -> Result<(), ConfigError> {
  let valid = (allow_empty || !value.is_empty())
    && value
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_');

  if valid {
    Ok(())
  } else {
    Err(ConfigError::InvalidIdentifier {
      field,
      value: value.to_string(),
    })
  }
}

/// Quoted, schema-qualified table names ready to splice into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
  pub credentials: String,
  pub workflows: String,
  pub executions: String,
}

impl Default for TableNames {
  fn default() -> Self {
    TableConfig::default().names_unchecked()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_names_are_quoted() {
    let names = TableNames::default();
    assert_eq!(names.credentials, "\"credentials_entity\"");
    assert_eq!(names.workflows, "\"workflow_entity\"");
    assert_eq!(names.executions, "\"execution_entity\"");
  }

  #[test]
  fn test_prefix_and_schema() {
    let config = TableConfig {
      prefix: "n8n_".to_string(),
      schema: Some("automation".to_string()),
    };
    let names = config.table_names().unwrap();
    assert_eq!(names.workflows, "\"automation\".\"n8n_workflow_entity\"");
  }

  #[test]
  fn test_rejects_quote_in_prefix() {
    let config = TableConfig {
      prefix: "x\"; DROP TABLE y; --".to_string(),
      schema: None,
    };
    assert!(matches!(
      config.table_names(),
      Err(ConfigError::InvalidIdentifier { field: "table prefix", .. })
    ));
  }

  #[test]
  fn test_rejects_empty_schema() {
    let config = TableConfig {
      prefix: String::new(),
      schema: Some(String::new()),
    };
    assert!(config.validate().is_err());
  }
}
