//! Credential reference shapes.
//!
//! In stored JSON the two shapes are told apart structurally:
//!
//! ```json
//! { "httpApi": "MyApi" }                          // legacy
//! { "httpApi": { "id": "7", "name": "MyApi" } }   // structured
//! { "httpApi": { "id": null, "name": "Gone" } }   // structured, unresolved
//! ```
//!
//! [`CredentialReference::parse`] decides the shape once; everything past
//! that point matches on the enum.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A reference from a node to a credential of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialReference {
  /// Reference by credential name only.
  Legacy(String),

  /// Reference by id, with the last known name carried alongside.
  Structured {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    name: String,
  },
}

/// A reference value that is neither a name string nor a `{id, name}` object.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed credential reference {value}: {reason}")]
pub struct MalformedReference {
  pub value: Value,
  pub reason: String,
}

impl CredentialReference {
  pub fn legacy(name: impl Into<String>) -> Self {
    Self::Legacy(name.into())
  }

  pub fn structured(id: Option<String>, name: impl Into<String>) -> Self {
    Self::Structured {
      id,
      name: name.into(),
    }
  }

  /// Decide the shape of a raw reference value.
  pub fn parse(value: &Value) -> Result<Self, MalformedReference> {
    match value {
      Value::String(_) | Value::Object(_) => {
        Self::deserialize(value).map_err(|e| MalformedReference {
          value: value.clone(),
          reason: e.to_string(),
        })
      }
      other => Err(MalformedReference {
        value: other.clone(),
        reason: "expected a string or an object".to_string(),
      }),
    }
  }

  pub fn to_value(&self) -> Value {
    match self {
      Self::Legacy(name) => Value::String(name.clone()),
      Self::Structured { id, name } => serde_json::json!({
        "id": id,
        "name": name,
      }),
    }
  }

  /// The name carried by either shape.
  pub fn name(&self) -> &str {
    match self {
      Self::Legacy(name) => name,
      Self::Structured { name, .. } => name,
    }
  }

  pub fn is_legacy(&self) -> bool {
    matches!(self, Self::Legacy(_))
  }
}

/// Accept string, integer or null ids. Stores that key credentials by
/// integer have been seen to leave numeric ids in payloads.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(id)) => Ok(Some(id)),
    Some(Value::Number(id)) => Ok(Some(id.to_string())),
    Some(other) => Err(serde::de::Error::custom(format!(
      "credential id must be a string, number or null, got {}",
      other
    ))),
  }
}
