use serde::{Deserialize, Serialize};

/// A stored credential as seen by the migration: identity, display name and
/// credential type key (e.g. "httpBasicAuth").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
  /// Opaque identifier, rendered as a string whatever the column type.
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub credential_type: String,
}

impl CredentialDescriptor {
  pub fn new(
    id: impl Into<String>,
    name: impl Into<String>,
    credential_type: impl Into<String>,
  ) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      credential_type: credential_type.into(),
    }
  }
}
