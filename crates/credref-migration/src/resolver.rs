//! Converts a single credential reference between its two shapes.

use std::fmt;

use credref_model::CredentialReference;
use serde::{Deserialize, Serialize};

use crate::catalog::CredentialCatalog;

/// Which way a run rewrites references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  /// Name-only references become `{id, name}`.
  Up,
  /// `{id, name}` references become name-only.
  Down,
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Direction::Up => f.write_str("up"),
      Direction::Down => f.write_str("down"),
    }
  }
}

/// The outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
  pub reference: CredentialReference,
  pub changed: bool,
}

impl Resolution {
  fn unchanged(reference: &CredentialReference) -> Self {
    Self {
      reference: reference.clone(),
      changed: false,
    }
  }

  fn changed(reference: CredentialReference) -> Self {
    Self {
      reference,
      changed: true,
    }
  }
}

/// Resolve `reference` of type `credential_type` in the given direction.
///
/// References already in the target shape come back unchanged, which makes
/// repeated runs in the same direction no-ops. A catalog miss is not an
/// error: `Up` leaves the id empty and `Down` falls back to the name the
/// reference already carries.
pub fn resolve(
  direction: Direction,
  reference: &CredentialReference,
  credential_type: &str,
  catalog: &CredentialCatalog,
) -> Resolution {
  match (direction, reference) {
    (Direction::Up, CredentialReference::Legacy(name)) => {
      let id = catalog
        .find_by_name_and_type(name, credential_type)
        .map(|descriptor| descriptor.id.clone());
      Resolution::changed(CredentialReference::structured(id, name.clone()))
    }
    (Direction::Down, CredentialReference::Structured { id, name }) => {
      let name = id
        .as_deref()
        .and_then(|id| catalog.find_by_id_and_type(id, credential_type))
        .map(|descriptor| descriptor.name.clone())
        .unwrap_or_else(|| name.clone());
      Resolution::changed(CredentialReference::legacy(name))
    }
    (Direction::Up, CredentialReference::Structured { .. })
    | (Direction::Down, CredentialReference::Legacy(_)) => Resolution::unchanged(reference),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use credref_model::CredentialDescriptor;

  fn catalog() -> CredentialCatalog {
    CredentialCatalog::new(vec![
      CredentialDescriptor::new("7", "MyApi", "httpApi"),
      CredentialDescriptor::new("8", "Renamed", "slackApi"),
    ])
  }

  #[test]
  fn test_up_resolves_id() {
    let resolution = resolve(
      Direction::Up,
      &CredentialReference::legacy("MyApi"),
      "httpApi",
      &catalog(),
    );
    assert!(resolution.changed);
    assert_eq!(
      resolution.reference,
      CredentialReference::structured(Some("7".to_string()), "MyApi")
    );
  }

  #[test]
  fn test_up_miss_keeps_name_without_id() {
    let resolution = resolve(
      Direction::Up,
      &CredentialReference::legacy("Unknown"),
      "httpApi",
      &catalog(),
    );
    assert!(resolution.changed);
    assert_eq!(
      resolution.reference,
      CredentialReference::structured(None, "Unknown")
    );
  }

  #[test]
  fn test_up_type_must_match() {
    let resolution = resolve(
      Direction::Up,
      &CredentialReference::legacy("MyApi"),
      "slackApi",
      &catalog(),
    );
    assert_eq!(resolution.reference, CredentialReference::structured(None, "MyApi"));
  }

  #[test]
  fn test_up_structured_is_noop() {
    let reference = CredentialReference::structured(Some("7".to_string()), "MyApi");
    let resolution = resolve(Direction::Up, &reference, "httpApi", &catalog());
    assert!(!resolution.changed);
    assert_eq!(resolution.reference, reference);
  }

  #[test]
  fn test_down_uses_catalog_name() {
    let reference = CredentialReference::structured(Some("8".to_string()), "Old Name");
    let resolution = resolve(Direction::Down, &reference, "slackApi", &catalog());
    assert!(resolution.changed);
    assert_eq!(resolution.reference, CredentialReference::legacy("Renamed"));
  }

  #[test]
  fn test_down_miss_falls_back_to_carried_name() {
    let reference = CredentialReference::structured(Some("99".to_string()), "Stale");
    let resolution = resolve(Direction::Down, &reference, "httpApi", &catalog());
    assert!(resolution.changed);
    assert_eq!(resolution.reference, CredentialReference::legacy("Stale"));
  }

  #[test]
  fn test_down_without_id_falls_back_to_carried_name() {
    let reference = CredentialReference::structured(None, "Unknown");
    let resolution = resolve(Direction::Down, &reference, "httpApi", &catalog());
    assert_eq!(resolution.reference, CredentialReference::legacy("Unknown"));
  }

  #[test]
  fn test_down_legacy_is_noop() {
    let reference = CredentialReference::legacy("MyApi");
    let resolution = resolve(Direction::Down, &reference, "httpApi", &catalog());
    assert!(!resolution.changed);
    assert_eq!(resolution.reference, reference);
  }
}
