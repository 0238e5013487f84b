use std::collections::HashMap;

use credref_model::CredentialDescriptor;
use credref_store::{Error, Store};

/// Read-only snapshot of every credential descriptor, indexed for the two
/// lookups the resolver needs.
///
/// When several descriptors share a key, the one that came first in load
/// order wins.
#[derive(Debug, Clone, Default)]
pub struct CredentialCatalog {
  descriptors: Vec<CredentialDescriptor>,
  by_name: HashMap<(String, String), usize>,
  by_id: HashMap<(String, String), usize>,
}

impl CredentialCatalog {
  pub fn new(descriptors: Vec<CredentialDescriptor>) -> Self {
    let mut by_name = HashMap::new();
    let mut by_id = HashMap::new();

    for (index, descriptor) in descriptors.iter().enumerate() {
      by_name
        .entry((descriptor.name.clone(), descriptor.credential_type.clone()))
        .or_insert(index);
      by_id
        .entry((descriptor.id.clone(), descriptor.credential_type.clone()))
        .or_insert(index);
    }

    Self {
      descriptors,
      by_name,
      by_id,
    }
  }

  /// Load a fresh snapshot from the store.
  pub async fn load(store: &dyn Store) -> Result<Self, Error> {
    let descriptors = store.list_credentials().await?;
    Ok(Self::new(descriptors))
  }

  pub fn find_by_name_and_type(
    &self,
    name: &str,
    credential_type: &str,
  ) -> Option<&CredentialDescriptor> {
    self
      .by_name
      .get(&(name.to_string(), credential_type.to_string()))
      .map(|&index| &self.descriptors[index])
  }

  pub fn find_by_id_and_type(
    &self,
    id: &str,
    credential_type: &str,
  ) -> Option<&CredentialDescriptor> {
    self
      .by_id
      .get(&(id.to_string(), credential_type.to_string()))
      .map(|&index| &self.descriptors[index])
  }

  /// All descriptors in load order.
  pub fn descriptors(&self) -> &[CredentialDescriptor] {
    &self.descriptors
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn catalog() -> CredentialCatalog {
    CredentialCatalog::new(vec![
      CredentialDescriptor::new("7", "MyApi", "httpApi"),
      CredentialDescriptor::new("8", "MyApi", "slackApi"),
      CredentialDescriptor::new("9", "MyApi", "httpApi"),
    ])
  }

  #[test]
  fn test_find_by_name_matches_type() {
    let catalog = catalog();
    assert_eq!(
      catalog.find_by_name_and_type("MyApi", "slackApi").map(|d| d.id.as_str()),
      Some("8")
    );
    assert!(catalog.find_by_name_and_type("MyApi", "githubApi").is_none());
    assert!(catalog.find_by_name_and_type("Other", "httpApi").is_none());
  }

  #[test]
  fn test_duplicate_name_first_wins() {
    let catalog = catalog();
    assert_eq!(
      catalog.find_by_name_and_type("MyApi", "httpApi").map(|d| d.id.as_str()),
      Some("7")
    );
  }

  #[test]
  fn test_find_by_id_matches_type() {
    let catalog = catalog();
    assert_eq!(
      catalog.find_by_id_and_type("9", "httpApi").map(|d| d.name.as_str()),
      Some("MyApi")
    );
    assert!(catalog.find_by_id_and_type("9", "slackApi").is_none());
  }

  #[test]
  fn test_empty_catalog() {
    let catalog = CredentialCatalog::default();
    assert!(catalog.is_empty());
    assert!(catalog.find_by_id_and_type("1", "httpApi").is_none());
  }
}
