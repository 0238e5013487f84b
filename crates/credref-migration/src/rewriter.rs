use credref_model::GraphRecord;
use tracing::warn;

use crate::catalog::CredentialCatalog;
use crate::resolver::{Direction, resolve};
use crate::scanner::for_each_reference;

/// What rewriting one record did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
  /// At least one reference changed shape; the record must be persisted.
  pub changed: bool,
  /// Number of references that changed shape.
  pub rewritten: usize,
  /// Number of references left untouched because they could not be parsed.
  pub malformed: usize,
}

/// Applies the resolver to every reference of a record, in place.
pub struct RecordRewriter<'a> {
  catalog: &'a CredentialCatalog,
  direction: Direction,
}

impl<'a> RecordRewriter<'a> {
  pub fn new(catalog: &'a CredentialCatalog, direction: Direction) -> Self {
    Self { catalog, direction }
  }

  pub fn direction(&self) -> Direction {
    self.direction
  }

  pub fn apply_to_record<R>(&self, record: &mut R) -> RewriteOutcome
  where
    R: GraphRecord + ?Sized,
  {
    let kind = record.kind();
    let record_id = record.id().to_string();
    let mut outcome = RewriteOutcome::default();

    for_each_reference(record.nodes_mut(), |credential_type, parsed| match parsed {
      Ok(reference) => {
        let resolution = resolve(self.direction, &reference, credential_type, self.catalog);
        if resolution.changed {
          outcome.rewritten += 1;
          Some(resolution.reference)
        } else {
          None
        }
      }
      Err(e) => {
        warn!(
          record_kind = %kind,
          record_id = %record_id,
          credential_type = %credential_type,
          error = %e,
          "skipping malformed credential reference"
        );
        outcome.malformed += 1;
        None
      }
    });

    outcome.changed = outcome.rewritten > 0;
    outcome
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use credref_model::{CredentialDescriptor, NodeSpec, WorkflowRecord};
  use serde_json::json;

  fn catalog() -> CredentialCatalog {
    CredentialCatalog::new(vec![CredentialDescriptor::new("7", "MyApi", "httpApi")])
  }

  fn workflow(nodes: Vec<serde_json::Value>) -> WorkflowRecord {
    WorkflowRecord::new("1", nodes.into_iter().map(NodeSpec::new).collect())
  }

  #[test]
  fn test_up_rewrites_in_place() {
    let catalog = catalog();
    let mut record = workflow(vec![json!({
      "name": "Fetch",
      "credentials": { "httpApi": "MyApi" }
    })]);

    let outcome = RecordRewriter::new(&catalog, Direction::Up).apply_to_record(&mut record);

    assert!(outcome.changed);
    assert_eq!(outcome.rewritten, 1);
    assert_eq!(
      record.nodes[0].as_value()["credentials"],
      json!({ "httpApi": { "id": "7", "name": "MyApi" } })
    );
  }

  #[test]
  fn test_no_credentials_is_clean() {
    let catalog = catalog();
    let mut record = workflow(vec![json!({ "name": "Start" }), json!({ "name": "Set" })]);
    let before = record.clone();

    for direction in [Direction::Up, Direction::Down] {
      let outcome = RecordRewriter::new(&catalog, direction).apply_to_record(&mut record);
      assert!(!outcome.changed);
    }
    assert_eq!(record, before);
  }

  #[test]
  fn test_mixed_references_mark_dirty() {
    let catalog = catalog();
    let mut record = workflow(vec![
      json!({ "credentials": { "httpApi": { "id": "7", "name": "MyApi" } } }),
      json!({ "credentials": { "slackApi": "Chat" } }),
    ]);

    let outcome = RecordRewriter::new(&catalog, Direction::Up).apply_to_record(&mut record);

    assert!(outcome.changed);
    assert_eq!(outcome.rewritten, 1);
    assert_eq!(
      record.nodes[1].as_value()["credentials"]["slackApi"],
      json!({ "id": null, "name": "Chat" })
    );
  }

  #[test]
  fn test_up_twice_is_idempotent() {
    let catalog = catalog();
    let mut record = workflow(vec![json!({ "credentials": { "httpApi": "MyApi" } })]);
    let rewriter = RecordRewriter::new(&catalog, Direction::Up);

    assert!(rewriter.apply_to_record(&mut record).changed);
    let after_first = record.clone();
    assert!(!rewriter.apply_to_record(&mut record).changed);
    assert_eq!(record, after_first);
  }

  #[test]
  fn test_down_after_up_restores() {
    let catalog = catalog();
    let original = workflow(vec![json!({
      "name": "Fetch",
      "credentials": { "httpApi": "MyApi", "slackApi": "Unknown" }
    })]);
    let mut record = original.clone();

    RecordRewriter::new(&catalog, Direction::Up).apply_to_record(&mut record);
    RecordRewriter::new(&catalog, Direction::Down).apply_to_record(&mut record);

    assert_eq!(record, original);
  }

  #[test]
  fn test_malformed_only_is_not_dirty() {
    let catalog = catalog();
    let mut record = workflow(vec![json!({ "credentials": { "httpApi": null, "slackApi": 3 } })]);
    let before = record.clone();

    let outcome = RecordRewriter::new(&catalog, Direction::Down).apply_to_record(&mut record);

    assert_eq!(
      outcome,
      RewriteOutcome {
        changed: false,
        rewritten: 0,
        malformed: 2,
      }
    );
    assert_eq!(record, before);
  }
}
