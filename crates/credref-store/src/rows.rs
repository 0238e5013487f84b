//! Raw row shapes and their conversion into model records.
//!
//! Payload columns are fetched as text and parsed here, per row, so one
//! corrupt payload surfaces as an [`UnreadableRecord`] instead of failing
//! the whole query.

use chrono::{DateTime, Utc};
use credref_model::{
  CredentialDescriptor, ExecutionRecord, RecordKind, WorkflowData, WorkflowRecord,
};
use serde_json::Value;
use sqlx::FromRow;
use tracing::warn;

use crate::UnreadableRecord;

#[derive(Debug, FromRow)]
pub(crate) struct CredentialRow {
  pub id: String,
  pub name: String,
  #[sqlx(rename = "type")]
  pub credential_type: String,
}

impl From<CredentialRow> for CredentialDescriptor {
  fn from(row: CredentialRow) -> Self {
    CredentialDescriptor {
      id: row.id,
      name: row.name,
      credential_type: row.credential_type,
    }
  }
}

#[derive(Debug, FromRow)]
pub(crate) struct WorkflowRow {
  pub id: String,
  pub nodes: Option<String>,
}

impl WorkflowRow {
  pub fn into_record(self) -> Result<WorkflowRecord, UnreadableRecord> {
    let nodes = parse_payload(RecordKind::Workflow, &self.id, self.nodes.as_deref())?;
    if !nodes.is_array() {
      warn!(record_kind = "workflow", record_id = %self.id, "node list is not an array");
    }
    Ok(WorkflowRecord::from_payload(self.id, nodes))
  }
}

#[derive(Debug, FromRow)]
pub(crate) struct ExecutionRow {
  pub id: String,
  pub workflow_data: Option<String>,
  pub started_at: DateTime<Utc>,
  pub wait_till: Option<DateTime<Utc>>,
  pub finished: bool,
  pub mode: String,
}

impl ExecutionRow {
  pub fn into_record(self) -> Result<ExecutionRecord, UnreadableRecord> {
    let raw = parse_payload(RecordKind::Execution, &self.id, self.workflow_data.as_deref())?;
    let workflow_data = WorkflowData::from_payload(raw).unwrap_or_else(|| {
      warn!(record_kind = "execution", record_id = %self.id, "workflow data is not an object");
      WorkflowData::default()
    });

    Ok(ExecutionRecord {
      id: self.id,
      workflow_data,
      started_at: self.started_at,
      wait_till: self.wait_till,
      finished: self.finished,
      mode: self.mode,
    })
  }
}

/// Parse a JSON payload column. SQL `NULL` reads as JSON `null`.
fn parse_payload(
  kind: RecordKind,
  id: &str,
  text: Option<&str>,
) -> Result<Value, UnreadableRecord> {
  let Some(text) = text else {
    return Ok(Value::Null);
  };

  serde_json::from_str(text).map_err(|e| UnreadableRecord {
    kind,
    id: id.to_string(),
    reason: format!("payload is not valid json: {}", e),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncated_workflow_payload_is_unreadable() {
    let row = WorkflowRow {
      id: "2".to_string(),
      nodes: Some(r#"[{"credentials": {"httpApi": "MyApi"}"#.to_string()),
    };

    let unreadable = row.into_record().unwrap_err();
    assert_eq!(unreadable.kind, RecordKind::Workflow);
    assert_eq!(unreadable.id, "2");
    assert!(unreadable.reason.contains("not valid json"));
  }

  #[test]
  fn test_null_workflow_payload_is_empty() {
    let row = WorkflowRow {
      id: "1".to_string(),
      nodes: None,
    };

    assert!(row.into_record().unwrap().nodes.is_empty());
  }
}
