use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::node::{NodeSpec, lenient_nodes, nodes_from_value};

/// Which record family a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
  Workflow,
  Execution,
}

impl fmt::Display for RecordKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecordKind::Workflow => f.write_str("workflow"),
      RecordKind::Execution => f.write_str("execution"),
    }
  }
}

/// A record that embeds a node graph.
pub trait GraphRecord {
  fn kind(&self) -> RecordKind;

  fn id(&self) -> &str;

  fn nodes(&self) -> &[NodeSpec];

  fn nodes_mut(&mut self) -> &mut [NodeSpec];
}

/// A stored workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
  pub id: String,
  #[serde(default, deserialize_with = "lenient_nodes")]
  pub nodes: Vec<NodeSpec>,
}

impl WorkflowRecord {
  pub fn new(id: impl Into<String>, nodes: Vec<NodeSpec>) -> Self {
    Self {
      id: id.into(),
      nodes,
    }
  }

  /// Build a record from a raw `nodes` column value.
  pub fn from_payload(id: impl Into<String>, nodes: Value) -> Self {
    Self::new(id, nodes_from_value(nodes))
  }
}

impl GraphRecord for WorkflowRecord {
  fn kind(&self) -> RecordKind {
    RecordKind::Workflow
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn nodes(&self) -> &[NodeSpec] {
    &self.nodes
  }

  fn nodes_mut(&mut self) -> &mut [NodeSpec] {
    &mut self.nodes
  }
}

/// The workflow snapshot an execution was started with.
///
/// Fields other than `nodes` (connections, settings, ...) are carried
/// through untouched, and `nodes` is written back at the position it was
/// read from so a rewritten payload keeps its key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowData {
  pub nodes: Vec<NodeSpec>,
  pub extra: Map<String, Value>,
  /// Index among `extra`'s keys where `nodes` appeared, if it did.
  nodes_at: Option<usize>,
}

impl WorkflowData {
  /// A snapshot whose `nodes` field comes first.
  pub fn new(nodes: Vec<NodeSpec>, extra: Map<String, Value>) -> Self {
    Self {
      nodes,
      extra,
      nodes_at: Some(0),
    }
  }

  /// Build from a raw `workflowData` column value.
  ///
  /// Returns `None` when the value is not a JSON object.
  pub fn from_payload(value: Value) -> Option<Self> {
    match value {
      Value::Object(fields) => Some(Self::from_fields(fields)),
      _ => None,
    }
  }

  fn from_fields(fields: Map<String, Value>) -> Self {
    let mut data = Self::default();
    for (key, value) in fields {
      if key == "nodes" {
        data.nodes_at = Some(data.extra.len());
        data.nodes = nodes_from_value(value);
      } else {
        data.extra.insert(key, value);
      }
    }
    data
  }
}

impl Serialize for WorkflowData {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let nodes_at = match self.nodes_at {
      Some(at) => Some(at.min(self.extra.len())),
      None if self.nodes.is_empty() => None,
      None => Some(0),
    };

    let len = self.extra.len() + usize::from(nodes_at.is_some());
    let mut map = serializer.serialize_map(Some(len))?;
    for (index, (key, value)) in self.extra.iter().enumerate() {
      if nodes_at == Some(index) {
        map.serialize_entry("nodes", &self.nodes)?;
      }
      map.serialize_entry(key, value)?;
    }
    if nodes_at == Some(self.extra.len()) {
      map.serialize_entry("nodes", &self.nodes)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for WorkflowData {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Map::<String, Value>::deserialize(deserializer).map(Self::from_fields)
  }
}

/// A stored workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
  pub id: String,
  pub workflow_data: WorkflowData,
  pub started_at: DateTime<Utc>,
  pub wait_till: Option<DateTime<Utc>>,
  pub finished: bool,
  pub mode: String,
}

impl GraphRecord for ExecutionRecord {
  fn kind(&self) -> RecordKind {
    RecordKind::Execution
  }

  fn id(&self) -> &str {
    &self.id
  }

  fn nodes(&self) -> &[NodeSpec] {
    &self.workflow_data.nodes
  }

  fn nodes_mut(&mut self) -> &mut [NodeSpec] {
    &mut self.workflow_data.nodes
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_workflow_data_keeps_extra_fields() {
    let raw = json!({
      "name": "Sync",
      "nodes": [{ "name": "Start" }],
      "connections": { "Start": {} }
    });
    let data: WorkflowData = serde_json::from_value(raw).unwrap();
    assert_eq!(data.nodes.len(), 1);
    assert_eq!(data.extra.get("name"), Some(&json!("Sync")));

    let back = serde_json::to_value(&data).unwrap();
    assert_eq!(back["connections"], json!({ "Start": {} }));
    assert_eq!(back["nodes"][0]["name"], json!("Start"));
  }

  #[test]
  fn test_workflow_data_keeps_key_order() {
    let raw = r#"{"name":"Sync","nodes":[{"name":"Start","credentials":{"httpApi":"MyApi"}}],"connections":{},"settings":{"timezone":"UTC"}}"#;
    let data: WorkflowData = serde_json::from_str(raw).unwrap();
    assert_eq!(serde_json::to_string(&data).unwrap(), raw);

    let trailing = r#"{"connections":{},"nodes":[]}"#;
    let data: WorkflowData = serde_json::from_str(trailing).unwrap();
    assert_eq!(serde_json::to_string(&data).unwrap(), trailing);
  }

  #[test]
  fn test_workflow_data_without_nodes() {
    let data = WorkflowData::from_payload(json!({ "connections": {} })).unwrap();
    assert!(data.nodes.is_empty());
    assert_eq!(serde_json::to_value(&data).unwrap(), json!({ "connections": {} }));

    let built = WorkflowData::new(vec![NodeSpec::new(json!({ "name": "Start" }))], Map::new());
    assert_eq!(
      serde_json::to_value(&built).unwrap(),
      json!({ "nodes": [{ "name": "Start" }] })
    );
    assert!(WorkflowData::from_payload(json!([1, 2])).is_none());
  }

  #[test]
  fn test_non_array_nodes_are_empty() {
    let data: WorkflowData = serde_json::from_value(json!({ "nodes": null })).unwrap();
    assert!(data.nodes.is_empty());

    let workflow: WorkflowRecord =
      serde_json::from_value(json!({ "id": "1", "nodes": "garbage" })).unwrap();
    assert!(workflow.nodes.is_empty());
  }

  #[test]
  fn test_record_kind_display() {
    assert_eq!(RecordKind::Workflow.to_string(), "workflow");
    assert_eq!(RecordKind::Execution.to_string(), "execution");
  }
}
