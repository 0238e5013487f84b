use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One node of a stored workflow graph.
///
/// The node is kept as its raw JSON value; only the `credentials` map is
/// interpreted. A node that is not a JSON object, or whose `credentials`
/// field is absent, null or not an object, has no credential references.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeSpec(Value);

impl NodeSpec {
  pub fn new(value: Value) -> Self {
    Self(value)
  }

  /// The node's display name, if it has one.
  pub fn name(&self) -> Option<&str> {
    self.0.get("name").and_then(Value::as_str)
  }

  /// Credential references keyed by credential type.
  pub fn credentials(&self) -> Option<&Map<String, Value>> {
    self.0.get("credentials").and_then(Value::as_object)
  }

  pub fn credentials_mut(&mut self) -> Option<&mut Map<String, Value>> {
    self
      .0
      .get_mut("credentials")
      .and_then(Value::as_object_mut)
  }

  pub fn as_value(&self) -> &Value {
    &self.0
  }

  pub fn into_value(self) -> Value {
    self.0
  }
}

impl From<Value> for NodeSpec {
  fn from(value: Value) -> Self {
    Self(value)
  }
}

/// Deserialize a node list, treating anything other than an array as empty.
///
/// A payload without a usable node list carries no references, so the
/// record it belongs to is never rewritten.
pub(crate) fn lenient_nodes<'de, D>(deserializer: D) -> Result<Vec<NodeSpec>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(nodes_from_value(Value::deserialize(deserializer)?))
}

/// Split a raw node list value into nodes; anything but an array is empty.
pub(crate) fn nodes_from_value(value: Value) -> Vec<NodeSpec> {
  match value {
    Value::Array(items) => items.into_iter().map(NodeSpec).collect(),
    _ => Vec::new(),
  }
}
