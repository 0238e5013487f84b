//! Walks node graphs and hands each credential reference to a visitor.

use credref_model::{CredentialReference, MalformedReference, NodeSpec};

/// Visit every credential reference in `nodes`.
///
/// For each entry of each node's `credentials` map, `visit` receives the
/// credential type key and the parsed reference. Returning `Some` writes the
/// replacement back into the map in place; returning `None` leaves the
/// stored value exactly as it was. Nodes without a credentials map are
/// skipped without being touched.
pub fn for_each_reference<F>(nodes: &mut [NodeSpec], mut visit: F)
where
  F: FnMut(&str, Result<CredentialReference, MalformedReference>) -> Option<CredentialReference>,
{
  for node in nodes.iter_mut() {
    let Some(credentials) = node.credentials_mut() else {
      continue;
    };

    for (credential_type, raw) in credentials.iter_mut() {
      if let Some(replacement) = visit(credential_type, CredentialReference::parse(raw)) {
        *raw = replacement.to_value();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_visits_every_entry() {
    let mut nodes = vec![
      NodeSpec::new(json!({ "credentials": { "httpApi": "A", "slackApi": "B" } })),
      NodeSpec::new(json!({ "credentials": { "githubApi": { "id": "1", "name": "C" } } })),
    ];

    let mut seen = Vec::new();
    for_each_reference(&mut nodes, |credential_type, reference| {
      seen.push((credential_type.to_string(), reference.unwrap()));
      None
    });

    assert_eq!(
      seen,
      vec![
        ("httpApi".to_string(), CredentialReference::legacy("A")),
        ("slackApi".to_string(), CredentialReference::legacy("B")),
        (
          "githubApi".to_string(),
          CredentialReference::structured(Some("1".to_string()), "C")
        ),
      ]
    );
  }

  #[test]
  fn test_skips_nodes_without_credentials() {
    let original = vec![
      NodeSpec::new(json!({ "name": "Start", "parameters": {} })),
      NodeSpec::new(json!({ "name": "Noop", "credentials": null })),
    ];
    let mut nodes = original.clone();

    let mut visits = 0;
    for_each_reference(&mut nodes, |_, _| {
      visits += 1;
      Some(CredentialReference::legacy("x"))
    });

    assert_eq!(visits, 0);
    assert_eq!(nodes, original);
  }

  #[test]
  fn test_writes_back_replacement() {
    let mut nodes = vec![NodeSpec::new(json!({
      "name": "Fetch",
      "credentials": { "httpApi": "MyApi", "slackApi": "Chat" }
    }))];

    for_each_reference(&mut nodes, |credential_type, _| {
      (credential_type == "httpApi").then(|| CredentialReference::structured(None, "MyApi"))
    });

    assert_eq!(
      nodes[0].as_value(),
      &json!({
        "name": "Fetch",
        "credentials": {
          "httpApi": { "id": null, "name": "MyApi" },
          "slackApi": "Chat"
        }
      })
    );
  }

  #[test]
  fn test_malformed_reported_to_visitor() {
    let mut nodes = vec![NodeSpec::new(json!({ "credentials": { "httpApi": 42 } }))];

    let mut malformed = 0;
    for_each_reference(&mut nodes, |_, reference| {
      if reference.is_err() {
        malformed += 1;
      }
      None
    });

    assert_eq!(malformed, 1);
    assert_eq!(nodes[0].as_value(), &json!({ "credentials": { "httpApi": 42 } }));
  }
}
