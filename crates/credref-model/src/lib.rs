//! Credref Model
//!
//! This crate contains the in-memory shapes of the records a credential
//! reference migration reads and rewrites:
//! - [`CredentialDescriptor`] rows from the credentials table
//! - [`WorkflowRecord`] and [`ExecutionRecord`] carrying node graphs
//! - [`CredentialReference`], the per-node, per-type pointer at a credential
//!
//! Node payloads are kept as raw JSON so fields this crate does not know
//! about survive a rewrite untouched. Only the `credentials` map of each
//! node is ever interpreted.

mod credential;
mod node;
mod record;
mod reference;

pub use credential::CredentialDescriptor;
pub use node::NodeSpec;
pub use record::{ExecutionRecord, GraphRecord, RecordKind, WorkflowData, WorkflowRecord};
pub use reference::{CredentialReference, MalformedReference};
