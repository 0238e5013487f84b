//! Credref Store
//!
//! This crate provides the storage trait and implementations the credential
//! reference migration runs against. Data lives in a relational database
//! (SQLite, or PostgreSQL with the `postgres` feature).
//!
//! The [`Store`] trait defines operations for:
//! - Loading the credential catalog
//! - Loading workflows and the selected window of executions
//! - Writing back rewritten node graphs by primary id
//!
//! A row whose payload column cannot be decoded does not fail the listing
//! it belongs to; it comes back as an [`UnreadableRecord`] beside the
//! readable ones in a [`RecordBatch`].
//!
//! Every record identifier and payload is a bound parameter. Only table
//! names, which come from a validated [`credref_config::TableNames`], are
//! spliced into statement text.

#[cfg(feature = "postgres")]
mod postgres;
mod rows;
mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use credref_model::{
  CredentialDescriptor, ExecutionRecord, NodeSpec, RecordKind, WorkflowData, WorkflowRecord,
};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// A payload could not be serialized for writing.
  #[error("payload error: {0}")]
  Payload(#[from] serde_json::Error),

  /// A single fetched record could not be decoded.
  #[error(transparent)]
  Unreadable(#[from] UnreadableRecord),
}

/// A stored row whose payload column could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unreadable {kind} {id}: {reason}")]
pub struct UnreadableRecord {
  pub kind: RecordKind,
  pub id: String,
  pub reason: String,
}

/// The result of listing one record set: every row that decoded, plus
/// the rows that did not.
#[derive(Debug, Clone)]
pub struct RecordBatch<T> {
  pub records: Vec<T>,
  pub unreadable: Vec<UnreadableRecord>,
}

impl<T> RecordBatch<T> {
  pub fn new(records: Vec<T>) -> Self {
    Self {
      records,
      unreadable: Vec::new(),
    }
  }

  /// Number of rows listed, readable or not.
  pub fn len(&self) -> usize {
    self.records.len() + self.unreadable.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty() && self.unreadable.is_empty()
  }
}

impl<T> Default for RecordBatch<T> {
  fn default() -> Self {
    Self::new(Vec::new())
  }
}

impl<T> FromIterator<Result<T, UnreadableRecord>> for RecordBatch<T> {
  fn from_iter<I: IntoIterator<Item = Result<T, UnreadableRecord>>>(iter: I) -> Self {
    let mut batch = Self::default();
    for item in iter {
      match item {
        Ok(record) => batch.records.push(record),
        Err(unreadable) => batch.unreadable.push(unreadable),
      }
    }
    batch
  }
}

/// Storage trait for credentials, workflows and executions.
#[async_trait]
pub trait Store: Send + Sync {
  /// List every credential descriptor, in storage order.
  async fn list_credentials(&self) -> Result<Vec<CredentialDescriptor>, Error>;

  /// List every workflow.
  async fn list_workflows(&self) -> Result<RecordBatch<WorkflowRecord>, Error>;

  /// List unfinished executions that are parked waiting (`waitTill` set).
  async fn list_waiting_executions(&self) -> Result<RecordBatch<ExecutionRecord>, Error>;

  /// List the `limit` most recently started unfinished executions that are
  /// not waiting and were not started in retry mode.
  async fn list_recent_executions(
    &self,
    limit: u32,
  ) -> Result<RecordBatch<ExecutionRecord>, Error>;

  /// Get a workflow by ID.
  async fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowRecord, Error>;

  /// Get an execution by ID.
  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error>;

  /// Replace a workflow's node list.
  async fn update_workflow_nodes(
    &self,
    workflow_id: &str,
    nodes: &[NodeSpec],
  ) -> Result<(), Error>;

  /// Replace an execution's workflow snapshot.
  async fn update_execution_data(
    &self,
    execution_id: &str,
    data: &WorkflowData,
  ) -> Result<(), Error>;
}
