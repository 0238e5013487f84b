use async_trait::async_trait;
use credref_config::TableNames;
use credref_model::{
  CredentialDescriptor, ExecutionRecord, NodeSpec, WorkflowData, WorkflowRecord,
};
use sqlx::PgPool;

use crate::rows::{CredentialRow, ExecutionRow, WorkflowRow};
use crate::{Error, RecordBatch, Store};

/// PostgreSQL-based store implementation.
///
/// Ids leave the store as text. Lookups and updates compare the integer
/// primary key against a bound integer so they stay on the key's index.
/// Payload columns are read as text and decoded per row. Timestamps are
/// read as `timestamptz`.
pub struct PgStore {
  pool: PgPool,
  tables: TableNames,
}

impl PgStore {
  /// Create a new PostgreSQL store with the given connection pool and table names.
  pub fn new(pool: PgPool, tables: TableNames) -> Self {
    Self { pool, tables }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  fn select_executions(&self, filter: &str) -> String {
    format!(
      r#"
      SELECT e.id::text AS id,
             e."workflowData"::text AS workflow_data,
             e."startedAt"::timestamptz AS started_at,
             e."waitTill"::timestamptz AS wait_till,
             e.finished AS finished,
             e.mode AS mode
      FROM {} AS e
      {}
      "#,
      self.tables.executions, filter
    )
  }

  fn select_workflows(&self, filter: &str) -> String {
    format!(
      r#"
      SELECT w.id::text AS id, w.nodes::text AS nodes
      FROM {} AS w
      {}
      "#,
      self.tables.workflows, filter
    )
  }
}

#[async_trait]
impl Store for PgStore {
  async fn list_credentials(&self) -> Result<Vec<CredentialDescriptor>, Error> {
    let sql = format!(
      r#"
      SELECT c.id::text AS id, c.name AS name, c.type AS type
      FROM {} AS c
      ORDER BY c.id ASC
      "#,
      self.tables.credentials
    );
    let rows: Vec<CredentialRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

    Ok(rows.into_iter().map(Into::into).collect())
  }

  async fn list_workflows(&self) -> Result<RecordBatch<WorkflowRecord>, Error> {
    let sql = self.select_workflows("ORDER BY w.id ASC");
    let rows: Vec<WorkflowRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

    Ok(rows.into_iter().map(WorkflowRow::into_record).collect())
  }

  async fn list_waiting_executions(&self) -> Result<RecordBatch<ExecutionRecord>, Error> {
    let sql = self.select_executions(
      r#"
      WHERE e."waitTill" IS NOT NULL AND e.finished = FALSE
      ORDER BY e.id ASC
      "#,
    );
    let rows: Vec<ExecutionRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

    Ok(rows.into_iter().map(ExecutionRow::into_record).collect())
  }

  async fn list_recent_executions(
    &self,
    limit: u32,
  ) -> Result<RecordBatch<ExecutionRecord>, Error> {
    let sql = self.select_executions(
      r#"
      WHERE e."waitTill" IS NULL AND e.finished = FALSE AND e.mode != 'retry'
      ORDER BY e."startedAt" DESC
      LIMIT $1
      "#,
    );
    let rows: Vec<ExecutionRow> = sqlx::query_as(&sql)
      .bind(i64::from(limit))
      .fetch_all(&self.pool)
      .await?;

    Ok(rows.into_iter().map(ExecutionRow::into_record).collect())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowRecord, Error> {
    let Some(key) = record_key(workflow_id) else {
      return Err(Error::NotFound(format!("workflow {}", workflow_id)));
    };
    let sql = self.select_workflows("WHERE w.id = $1");
    let row: Option<WorkflowRow> = sqlx::query_as(&sql)
      .bind(key)
      .fetch_optional(&self.pool)
      .await?;

    let row = row.ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))?;
    Ok(row.into_record()?)
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    let Some(key) = record_key(execution_id) else {
      return Err(Error::NotFound(format!("execution {}", execution_id)));
    };
    let sql = self.select_executions("WHERE e.id = $1");
    let row: Option<ExecutionRow> = sqlx::query_as(&sql)
      .bind(key)
      .fetch_optional(&self.pool)
      .await?;

    let row = row.ok_or_else(|| Error::NotFound(format!("execution {}", execution_id)))?;
    Ok(row.into_record()?)
  }

  async fn update_workflow_nodes(
    &self,
    workflow_id: &str,
    nodes: &[NodeSpec],
  ) -> Result<(), Error> {
    let Some(key) = record_key(workflow_id) else {
      return Err(Error::NotFound(format!("workflow {}", workflow_id)));
    };
    let payload = serde_json::to_string(nodes)?;
    let sql = update_payload_sql(&self.tables.workflows, "nodes");
    let result = sqlx::query(&sql)
      .bind(payload)
      .bind(key)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("workflow {}", workflow_id)));
    }

    Ok(())
  }

  async fn update_execution_data(
    &self,
    execution_id: &str,
    data: &WorkflowData,
  ) -> Result<(), Error> {
    let Some(key) = record_key(execution_id) else {
      return Err(Error::NotFound(format!("execution {}", execution_id)));
    };
    let payload = serde_json::to_string(data)?;
    let sql = update_payload_sql(&self.tables.executions, "\"workflowData\"");
    let result = sqlx::query(&sql)
      .bind(payload)
      .bind(key)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("execution {}", execution_id)));
    }

    Ok(())
  }
}

/// Replace one JSON payload column of the row keyed by `$2`.
fn update_payload_sql(table: &str, column: &str) -> String {
  format!(
    r#"
    UPDATE {}
    SET {} = $1::json
    WHERE id = $2
    "#,
    table, column
  )
}

/// Parse a record id into the integer primary key. An id that is not an
/// integer cannot name a row.
fn record_key(id: &str) -> Option<i64> {
  id.parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_key() {
    assert_eq!(record_key("42"), Some(42));
    assert_eq!(record_key("-1"), Some(-1));
    assert_eq!(record_key("abc"), None);
    assert_eq!(record_key(""), None);
  }

  #[test]
  fn test_update_compares_key_column_directly() {
    let sql = update_payload_sql("\"execution_entity\"", "\"workflowData\"");
    assert!(sql.contains("SET \"workflowData\" = $1::json"));
    assert!(sql.contains("WHERE id = $2"));
    assert!(!sql.contains("::text"));
  }
}
