use async_trait::async_trait;
use credref_config::TableNames;
use credref_model::{
  CredentialDescriptor, ExecutionRecord, NodeSpec, WorkflowData, WorkflowRecord,
};
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::rows::{CredentialRow, ExecutionRow, WorkflowRow};
use crate::{Error, RecordBatch, Store};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
  tables: TableNames,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool and table names.
  pub fn new(pool: SqlitePool, tables: TableNames) -> Self {
    Self { pool, tables }
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  /// Create the three tables if they do not exist.
  ///
  /// Production schemas are owned by the application that writes these
  /// tables; this exists for fixtures and local runs.
  pub async fn create_tables(&self) -> Result<(), Error> {
    let statements = [
      format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
          id INTEGER PRIMARY KEY,
          name TEXT NOT NULL,
          type TEXT NOT NULL
        )
        "#,
        self.tables.credentials
      ),
      format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
          id INTEGER PRIMARY KEY,
          nodes TEXT
        )
        "#,
        self.tables.workflows
      ),
      format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
          id INTEGER PRIMARY KEY,
          "workflowData" TEXT,
          "startedAt" DATETIME NOT NULL,
          "waitTill" DATETIME,
          finished BOOLEAN NOT NULL,
          mode TEXT NOT NULL
        )
        "#,
        self.tables.executions
      ),
    ];

    for statement in &statements {
      sqlx::query(statement).execute(&self.pool).await?;
    }

    Ok(())
  }

  /// Insert a credential descriptor.
  pub async fn insert_credential(&self, credential: &CredentialDescriptor) -> Result<(), Error> {
    let sql = format!(
      "INSERT INTO {} (id, name, type) VALUES (?, ?, ?)",
      self.tables.credentials
    );
    sqlx::query(&sql)
      .bind(&credential.id)
      .bind(&credential.name)
      .bind(&credential.credential_type)
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  /// Insert a workflow.
  pub async fn insert_workflow(&self, workflow: &WorkflowRecord) -> Result<(), Error> {
    let sql = format!(
      "INSERT INTO {} (id, nodes) VALUES (?, ?)",
      self.tables.workflows
    );
    sqlx::query(&sql)
      .bind(&workflow.id)
      .bind(Json(&workflow.nodes))
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  /// Insert an execution.
  pub async fn insert_execution(&self, execution: &ExecutionRecord) -> Result<(), Error> {
    let sql = format!(
      r#"
      INSERT INTO {} (id, "workflowData", "startedAt", "waitTill", finished, mode)
      VALUES (?, ?, ?, ?, ?, ?)
      "#,
      self.tables.executions
    );
    sqlx::query(&sql)
      .bind(&execution.id)
      .bind(Json(&execution.workflow_data))
      .bind(execution.started_at)
      .bind(execution.wait_till)
      .bind(execution.finished)
      .bind(&execution.mode)
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  fn select_executions(&self, filter: &str) -> String {
    format!(
      r#"
      SELECT CAST(e.id AS TEXT) AS id,
             e."workflowData" AS workflow_data,
             e."startedAt" AS started_at,
             e."waitTill" AS wait_till,
             e.finished AS finished,
             e.mode AS mode
      FROM {} AS e
      {}
      "#,
      self.tables.executions, filter
    )
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn list_credentials(&self) -> Result<Vec<CredentialDescriptor>, Error> {
    let sql = format!(
      r#"
      SELECT CAST(c.id AS TEXT) AS id, c.name AS name, c.type AS type
      FROM {} AS c
      ORDER BY c.id ASC
      "#,
      self.tables.credentials
    );
    let rows: Vec<CredentialRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

    Ok(rows.into_iter().map(Into::into).collect())
  }

  async fn list_workflows(&self) -> Result<RecordBatch<WorkflowRecord>, Error> {
    let sql = format!(
      r#"
      SELECT CAST(w.id AS TEXT) AS id, w.nodes AS nodes
      FROM {} AS w
      ORDER BY w.id ASC
      "#,
      self.tables.workflows
    );
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
      LIMIT ?
      "#,
    );
    let rows: Vec<ExecutionRow> = sqlx::query_as(&sql)
      .bind(i64::from(limit))
      .fetch_all(&self.pool)
      .await?;

    Ok(rows.into_iter().map(ExecutionRow::into_record).collect())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowRecord, Error> {
    let sql = format!(
      r#"
      SELECT CAST(w.id AS TEXT) AS id, w.nodes AS nodes
      FROM {} AS w
      WHERE w.id = ?
      "#,
      self.tables.workflows
    );
    let row: Option<WorkflowRow> = sqlx::query_as(&sql)
      .bind(workflow_id)
      .fetch_optional(&self.pool)
      .await?;

    let row = row.ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))?;
    Ok(row.into_record()?)
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    let sql = self.select_executions("WHERE e.id = ?");
    let row: Option<ExecutionRow> = sqlx::query_as(&sql)
      .bind(execution_id)
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
    let sql = format!(
      r#"
      UPDATE {}
      SET nodes = ?
      WHERE id = ?
      "#,
      self.tables.workflows
    );
    let result = sqlx::query(&sql)
      .bind(Json(nodes))
      .bind(workflow_id)
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
    let sql = format!(
      r#"
      UPDATE {}
      SET "workflowData" = ?
      WHERE id = ?
      "#,
      self.tables.executions
    );
    let result = sqlx::query(&sql)
      .bind(Json(data))
      .bind(execution_id)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("execution {}", execution_id)));
    }

    Ok(())
  }
}
