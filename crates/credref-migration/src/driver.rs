//! Migration driver implementation.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;

use credref_config::MigrationConfig;
use credref_model::{ExecutionRecord, GraphRecord, RecordKind, WorkflowRecord};
use credref_store::{RecordBatch, Store};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::CredentialCatalog;
use crate::error::MigrationError;
use crate::report::{MigrationReport, RecordFailure};
use crate::resolver::Direction;
use crate::rewriter::RecordRewriter;

/// A rewritten record waiting to be written back.
enum PendingWrite {
  Workflow(WorkflowRecord),
  Execution(ExecutionRecord),
}

impl PendingWrite {
  fn key(&self) -> (RecordKind, String) {
    match self {
      PendingWrite::Workflow(record) => (record.kind(), record.id.clone()),
      PendingWrite::Execution(record) => (record.kind(), record.id.clone()),
    }
  }

  async fn persist(&self, store: &dyn Store) -> Result<(), credref_store::Error> {
    match self {
      PendingWrite::Workflow(record) => store.update_workflow_nodes(&record.id, &record.nodes).await,
      PendingWrite::Execution(record) => {
        store
          .update_execution_data(&record.id, &record.workflow_data)
          .await
      }
    }
  }
}

impl From<WorkflowRecord> for PendingWrite {
  fn from(record: WorkflowRecord) -> Self {
    PendingWrite::Workflow(record)
  }
}

impl From<ExecutionRecord> for PendingWrite {
  fn from(record: ExecutionRecord) -> Self {
    PendingWrite::Execution(record)
  }
}

/// Runs the credential reference migration over a store.
///
/// # Usage
///
/// ```ignore
/// let driver = MigrationDriver::new(Arc::new(store), MigrationConfig::default())?;
/// let report = driver.up().await?;
/// assert!(report.is_success());
/// ```
pub struct MigrationDriver {
  store: Arc<dyn Store>,
  config: MigrationConfig,
}

impl MigrationDriver {
  /// Create a new driver. The run limits are validated here; table naming
  /// belongs to the store, which was built before the driver.
  pub fn new(store: Arc<dyn Store>, config: MigrationConfig) -> Result<Self, MigrationError> {
    config.validate_limits()?;
    Ok(Self { store, config })
  }

  pub fn config(&self) -> &MigrationConfig {
    &self.config
  }

  /// Rewrite legacy name references into `{id, name}` references.
  pub async fn up(&self) -> Result<MigrationReport, MigrationError> {
    self.run(Direction::Up).await
  }

  /// Rewrite `{id, name}` references back into name references.
  pub async fn down(&self) -> Result<MigrationReport, MigrationError> {
    self.run(Direction::Down).await
  }

  /// Run one direction over all workflows and the selected executions.
  ///
  /// Returns an error only when the catalog or a record set cannot be
  /// loaded. Unreadable rows, per-record write failures and the run
  /// deadline are reported through the returned [`MigrationReport`].
  #[instrument(
    name = "credential_migration",
    skip(self, direction),
    fields(direction = %direction, dry_run = self.config.dry_run)
  )]
  pub async fn run(&self, direction: Direction) -> Result<MigrationReport, MigrationError> {
    let deadline = Instant::now() + self.config.timeout();
    let mut report = MigrationReport::new(direction, self.config.dry_run);

    info!("migration_started");

    let Some(catalog) = self
      .load("credential catalog", deadline, CredentialCatalog::load(self.store.as_ref()))
      .await?
    else {
      return Ok(self.finish_timed_out(report));
    };
    info!(credentials = catalog.len(), "credential catalog loaded");

    let rewriter = RecordRewriter::new(&catalog, direction);

    let Some(workflows) = self
      .load("workflows", deadline, self.store.list_workflows())
      .await?
    else {
      return Ok(self.finish_timed_out(report));
    };
    report.workflows.attempted = true;
    let writes = rewrite_all(workflows, &rewriter, &mut report);
    if !self.persist_all(writes, deadline, &mut report).await {
      return Ok(self.finish_timed_out(report));
    }

    let Some(executions) = self.select_executions(deadline).await? else {
      return Ok(self.finish_timed_out(report));
    };
    report.executions.attempted = true;
    let writes = rewrite_all(executions, &rewriter, &mut report);
    if !self.persist_all(writes, deadline, &mut report).await {
      return Ok(self.finish_timed_out(report));
    }

    info!(
      workflows_changed = report.workflows.changed,
      workflows_persisted = report.workflows.persisted,
      executions_changed = report.executions.changed,
      executions_persisted = report.executions.persisted,
      unreadable = report.workflows.unreadable + report.executions.unreadable,
      failed = report.failures.len(),
      "migration_completed"
    );

    Ok(report)
  }

  /// Waiting executions plus the most recent window of active ones.
  async fn select_executions(
    &self,
    deadline: Instant,
  ) -> Result<Option<RecordBatch<ExecutionRecord>>, MigrationError> {
    let Some(mut selected) = self
      .load(
        "waiting executions",
        deadline,
        self.store.list_waiting_executions(),
      )
      .await?
    else {
      return Ok(None);
    };

    let Some(recent) = self
      .load(
        "recent executions",
        deadline,
        self
          .store
          .list_recent_executions(self.config.recent_execution_limit),
      )
      .await?
    else {
      return Ok(None);
    };

    let mut seen: HashSet<String> = selected
      .records
      .iter()
      .map(|e| e.id.clone())
      .chain(selected.unreadable.iter().map(|u| u.id.clone()))
      .collect();
    selected
      .records
      .extend(recent.records.into_iter().filter(|e| seen.insert(e.id.clone())));
    selected
      .unreadable
      .extend(recent.unreadable.into_iter().filter(|u| seen.insert(u.id.clone())));

    info!(executions = selected.len(), "executions selected");

    Ok(Some(selected))
  }

  /// Await a load, giving up at the deadline.
  async fn load<T, F>(
    &self,
    what: &'static str,
    deadline: Instant,
    future: F,
  ) -> Result<Option<T>, MigrationError>
  where
    F: Future<Output = Result<T, credref_store::Error>>,
  {
    match tokio::time::timeout_at(deadline, future).await {
      Ok(Ok(value)) => Ok(Some(value)),
      Ok(Err(source)) => {
        error!(what, error = %source, "load_failed");
        Err(MigrationError::Load { what, source })
      }
      Err(_) => {
        warn!(what, "deadline reached while loading");
        Ok(None)
      }
    }
  }

  /// Write back every changed record and wait for all writes.
  ///
  /// Returns `false` if the deadline was reached; writes still outstanding
  /// at that point are aborted and reported as failures.
  async fn persist_all(
    &self,
    writes: Vec<PendingWrite>,
    deadline: Instant,
    report: &mut MigrationReport,
  ) -> bool {
    if self.config.dry_run {
      for write in &writes {
        let (kind, record_id) = write.key();
        info!(record_kind = %kind, record_id = %record_id, "dry run: would persist record");
      }
      return true;
    }

    let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
    let mut tasks = JoinSet::new();
    let mut pending = BTreeSet::new();

    for write in writes {
      let key = write.key();
      pending.insert(key.clone());

      let store = Arc::clone(&self.store);
      let semaphore = Arc::clone(&semaphore);
      tasks.spawn(async move {
        // The semaphore is never closed.
        let _permit = semaphore.acquire_owned().await.ok();
        let result = write.persist(store.as_ref()).await;
        (key, result)
      });
    }

    loop {
      let next = tokio::time::timeout_at(deadline, tasks.join_next()).await;
      match next {
        Ok(Some(Ok(((kind, record_id), result)))) => {
          pending.remove(&(kind, record_id.clone()));
          match result {
            Ok(()) => {
              debug!(record_kind = %kind, record_id = %record_id, "record_persisted");
              report.phase_mut(kind).persisted += 1;
            }
            Err(e) => {
              error!(
                record_kind = %kind,
                record_id = %record_id,
                error = %e,
                "record_persist_failed"
              );
              record_failure(report, kind, record_id, e.to_string());
            }
          }
        }
        Ok(Some(Err(e))) => {
          error!(error = %e, "persist task join error");
        }
        Ok(None) => break,
        Err(_) => {
          tasks.abort_all();
          warn!(outstanding = pending.len(), "deadline reached, aborting outstanding writes");
          for (kind, record_id) in std::mem::take(&mut pending) {
            record_failure(report, kind, record_id, "timed out before write completed".to_string());
          }
          return false;
        }
      }
    }

    // Anything left was lost to a panicked task.
    for (kind, record_id) in pending {
      record_failure(report, kind, record_id, "write task did not complete".to_string());
    }

    true
  }

  fn finish_timed_out(&self, mut report: MigrationReport) -> MigrationReport {
    report.timed_out = true;
    warn!(
      failed = report.failures.len(),
      failed_ids = ?report.failed_ids(),
      skipped = ?report.skipped_phases(),
      workflows_persisted = report.workflows.persisted,
      executions_persisted = report.executions.persisted,
      "migration_timed_out"
    );
    report
  }
}

/// Rewrite records in memory, keeping only those that changed. Rows that
/// could not be decoded are reported as failures and skipped.
fn rewrite_all<R>(
  batch: RecordBatch<R>,
  rewriter: &RecordRewriter<'_>,
  report: &mut MigrationReport,
) -> Vec<PendingWrite>
where
  R: GraphRecord + Into<PendingWrite>,
{
  for unreadable in batch.unreadable {
    warn!(
      record_kind = %unreadable.kind,
      record_id = %unreadable.id,
      reason = %unreadable.reason,
      "skipping unreadable record"
    );
    report.phase_mut(unreadable.kind).unreadable += 1;
    record_failure(report, unreadable.kind, unreadable.id, unreadable.reason);
  }

  let mut writes = Vec::new();

  for mut record in batch.records {
    let outcome = rewriter.apply_to_record(&mut record);
    let phase = report.phase_mut(record.kind());
    phase.scanned += 1;
    phase.malformed_references += outcome.malformed;

    if outcome.changed {
      phase.changed += 1;
      debug!(
        record_kind = %record.kind(),
        record_id = %record.id(),
        references = outcome.rewritten,
        "record_rewritten"
      );
      writes.push(record.into());
    }
  }

  writes
}

fn record_failure(report: &mut MigrationReport, kind: RecordKind, id: String, error: String) {
  report.phase_mut(kind).failed += 1;
  report.failures.push(RecordFailure { kind, id, error });
}
