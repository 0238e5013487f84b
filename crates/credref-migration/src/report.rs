use credref_model::RecordKind;
use serde::{Deserialize, Serialize};

use crate::resolver::Direction;

/// Counts for one record family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
  /// The record set was selected and processed. `false` when the run
  /// stopped at its deadline before reaching this phase.
  pub attempted: bool,
  /// Records loaded and rewritten in memory.
  pub scanned: usize,
  /// Records with at least one reference that changed shape.
  pub changed: usize,
  /// Changed records whose write completed.
  pub persisted: usize,
  /// Records that could not be read, or whose write failed or did not
  /// finish in time.
  pub failed: usize,
  /// References skipped because they could not be parsed.
  pub malformed_references: usize,
  /// Stored rows skipped because their payload could not be decoded.
  pub unreadable: usize,
}

/// A record that could not be read or whose write did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
  pub kind: RecordKind,
  pub id: String,
  pub error: String,
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
  pub direction: Direction,
  pub dry_run: bool,
  /// The run deadline elapsed before every write finished.
  pub timed_out: bool,
  pub workflows: PhaseReport,
  pub executions: PhaseReport,
  pub failures: Vec<RecordFailure>,
}

impl MigrationReport {
  pub fn new(direction: Direction, dry_run: bool) -> Self {
    Self {
      direction,
      dry_run,
      timed_out: false,
      workflows: PhaseReport::default(),
      executions: PhaseReport::default(),
      failures: Vec::new(),
    }
  }

  /// Every selected record was attempted and every write completed.
  pub fn is_success(&self) -> bool {
    !self.timed_out && self.failures.is_empty()
  }

  pub fn phase_mut(&mut self, kind: RecordKind) -> &mut PhaseReport {
    match kind {
      RecordKind::Workflow => &mut self.workflows,
      RecordKind::Execution => &mut self.executions,
    }
  }

  /// Phases the run never reached.
  pub fn skipped_phases(&self) -> Vec<RecordKind> {
    let mut skipped = Vec::new();
    if !self.workflows.attempted {
      skipped.push(RecordKind::Workflow);
    }
    if !self.executions.attempted {
      skipped.push(RecordKind::Execution);
    }
    skipped
  }

  /// Ids of every record that failed, in the order failures were recorded.
  pub fn failed_ids(&self) -> Vec<&str> {
    self.failures.iter().map(|f| f.id.as_str()).collect()
  }
}
