//! Outcome records and run reporting
//!
//! Per-identifier reconciliation records, aggregate statistics, and the
//! result types returned by a bulk pass or an event batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use accord_connector::ids::ObjectId;
use accord_connector::outcome::SyncOutcome;

/// Record of reconciling one identifier (or one event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRecord {
    /// The identifier that was reconciled.
    pub id: ObjectId,
    /// Schema of the reconciled instance, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Verdict.
    pub outcome: SyncOutcome,
    /// Failure reason, present when outcome is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Identity the object held before a rename. The old identifier is gone
    /// from the target, so a bulk pass must not treat it as a deletion
    /// candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<ObjectId>,
    /// Number of change-sets applied to reach the verdict.
    #[serde(default)]
    pub changesets_applied: usize,
    /// When the record was produced.
    pub completed_at: DateTime<Utc>,
}

impl ReconcileRecord {
    /// Record a non-failure outcome.
    #[must_use]
    pub fn ok(id: ObjectId, schema: Option<String>, outcome: SyncOutcome) -> Self {
        Self {
            id,
            schema,
            outcome,
            error: None,
            renamed_from: None,
            changesets_applied: 0,
            completed_at: Utc::now(),
        }
    }

    /// Record a failure with its reason.
    #[must_use]
    pub fn failed(id: ObjectId, schema: Option<String>, error: impl Into<String>) -> Self {
        Self {
            id,
            schema,
            outcome: SyncOutcome::Failed,
            error: Some(error.into()),
            renamed_from: None,
            changesets_applied: 0,
            completed_at: Utc::now(),
        }
    }

    /// Set how many change-sets were applied.
    #[must_use]
    pub fn with_applied(mut self, changesets_applied: usize) -> Self {
        self.changesets_applied = changesets_applied;
        self
    }

    /// Record the identity the object was renamed away from.
    #[must_use]
    pub fn with_renamed_from(mut self, from: ObjectId) -> Self {
        self.renamed_from = Some(from);
        self
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Identifiers that already matched.
    #[serde(default)]
    pub unchanged: u32,
    /// Objects materialized.
    #[serde(default)]
    pub created: u32,
    /// Objects re-identified.
    #[serde(default)]
    pub renamed: u32,
    /// Objects mutated.
    #[serde(default)]
    pub updated: u32,
    /// Objects removed.
    #[serde(default)]
    pub deleted: u32,
    /// Identifiers that failed.
    #[serde(default)]
    pub failed: u32,
}

impl RunStatistics {
    /// Create empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one record.
    pub fn add(&mut self, record: &ReconcileRecord) {
        match record.outcome {
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Renamed => self.renamed += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Deleted => self.deleted += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
    }

    /// Total records counted.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.unchanged + self.created + self.renamed + self.updated + self.deleted + self.failed
    }

    /// Whether any identifier failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Terminal status of a bulk pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every identifier reconciled and every deletion applied cleanly.
    Success,
    /// At least one identifier or deletion failed.
    Failure,
    /// The pass was cancelled; records already computed remain valid.
    Cancelled,
}

impl RunStatus {
    /// Whether the pass completed without failures.
    #[must_use]
    pub fn is_success(self) -> bool {
        self == RunStatus::Success
    }
}

/// Result of one bulk reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Terminal status.
    pub status: RunStatus,
    /// Per-identifier records, reconcile phase then deletion phase.
    pub records: Vec<ReconcileRecord>,
    /// Aggregate counters.
    pub stats: RunStatistics,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished.
    pub completed_at: DateTime<Utc>,
}

/// Result of processing one event batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Last fully processed sequence; the caller persists this.
    pub checkpoint: i64,
    /// True when the batch was not consumed because a bulk pass was
    /// running; resume from `checkpoint` once it completes.
    pub deferred: bool,
    /// Records for the events that were processed.
    pub records: Vec<ReconcileRecord>,
}

impl BatchOutcome {
    /// Outcome for a batch deferred behind a running bulk pass.
    #[must_use]
    pub fn deferred(checkpoint: i64) -> Self {
        Self {
            checkpoint,
            deferred: true,
            records: Vec::new(),
        }
    }
}
