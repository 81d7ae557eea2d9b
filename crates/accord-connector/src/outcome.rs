//! Reconciliation outcomes
//!
//! The per-identifier verdict of a reconciliation, and the sink contract
//! through which the engine reports it. Logging and metrics backends live
//! behind the sink; the engine only emits.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ObjectId;

/// Verdict of reconciling one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Observed state already matched the desired state.
    Unchanged,
    /// The object did not exist and was materialized.
    Created,
    /// The object was re-identified from an alternate identity.
    Renamed,
    /// One or more mutations were applied.
    Updated,
    /// The object was removed from the target.
    Deleted,
    /// Reconciliation failed; the record carries the reason.
    Failed,
}

impl SyncOutcome {
    /// Whether the identifier ended in a state the resolver still wants.
    ///
    /// Identifiers with a wanted outcome are excluded from deletion
    /// candidate computation in a bulk pass.
    pub fn is_wanted(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Unchanged
                | SyncOutcome::Created
                | SyncOutcome::Renamed
                | SyncOutcome::Updated
        )
    }

    /// Whether reconciliation failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncOutcome::Unchanged => "unchanged",
            SyncOutcome::Created => "created",
            SyncOutcome::Renamed => "renamed",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Deleted => "deleted",
            SyncOutcome::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Structured per-identifier outcome reporting.
///
/// Implementations forward to whatever logging or metrics backend the
/// deployment uses. Calls must be cheap; the engine reports from inside its
/// reconciliation loops.
pub trait OutcomeSink: Send + Sync {
    /// Report the outcome of one identifier.
    fn record(&self, id: &ObjectId, schema: Option<&str>, outcome: SyncOutcome, error: Option<&str>);
}

/// Sink that emits each outcome as a structured tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOutcomeSink;

impl OutcomeSink for TracingOutcomeSink {
    fn record(
        &self,
        id: &ObjectId,
        schema: Option<&str>,
        outcome: SyncOutcome,
        error: Option<&str>,
    ) {
        match error {
            Some(reason) => tracing::warn!(
                id = %id,
                schema = schema.unwrap_or("-"),
                outcome = %outcome,
                reason,
                "Reconciliation outcome"
            ),
            None => tracing::info!(
                id = %id,
                schema = schema.unwrap_or("-"),
                outcome = %outcome,
                "Reconciliation outcome"
            ),
        }
    }
}
