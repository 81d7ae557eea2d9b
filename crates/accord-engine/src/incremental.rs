//! Incremental event processing
//!
//! Consumes the ordered change stream that keeps the population synchronized
//! between bulk passes. Each batch is applied in sequence order with a
//! crash-resumable checkpoint: the returned checkpoint is always the last
//! fully processed sequence, so a failed event is retried on the next batch.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use accord_connector::events::{ChangeEvent, ChangeEventKind};
use accord_connector::outcome::SyncOutcome;
use accord_connector::traits::{CheckpointStore, TargetAdapter};

use crate::error::{ReconcileError, ReconcileResult};
use crate::report::{BatchOutcome, ReconcileRecord};
use crate::single::SingleObjectReconciler;
use crate::state::ReconcilerState;

/// Applies ordered change-stream batches to a target.
pub struct IncrementalEventProcessor {
    single: Arc<SingleObjectReconciler>,
    checkpoints: Arc<dyn CheckpointStore>,
    state: Arc<ReconcilerState>,
}

impl IncrementalEventProcessor {
    /// Create a processor sharing state with the bulk reconciler.
    pub fn new(
        single: Arc<SingleObjectReconciler>,
        checkpoints: Arc<dyn CheckpointStore>,
        state: Arc<ReconcilerState>,
    ) -> Self {
        Self {
            single,
            checkpoints,
            state,
        }
    }

    /// Process one batch of events, ordered ascending by sequence.
    ///
    /// A batch received while a bulk pass is running is not consumed at all;
    /// the caller resumes from the returned checkpoint once the pass
    /// completes. Conversely, the batch holds shared ownership of the
    /// engine state until it finishes, so a bulk pass cannot start
    /// mid-batch. Events at or below the stored checkpoint were already
    /// processed and are skipped. The first failed event stops the batch
    /// without advancing past it.
    #[instrument(skip_all, fields(target = %target.display_name(), events = events.len()))]
    pub async fn process_batch(
        &self,
        events: &[ChangeEvent],
        target: &dyn TargetAdapter,
        cancel: &CancellationToken,
    ) -> ReconcileResult<BatchOutcome> {
        let mut checkpoint = self
            .checkpoints
            .load()
            .await
            .map_err(|source| ReconcileError::Checkpoint { source })?;

        // Shared ownership is held for the whole batch, not sampled once:
        // a bulk pass requesting exclusive ownership is refused until the
        // last in-flight batch releases, so the two modes never interleave
        // writes to the same identifiers.
        let Some(_batch_guard) = self.state.try_begin_batch() else {
            info!(
                checkpoint,
                "Bulk pass in progress, deferring event batch"
            );
            return Ok(BatchOutcome::deferred(checkpoint));
        };

        Self::validate_ascending(events)?;
        let loaded = checkpoint;

        let mut records = Vec::new();
        for event in events {
            if event.sequence <= checkpoint {
                debug!(sequence = event.sequence, "Event already processed, skipping");
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }

            let batch = self.apply_event(event, target, cancel).await;
            let failed = batch.iter().any(|r| r.outcome.is_failed());
            records.extend(batch);

            if failed {
                if checkpoint == loaded {
                    // Known caveat: a permanently failing first event pins
                    // the checkpoint and the stream cannot advance. Callers
                    // must watch for a non-moving checkpoint.
                    warn!(
                        sequence = event.sequence,
                        checkpoint,
                        "First event of batch failed, checkpoint did not advance"
                    );
                } else {
                    warn!(
                        sequence = event.sequence,
                        checkpoint,
                        "Event failed, stopping batch at last processed sequence"
                    );
                }
                break;
            }
            checkpoint = event.sequence;
        }

        if checkpoint > loaded {
            self.checkpoints
                .save(checkpoint)
                .await
                .map_err(|source| ReconcileError::Checkpoint { source })?;
        }

        Ok(BatchOutcome {
            checkpoint,
            deferred: false,
            records,
        })
    }

    async fn apply_event(
        &self,
        event: &ChangeEvent,
        target: &dyn TargetAdapter,
        cancel: &CancellationToken,
    ) -> Vec<ReconcileRecord> {
        debug!(sequence = event.sequence, kind = %event.kind, subject = %event.subject, "Applying event");
        match &event.kind {
            ChangeEventKind::ObjectCreated | ChangeEventKind::ObjectUpdated => {
                self.single.reconcile(&event.subject, target, cancel).await
            }
            ChangeEventKind::ObjectDeleted => {
                vec![match target.delete(&event.subject).await {
                    // Absence on the target is not an error; either way the
                    // subject is gone.
                    Ok(_) => ReconcileRecord::ok(
                        event.subject.clone(),
                        None,
                        SyncOutcome::Deleted,
                    ),
                    Err(error) => ReconcileRecord::failed(
                        event.subject.clone(),
                        None,
                        format!("delete failed: {error}"),
                    ),
                }]
            }
            ChangeEventKind::ReferenceAdded { relation }
            | ChangeEventKind::ReferenceRemoved { relation } => {
                self.single
                    .sync_relation(&event.subject, relation, target, cancel)
                    .await
            }
        }
    }

    /// A batch that is not strictly ascending is a caller bug, reported
    /// before any event is consumed.
    fn validate_ascending(events: &[ChangeEvent]) -> ReconcileResult<()> {
        for pair in events.windows(2) {
            if pair[1].sequence <= pair[0].sequence {
                return Err(ReconcileError::OutOfOrderBatch {
                    sequence: pair[1].sequence,
                    previous: pair[0].sequence,
                });
            }
        }
        Ok(())
    }
}
