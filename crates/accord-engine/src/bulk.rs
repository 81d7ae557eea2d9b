//! Bulk reconciliation
//!
//! Reconciles the full desired identifier universe against a target, then
//! deletes observed identifiers that are no longer desired. Creates and
//! updates always happen before any deletion in the same pass, and the
//! deletion phase is always sequential in the order the target prescribes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use accord_connector::ids::ObjectId;
use accord_connector::outcome::SyncOutcome;
use accord_connector::traits::{AuthoritativeSource, Resolver, TargetAdapter};

use crate::config::{EngineConfig, ErrorPolicy};
use crate::error::{ReconcileError, ReconcileResult};
use crate::report::{BulkOutcome, ReconcileRecord, RunStatistics, RunStatus};
use crate::single::SingleObjectReconciler;
use crate::state::ReconcilerState;

/// How the reconcile phase of a pass ended.
#[derive(Debug, PartialEq, Eq)]
enum PhaseEnd {
    Completed,
    Stopped,
}

/// Reconciles the whole desired population against one target.
pub struct BulkReconciler {
    single: Arc<SingleObjectReconciler>,
    resolver: Arc<dyn Resolver>,
    state: Arc<ReconcilerState>,
    config: EngineConfig,
}

impl BulkReconciler {
    /// Create a bulk reconciler sharing state with the event processor.
    pub fn new(
        single: Arc<SingleObjectReconciler>,
        resolver: Arc<dyn Resolver>,
        state: Arc<ReconcilerState>,
        config: EngineConfig,
    ) -> Self {
        Self {
            single,
            resolver,
            state,
            config,
        }
    }

    /// Run a pass against a non-authoritative target.
    ///
    /// Every desired identifier is reconciled; no deletion phase runs, since
    /// the target's inventory is not trusted for candidate computation.
    #[instrument(skip_all, fields(target = %target.display_name()))]
    pub async fn run<T>(
        &self,
        target: Arc<T>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<BulkOutcome>
    where
        T: TargetAdapter + 'static,
    {
        let _guard = self
            .state
            .try_begin_bulk()
            .ok_or(ReconcileError::ReconcilerBusy)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting bulk pass");

        let universe = self.universe().await?;
        let (records, _end) = self.reconcile_phase(target, universe, cancel).await;

        Ok(Self::outcome(run_id, started_at, records, cancel))
    }

    /// Run a pass against an authoritative target, including the deletion
    /// phase.
    ///
    /// Deletion candidates are the target's discovered identifiers minus
    /// those that ended in a wanted state and minus old identities consumed
    /// by a rename. The phase runs strictly after all reconciliation, in the
    /// order the target prescribes, one delete at a time.
    #[instrument(skip_all, fields(target = %source.display_name()))]
    pub async fn run_authoritative<S>(
        &self,
        source: Arc<S>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<BulkOutcome>
    where
        S: AuthoritativeSource + 'static,
    {
        let _guard = self
            .state
            .try_begin_bulk()
            .ok_or(ReconcileError::ReconcilerBusy)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting bulk pass with deletion");

        let universe = self.universe().await?;
        let (mut records, end) = self
            .reconcile_phase(Arc::clone(&source) as Arc<dyn TargetAdapter>, universe, cancel)
            .await;

        if end == PhaseEnd::Completed && !cancel.is_cancelled() {
            let keep = Self::keep_set(&records);
            records.extend(self.deletion_phase(&*source, &keep, cancel).await);
        } else {
            debug!(run_id = %run_id, "Reconcile phase stopped early, skipping deletion phase");
        }

        Ok(Self::outcome(run_id, started_at, records, cancel))
    }

    async fn universe(&self) -> ReconcileResult<Vec<ObjectId>> {
        let universe = self
            .resolver
            .resolve_all()
            .await
            .map_err(|source| ReconcileError::Enumerate { source })?;
        debug!(identifiers = universe.len(), "Enumerated desired universe");
        Ok(universe.into_keys().collect())
    }

    /// Reconcile every desired identifier, sequentially or through a bounded
    /// worker pool when configured.
    async fn reconcile_phase(
        &self,
        target: Arc<dyn TargetAdapter>,
        ids: Vec<ObjectId>,
        cancel: &CancellationToken,
    ) -> (Vec<ReconcileRecord>, PhaseEnd) {
        if self.config.concurrency <= 1 {
            return self.reconcile_sequential(&*target, ids, cancel).await;
        }
        self.reconcile_pooled(target, ids, cancel).await
    }

    async fn reconcile_sequential(
        &self,
        target: &dyn TargetAdapter,
        ids: Vec<ObjectId>,
        cancel: &CancellationToken,
    ) -> (Vec<ReconcileRecord>, PhaseEnd) {
        let mut records = Vec::new();
        for id in ids {
            if cancel.is_cancelled() {
                return (records, PhaseEnd::Stopped);
            }
            let batch = self.single.reconcile(&id, target, cancel).await;
            let failed = batch.iter().any(|r| r.outcome.is_failed());
            records.extend(batch);
            if failed && self.config.error_policy == ErrorPolicy::ExitOnFirstError {
                warn!(id = %id, "Stopping pass on first failure");
                return (records, PhaseEnd::Stopped);
            }
        }
        (records, PhaseEnd::Completed)
    }

    async fn reconcile_pooled(
        &self,
        target: Arc<dyn TargetAdapter>,
        ids: Vec<ObjectId>,
        cancel: &CancellationToken,
    ) -> (Vec<ReconcileRecord>, PhaseEnd) {
        let gate = Arc::new(Semaphore::new(self.config.concurrency));
        let child = cancel.child_token();

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            let single = Arc::clone(&self.single);
            let target = Arc::clone(&target);
            let gate = Arc::clone(&gate);
            let token = child.clone();
            let task_id = id.clone();
            let handle = tokio::spawn(async move {
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Vec::new(),
                };
                if token.is_cancelled() {
                    return Vec::new();
                }
                single.reconcile(&task_id, &*target, &token).await
            });
            handles.push((id, handle));
        }

        let mut records = Vec::new();
        let mut stopped = false;
        for (id, handle) in handles {
            match handle.await {
                Ok(batch) => {
                    let failed = batch.iter().any(|r| r.outcome.is_failed());
                    records.extend(batch);
                    if failed
                        && self.config.error_policy == ErrorPolicy::ExitOnFirstError
                        && !stopped
                    {
                        warn!(id = %id, "Stopping pass on first failure");
                        child.cancel();
                        stopped = true;
                    }
                }
                Err(join_error) => {
                    records.push(ReconcileRecord::failed(
                        id,
                        None,
                        format!("reconcile task failed: {join_error}"),
                    ));
                }
            }
        }

        let end = if stopped || cancel.is_cancelled() {
            PhaseEnd::Stopped
        } else {
            PhaseEnd::Completed
        };
        (records, end)
    }

    /// Identifiers that must survive the deletion phase: everything that
    /// ended in a wanted state, plus old identities a rename already removed
    /// from the target.
    fn keep_set(records: &[ReconcileRecord]) -> HashSet<ObjectId> {
        let mut keep = HashSet::new();
        for record in records {
            if record.outcome.is_wanted() {
                keep.insert(record.id.without_container());
            }
            if let Some(from) = &record.renamed_from {
                keep.insert(from.without_container());
            }
        }
        keep
    }

    async fn deletion_phase(
        &self,
        source: &dyn AuthoritativeSource,
        keep: &HashSet<ObjectId>,
        cancel: &CancellationToken,
    ) -> Vec<ReconcileRecord> {
        let discovered = match source.discover().await {
            Ok(ids) => ids,
            Err(error) => {
                warn!(error = %error, "Discovery failed, skipping deletion phase");
                return vec![ReconcileRecord::failed(
                    ObjectId::new(source.target_id().clone(), "*"),
                    None,
                    format!("discovery failed: {error}"),
                )];
            }
        };

        let candidates: Vec<ObjectId> = discovered
            .into_iter()
            .filter(|id| !keep.contains(&id.without_container()))
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }
        debug!(candidates = candidates.len(), "Computed deletion candidates");

        let mut records = Vec::new();
        for id in source.order_for_deletion(candidates) {
            if cancel.is_cancelled() {
                break;
            }
            let record = match source.delete(&id).await {
                Ok(true) => ReconcileRecord::ok(id, None, SyncOutcome::Deleted),
                Ok(false) => {
                    // Already absent; idempotent delete, nothing to report.
                    continue;
                }
                Err(error) => ReconcileRecord::failed(id, None, format!("delete failed: {error}")),
            };
            let failed = record.outcome.is_failed();
            records.push(record);
            if failed && self.config.error_policy == ErrorPolicy::ExitOnFirstError {
                break;
            }
        }
        records
    }

    fn outcome(
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        records: Vec<ReconcileRecord>,
        cancel: &CancellationToken,
    ) -> BulkOutcome {
        let mut stats = RunStatistics::new();
        for record in &records {
            stats.add(record);
        }
        let status = if cancel.is_cancelled() {
            RunStatus::Cancelled
        } else if stats.has_failures() {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        info!(
            run_id = %run_id,
            status = ?status,
            total = stats.total(),
            failed = stats.failed,
            deleted = stats.deleted,
            "Bulk pass finished"
        );
        BulkOutcome {
            run_id,
            status,
            records,
            stats,
            started_at,
            completed_at: Utc::now(),
        }
    }
}
