//! Single-object reconciliation
//!
//! Converges one identifier on one target: resolve the desired instances,
//! look up the observed state, detect renames, diff, and apply. This is the
//! unit of work both the bulk reconciler and the incremental processor
//! delegate to.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use accord_connector::changeset::{ChangeSet, MutationOp};
use accord_connector::error::TargetError;
use accord_connector::ids::ObjectId;
use accord_connector::object::ManagedObject;
use accord_connector::outcome::{OutcomeSink, SyncOutcome, TracingOutcomeSink};
use accord_connector::policy::PolicyConfig;
use accord_connector::schema::{classify, EntitySchema};
use accord_connector::traits::{Resolver, TargetAdapter};

use crate::config::EngineConfig;
use crate::differ::{DiffResult, ObjectDiffer};
use crate::error::{ReconcileError, ReconcileResult};
use crate::rename::RenameDetector;
use crate::report::ReconcileRecord;

/// Reconciles one identifier against one target.
pub struct SingleObjectReconciler {
    resolver: Arc<dyn Resolver>,
    policies: Arc<PolicyConfig>,
    /// Schemas used to classify observed records. Empty means the adapter's
    /// own schema tag is trusted as-is.
    schemas: Vec<EntitySchema>,
    sink: Arc<dyn OutcomeSink>,
    config: EngineConfig,
}

impl SingleObjectReconciler {
    /// Create a reconciler over a resolver and a policy tree.
    pub fn new(
        resolver: Arc<dyn Resolver>,
        policies: Arc<PolicyConfig>,
        config: EngineConfig,
    ) -> Self {
        Self {
            resolver,
            policies,
            schemas: Vec::new(),
            sink: Arc::new(TracingOutcomeSink),
            config,
        }
    }

    /// Classify observed records against these schemas instead of trusting
    /// the adapter's schema tag.
    #[must_use]
    pub fn with_schemas(mut self, schemas: Vec<EntitySchema>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Replace the outcome sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Reconcile every desired instance of one identifier.
    ///
    /// The resolver may yield one or several schema instances for the
    /// identifier; each is converged independently and produces its own
    /// record. An identifier that resolves to nothing is reported as failed
    /// with a not-found reason.
    #[instrument(skip(self, target, cancel), fields(target = %target.display_name()))]
    pub async fn reconcile(
        &self,
        id: &ObjectId,
        target: &dyn TargetAdapter,
        cancel: &CancellationToken,
    ) -> Vec<ReconcileRecord> {
        let desired = match self.resolver.resolve(id).await {
            Ok(desired) => desired,
            Err(source) => {
                let error = ReconcileError::from_resolve(id, source);
                let record = ReconcileRecord::failed(id.clone(), None, error.to_string());
                self.emit(&record);
                return vec![record];
            }
        };

        if desired.is_empty() {
            // An identifier the caller expected to provision resolved to
            // nothing; reported, never silently dropped.
            let record = ReconcileRecord::failed(
                id.clone(),
                None,
                ReconcileError::NoSuchIdentifier { id: id.clone() }.to_string(),
            );
            self.emit(&record);
            return vec![record];
        }

        let mut records = Vec::with_capacity(desired.len());
        for instance in &desired {
            if cancel.is_cancelled() {
                let record = ReconcileRecord::failed(
                    instance.id.clone(),
                    Some(instance.schema.clone()),
                    ReconcileError::Cancelled.to_string(),
                );
                self.emit(&record);
                records.push(record);
                break;
            }

            let record = match self.reconcile_instance(instance, target).await {
                Ok(record) => record,
                Err(error) => ReconcileRecord::failed(
                    instance.id.clone(),
                    Some(instance.schema.clone()),
                    error.to_string(),
                ),
            };
            self.emit(&record);
            records.push(record);
        }
        records
    }

    /// Re-synchronize one reference relation of one identifier.
    ///
    /// The incremental processor calls this for reference events so a single
    /// membership change does not force a whole-object diff. When the object
    /// is missing on the target the relation-scoped path cannot help and a
    /// full reconcile of the identifier runs instead.
    #[instrument(skip(self, target, cancel), fields(target = %target.display_name()))]
    pub async fn sync_relation(
        &self,
        id: &ObjectId,
        relation: &str,
        target: &dyn TargetAdapter,
        cancel: &CancellationToken,
    ) -> Vec<ReconcileRecord> {
        let desired = match self.resolver.resolve(id).await {
            Ok(desired) => desired,
            Err(source) => {
                let error = ReconcileError::from_resolve(id, source);
                let record = ReconcileRecord::failed(id.clone(), None, error.to_string());
                self.emit(&record);
                return vec![record];
            }
        };

        let mut records = Vec::with_capacity(desired.len());
        for instance in &desired {
            let record = match self.sync_relation_instance(instance, relation, target).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    // Object missing on the target: relation-scoped sync is
                    // meaningless, converge the whole instance.
                    records.extend(self.reconcile(&instance.id, target, cancel).await);
                    continue;
                }
                Err(error) => ReconcileRecord::failed(
                    instance.id.clone(),
                    Some(instance.schema.clone()),
                    error.to_string(),
                ),
            };
            self.emit(&record);
            records.push(record);
        }
        records
    }

    async fn reconcile_instance(
        &self,
        desired: &ManagedObject,
        target: &dyn TargetAdapter,
    ) -> ReconcileResult<ReconcileRecord> {
        let observed = target
            .lookup(&desired.id)
            .await
            .map_err(|e| ReconcileError::from_apply(&desired.id, e))?;

        match observed {
            None => self.reconcile_absent(desired, target).await,
            Some(observed) => {
                let observed = self.classified(observed)?;
                let applied = self.converge(desired, &observed, target).await?;
                let outcome = if applied == 0 {
                    SyncOutcome::Unchanged
                } else {
                    SyncOutcome::Updated
                };
                Ok(ReconcileRecord::ok(
                    desired.id.clone(),
                    Some(desired.schema.clone()),
                    outcome,
                )
                .with_applied(applied))
            }
        }
    }

    /// The desired identity does not exist on the target: rename an
    /// alternate identity into place when exactly one exists, otherwise
    /// materialize the object.
    async fn reconcile_absent(
        &self,
        desired: &ManagedObject,
        target: &dyn TargetAdapter,
    ) -> ReconcileResult<ReconcileRecord> {
        let Some(MutationOp::Rename { from, to }) = RenameDetector::detect(desired, target).await?
        else {
            return self.create(desired, target).await;
        };

        let rename = ChangeSet::new(
            from.clone(),
            vec![MutationOp::Rename {
                from: from.clone(),
                to,
            }],
        )
        .with_schema(&desired.schema);

        match target.apply(&rename).await {
            Ok(()) => {
                // Post-rename state is never inferred from the old record;
                // a fresh lookup feeds the diff.
                let observed = target
                    .lookup(&desired.id)
                    .await
                    .map_err(|e| ReconcileError::from_apply(&desired.id, e))?
                    .ok_or_else(|| {
                        ReconcileError::Apply {
                            id: desired.id.clone(),
                            source: TargetError::NotFound {
                                id: desired.id.clone(),
                            },
                        }
                    })?;
                let observed = self.classified(observed)?;
                let applied = self.converge(desired, &observed, target).await?;
                Ok(ReconcileRecord::ok(
                    desired.id.clone(),
                    Some(desired.schema.clone()),
                    SyncOutcome::Renamed,
                )
                .with_applied(applied + 1)
                .with_renamed_from(from))
            }
            Err(TargetError::RenameUnsupported { id }) => {
                warn!(
                    from = %from,
                    to = %desired.id,
                    unsupported_on = %id,
                    "Target cannot rename in place, falling back to create"
                );
                self.create(desired, target).await
            }
            Err(e) => Err(ReconcileError::from_apply(&desired.id, e)),
        }
    }

    async fn create(
        &self,
        desired: &ManagedObject,
        target: &dyn TargetAdapter,
    ) -> ReconcileResult<ReconcileRecord> {
        let object = self.materialized(desired);
        target
            .create(&object)
            .await
            .map_err(|e| ReconcileError::from_apply(&desired.id, e))?;
        debug!(id = %desired.id, schema = %desired.schema, "Materialized object");
        Ok(ReconcileRecord::ok(
            desired.id.clone(),
            Some(desired.schema.clone()),
            SyncOutcome::Created,
        ))
    }

    /// Diff `desired` against `observed` and apply the resulting change-sets.
    /// Returns how many were applied.
    async fn converge(
        &self,
        desired: &ManagedObject,
        observed: &ManagedObject,
        target: &dyn TargetAdapter,
    ) -> ReconcileResult<usize> {
        let mut differ = ObjectDiffer::new(&self.policies);
        if !self.config.include_references {
            differ = differ.attributes_only();
        }

        let sets = differ
            .diff(desired, observed, target.supports_bundled_mutations())?
            .into_changesets();
        for set in &sets {
            self.apply_with_retry(target, set).await?;
        }
        Ok(sets.len())
    }

    async fn sync_relation_instance(
        &self,
        desired: &ManagedObject,
        relation: &str,
        target: &dyn TargetAdapter,
    ) -> ReconcileResult<Option<ReconcileRecord>> {
        let Some(observed) = target
            .lookup(&desired.id)
            .await
            .map_err(|e| ReconcileError::from_apply(&desired.id, e))?
        else {
            return Ok(None);
        };
        let observed = self.classified(observed)?;

        let result = ObjectDiffer::new(&self.policies).diff_relation(
            desired,
            &observed,
            relation,
            target.supports_bundled_mutations(),
        )?;
        let record = match result {
            DiffResult::Unchanged => ReconcileRecord::ok(
                desired.id.clone(),
                Some(desired.schema.clone()),
                SyncOutcome::Unchanged,
            ),
            DiffResult::Changed(sets) => {
                for set in &sets {
                    self.apply_with_retry(target, set).await?;
                }
                ReconcileRecord::ok(
                    desired.id.clone(),
                    Some(desired.schema.clone()),
                    SyncOutcome::Updated,
                )
                .with_applied(sets.len())
            }
        };
        Ok(Some(record))
    }

    /// Apply one change-set, with the one-shot placeholder retry for
    /// reference cardinality violations.
    ///
    /// When the target refuses to empty a structurally required relation,
    /// the configured placeholder is inserted into that relation and the
    /// original change-set is retried exactly once. A second violation is
    /// reported as exhausted; without a configured placeholder the violation
    /// is fatal for this identifier.
    async fn apply_with_retry(
        &self,
        target: &dyn TargetAdapter,
        set: &ChangeSet,
    ) -> ReconcileResult<()> {
        match target.apply(set).await {
            Ok(()) => Ok(()),
            Err(TargetError::ReferenceCardinalityViolation { id, relation }) => {
                let policy = self.policies.reference(&relation);
                let Some(placeholder) = policy.empty_placeholder.clone() else {
                    return Err(ReconcileError::Apply {
                        id: id.clone(),
                        source: TargetError::ReferenceCardinalityViolation { id, relation },
                    });
                };

                debug!(
                    id = %id,
                    relation = %relation,
                    placeholder = %placeholder,
                    "Reference cardinality violation, inserting placeholder and retrying"
                );
                let mut insert = ChangeSet::new(
                    id.clone(),
                    vec![MutationOp::AddReference {
                        relation: relation.clone(),
                        to: ObjectId::new(id.target().clone(), placeholder),
                    }],
                );
                if let Some(schema) = &set.schema {
                    insert = insert.with_schema(schema.clone());
                }
                target
                    .apply(&insert)
                    .await
                    .map_err(|e| ReconcileError::from_apply(&id, e))?;

                match target.apply(set).await {
                    Ok(()) => Ok(()),
                    Err(TargetError::ReferenceCardinalityViolation { id, relation }) => {
                        Err(ReconcileError::ReferenceCardinalityExhausted { id, relation })
                    }
                    Err(e) => Err(ReconcileError::from_apply(&set.id, e)),
                }
            }
            Err(e) => Err(ReconcileError::from_apply(&set.id, e)),
        }
    }

    /// Copy of `desired` with placeholders inserted into every empty
    /// required relation, so creation never trips the target's cardinality
    /// check in the first place.
    fn materialized(&self, desired: &ManagedObject) -> ManagedObject {
        let mut object = desired.clone();

        let declared = self
            .schemas
            .iter()
            .find(|s| s.name == desired.schema)
            .map(|s| s.references.clone())
            .unwrap_or_default();
        for relation in declared
            .iter()
            .map(String::as_str)
            .chain(desired.reference_relations())
        {
            let empty = object
                .references
                .get(relation)
                .map_or(true, Vec::is_empty);
            if !empty {
                continue;
            }
            if let Some(placeholder) = &self.policies.reference(relation).empty_placeholder {
                object.references.insert(
                    relation.to_string(),
                    vec![ObjectId::new(desired.id.target().clone(), placeholder.clone())],
                );
            }
        }
        object
    }

    /// Re-tag an observed record with its classified schema, when schemas
    /// are configured.
    fn classified(&self, observed: ManagedObject) -> ReconcileResult<ManagedObject> {
        if self.schemas.is_empty() {
            return Ok(observed);
        }
        let schema = classify(&observed, &self.schemas)?;
        Ok(ManagedObject {
            schema: schema.name.clone(),
            ..observed
        })
    }

    fn emit(&self, record: &ReconcileRecord) {
        self.sink.record(
            &record.id,
            record.schema.as_deref(),
            record.outcome,
            record.error.as_deref(),
        );
    }
}
