//! Engine error taxonomy
//!
//! Per-identifier and per-event failure classification. A failure never
//! aborts sibling identifiers or events unless the caller selected
//! exit-on-first-error for a bulk pass.

use thiserror::Error;

use accord_connector::error::{ResolveError, TargetError};
use accord_connector::ids::ObjectId;
use accord_connector::schema::ClassifyError;

/// Error raised while reconciling one identifier or event.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The resolver found nothing for an identifier expected to exist.
    /// Recoverable: reported, not retried within the same pass.
    #[error("no such identifier: {id}")]
    NoSuchIdentifier { id: ObjectId },

    /// Desired and observed objects disagree on schema. Fatal configuration
    /// error for this identifier; never silently resolved.
    #[error("schema mismatch for {id}: desired '{desired}', observed '{observed}'")]
    SchemaMismatch {
        id: ObjectId,
        desired: String,
        observed: String,
    },

    /// An observed record matched zero or multiple schemas. Fatal
    /// configuration error for the target.
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// The placeholder-insert retry was already spent and the target still
    /// reports a reference cardinality violation.
    #[error("reference cardinality violation persisted after placeholder retry on {id}")]
    ReferenceCardinalityExhausted { id: ObjectId, relation: String },

    /// The target rejected a mutation.
    #[error("apply failed for {id}: {source}")]
    Apply {
        id: ObjectId,
        #[source]
        source: TargetError,
    },

    /// The resolver failed.
    #[error("resolve failed for {id}: {source}")]
    Resolve {
        id: ObjectId,
        #[source]
        source: ResolveError,
    },

    /// A bulk pass was requested while another pass or an event batch
    /// already holds the reconciler state.
    #[error("another reconciliation pass is already running")]
    ReconcilerBusy,

    /// The resolver failed to enumerate the desired identifier universe.
    #[error("failed to enumerate desired identifiers: {source}")]
    Enumerate {
        #[source]
        source: ResolveError,
    },

    /// The caller cancelled the pass or batch.
    #[error("reconciliation cancelled")]
    Cancelled,

    /// An event batch was not strictly ascending by sequence.
    #[error("event batch out of order: sequence {sequence} after {previous}")]
    OutOfOrderBatch { sequence: i64, previous: i64 },

    /// Checkpoint store failure.
    #[error("checkpoint store error: {source}")]
    Checkpoint {
        #[source]
        source: TargetError,
    },
}

impl ReconcileError {
    /// Wrap a resolver error, mapping its not-found case onto the engine's
    /// own variant so callers can distinguish "nothing to provision" from
    /// "provisioning failed".
    pub fn from_resolve(id: &ObjectId, source: ResolveError) -> Self {
        match source {
            ResolveError::NoSuchIdentifier { id } => ReconcileError::NoSuchIdentifier { id },
            other => ReconcileError::Resolve {
                id: id.clone(),
                source: other,
            },
        }
    }

    /// Wrap a target error from an apply.
    pub fn from_apply(id: &ObjectId, source: TargetError) -> Self {
        ReconcileError::Apply {
            id: id.clone(),
            source,
        }
    }

    /// Whether this failure stems from static configuration rather than
    /// runtime state.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ReconcileError::SchemaMismatch { .. } | ReconcileError::Classify(_)
        )
    }
}

/// Result type for engine operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_resolve_maps_not_found() {
        let id = ObjectId::new("ldap", "cn=ghost");
        let err = ReconcileError::from_resolve(
            &id,
            ResolveError::NoSuchIdentifier { id: id.clone() },
        );
        assert!(matches!(err, ReconcileError::NoSuchIdentifier { .. }));

        let err = ReconcileError::from_resolve(&id, ResolveError::failure("db down"));
        assert!(matches!(err, ReconcileError::Resolve { .. }));
    }

    #[test]
    fn test_config_error_classification() {
        let mismatch = ReconcileError::SchemaMismatch {
            id: ObjectId::new("ldap", "cn=staff"),
            desired: "group".into(),
            observed: "container".into(),
        };
        assert!(mismatch.is_config_error());
        assert!(!ReconcileError::Cancelled.is_config_error());
    }
}
