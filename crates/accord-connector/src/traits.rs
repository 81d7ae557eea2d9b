//! Collaborator contracts
//!
//! Capability-based trait definitions for target adapters, the
//! source-of-truth resolver, checkpoint persistence, and outcome reporting.
//! Each operation has an explicit interface; adapters implement only what
//! their target supports.

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::changeset::ChangeSet;
use crate::error::{ResolveResult, TargetResult};
use crate::ids::{ObjectId, TargetId};
use crate::object::ManagedObject;

/// A downstream target system.
///
/// Lookup, creation, mutation, and deletion of managed objects. All calls are
/// blocking I/O toward the target; implementations must honor whatever
/// deadline their transport carries so a stuck target cannot hang a pass.
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Identifier of this target.
    fn target_id(&self) -> &TargetId;

    /// Human-readable name for logs.
    fn display_name(&self) -> &str;

    /// Whether the target accepts one bundled change-set with every
    /// mutation, or needs one request per value-level operation.
    fn supports_bundled_mutations(&self) -> bool {
        false
    }

    /// Fetch the observed object at an identifier, if present.
    async fn lookup(&self, id: &ObjectId) -> TargetResult<Option<ManagedObject>>;

    /// Whether an object exists at the identifier.
    ///
    /// Adapters with a cheaper existence probe than a full lookup should
    /// override this.
    async fn exists(&self, id: &ObjectId) -> TargetResult<bool> {
        Ok(self.lookup(id).await?.is_some())
    }

    /// Materialize a full desired object on the target.
    async fn create(&self, object: &ManagedObject) -> TargetResult<()>;

    /// Apply one change-set.
    ///
    /// Must report [`TargetError::ReferenceCardinalityViolation`] when a
    /// mutation would leave a structurally required relation empty, and
    /// [`TargetError::RenameUnsupported`] when the target cannot rename the
    /// object in place.
    ///
    /// [`TargetError::ReferenceCardinalityViolation`]: crate::error::TargetError::ReferenceCardinalityViolation
    /// [`TargetError::RenameUnsupported`]: crate::error::TargetError::RenameUnsupported
    async fn apply(&self, changes: &ChangeSet) -> TargetResult<()>;

    /// Delete the object at an identifier.
    ///
    /// Idempotent: returns `Ok(false)` when the object was already absent.
    async fn delete(&self, id: &ObjectId) -> TargetResult<bool>;
}

/// A target whose full identifier inventory is trusted for deletion.
///
/// Targets opt in to deletion consideration by implementing this discovery
/// capability; observed identifiers on non-authoritative targets are never
/// deletion candidates.
#[async_trait]
pub trait AuthoritativeSource: TargetAdapter {
    /// Enumerate every identifier currently held by the target.
    ///
    /// Returned identifiers must not carry container scope.
    async fn discover(&self) -> TargetResult<Vec<ObjectId>>;

    /// Order deletion candidates so children precede their parents.
    ///
    /// Target-specific: a directory orders deepest path first, a flat group
    /// store may return the input unchanged.
    fn order_for_deletion(&self, candidates: Vec<ObjectId>) -> Vec<ObjectId>;
}

/// The source-of-truth attribute resolver.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Compute the desired objects for one identifier.
    ///
    /// Zero, one, or several schema instances may apply; each is reconciled
    /// independently. An identifier the resolver knows nothing about yields
    /// `ResolveError::NoSuchIdentifier`.
    async fn resolve(&self, id: &ObjectId) -> ResolveResult<Vec<ManagedObject>>;

    /// Enumerate the full desired identifier universe, with the schema names
    /// that apply to each identifier.
    async fn resolve_all(&self) -> ResolveResult<IndexMap<ObjectId, Vec<String>>>;
}

/// Persistence for the incremental processor's checkpoint.
///
/// The engine reads and advances the sequence number; durability is the
/// caller's concern.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last fully processed sequence number.
    async fn load(&self) -> TargetResult<i64>;

    /// Persist a newly reached sequence number.
    async fn save(&self, sequence: i64) -> TargetResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TargetError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticTarget {
        id: TargetId,
        objects: Mutex<HashMap<ObjectId, ManagedObject>>,
    }

    impl StaticTarget {
        fn with_object(object: ManagedObject) -> Self {
            let mut objects = HashMap::new();
            objects.insert(object.id.clone(), object);
            Self {
                id: TargetId::new("static"),
                objects: Mutex::new(objects),
            }
        }
    }

    #[async_trait]
    impl TargetAdapter for StaticTarget {
        fn target_id(&self) -> &TargetId {
            &self.id
        }

        fn display_name(&self) -> &str {
            "static"
        }

        async fn lookup(&self, id: &ObjectId) -> TargetResult<Option<ManagedObject>> {
            Ok(self.objects.lock().unwrap().get(id).cloned())
        }

        async fn create(&self, object: &ManagedObject) -> TargetResult<()> {
            let mut objects = self.objects.lock().unwrap();
            if objects.contains_key(&object.id) {
                return Err(TargetError::AlreadyExists {
                    id: object.id.clone(),
                });
            }
            objects.insert(object.id.clone(), object.clone());
            Ok(())
        }

        async fn apply(&self, _changes: &ChangeSet) -> TargetResult<()> {
            Ok(())
        }

        async fn delete(&self, id: &ObjectId) -> TargetResult<bool> {
            Ok(self.objects.lock().unwrap().remove(id).is_some())
        }
    }

    #[tokio::test]
    async fn test_default_exists_uses_lookup() {
        let object = ManagedObject::new(ObjectId::new("static", "cn=staff"), "group");
        let target = StaticTarget::with_object(object);

        assert!(target.exists(&ObjectId::new("static", "cn=staff")).await.unwrap());
        assert!(!target.exists(&ObjectId::new("static", "cn=ghost")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let object = ManagedObject::new(ObjectId::new("static", "cn=staff"), "group");
        let target = StaticTarget::with_object(object);
        let id = ObjectId::new("static", "cn=staff");

        assert!(target.delete(&id).await.unwrap());
        assert!(!target.delete(&id).await.unwrap());
    }
}
