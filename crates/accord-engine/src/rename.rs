//! Rename detection
//!
//! Decides whether an identifier change should be expressed as a rename
//! mutation or fall through to delete/create semantics. Renames are
//! structural identity changes applied before any field diffing; post-rename
//! state is computed as a fresh diff against the re-identified record.

use tracing::{debug, warn};

use accord_connector::changeset::MutationOp;
use accord_connector::object::ManagedObject;
use accord_connector::traits::TargetAdapter;

use crate::error::{ReconcileError, ReconcileResult};

/// Detects pending renames from a desired object's alternate identities.
pub struct RenameDetector;

impl RenameDetector {
    /// Decide whether `desired` should be renamed into place.
    ///
    /// Returns the rename mutation when exactly one alternate identity
    /// exists on the target and the desired identity does not. Ambiguity
    /// (several alternates present) is never guessed at: it is logged and
    /// skipped, and the caller proceeds to the create path.
    pub async fn detect(
        desired: &ManagedObject,
        target: &dyn TargetAdapter,
    ) -> ReconcileResult<Option<MutationOp>> {
        if desired.alternate_ids.is_empty() {
            return Ok(None);
        }

        // Desired identity already present: nothing to rename into.
        if target
            .exists(&desired.id)
            .await
            .map_err(|e| ReconcileError::from_apply(&desired.id, e))?
        {
            return Ok(None);
        }

        let mut candidates = Vec::new();
        for alternate in &desired.alternate_ids {
            if target
                .exists(alternate)
                .await
                .map_err(|e| ReconcileError::from_apply(alternate, e))?
            {
                candidates.push(alternate.clone());
            }
        }

        match candidates.len() {
            0 => {
                debug!(id = %desired.id, "No alternate identity found on target, create path");
                Ok(None)
            }
            1 => {
                let from = candidates.remove(0);
                debug!(from = %from, to = %desired.id, "Detected rename");
                Ok(Some(MutationOp::Rename {
                    from,
                    to: desired.id.clone(),
                }))
            }
            _ => {
                warn!(
                    id = %desired.id,
                    candidates = ?candidates.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "Ambiguous rename: multiple alternate identities exist, skipping"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_connector::async_trait;
    use accord_connector::changeset::ChangeSet;
    use accord_connector::error::TargetResult;
    use accord_connector::ids::{ObjectId, TargetId};
    use std::collections::HashSet;

    struct ExistsTarget {
        id: TargetId,
        present: HashSet<ObjectId>,
    }

    impl ExistsTarget {
        fn holding(ids: &[ObjectId]) -> Self {
            Self {
                id: TargetId::new("ldap"),
                present: ids.iter().cloned().collect(),
            }
        }
    }

    #[async_trait]
    impl TargetAdapter for ExistsTarget {
        fn target_id(&self) -> &TargetId {
            &self.id
        }

        fn display_name(&self) -> &str {
            "exists-only"
        }

        async fn lookup(&self, id: &ObjectId) -> TargetResult<Option<ManagedObject>> {
            Ok(self
                .present
                .get(id)
                .map(|id| ManagedObject::new(id.clone(), "group")))
        }

        async fn create(&self, _object: &ManagedObject) -> TargetResult<()> {
            unreachable!("detector never creates")
        }

        async fn apply(&self, _changes: &ChangeSet) -> TargetResult<()> {
            unreachable!("detector never applies")
        }

        async fn delete(&self, _id: &ObjectId) -> TargetResult<bool> {
            unreachable!("detector never deletes")
        }
    }

    fn desired_with_alternates(alternates: &[&str]) -> ManagedObject {
        let mut object = ManagedObject::new(ObjectId::new("ldap", "cn=employees"), "group");
        for alt in alternates {
            object = object.with_alternate_id(ObjectId::new("ldap", *alt));
        }
        object
    }

    #[tokio::test]
    async fn test_no_alternates_no_rename() {
        let target = ExistsTarget::holding(&[]);
        let desired = desired_with_alternates(&[]);
        assert!(RenameDetector::detect(&desired, &target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_existing_alternate_yields_rename() {
        let target = ExistsTarget::holding(&[ObjectId::new("ldap", "cn=staff")]);
        let desired = desired_with_alternates(&["cn=staff"]);

        let op = RenameDetector::detect(&desired, &target).await.unwrap();
        assert_eq!(
            op,
            Some(MutationOp::Rename {
                from: ObjectId::new("ldap", "cn=staff"),
                to: ObjectId::new("ldap", "cn=employees"),
            })
        );
    }

    #[tokio::test]
    async fn test_desired_already_exists_no_rename() {
        let target = ExistsTarget::holding(&[
            ObjectId::new("ldap", "cn=employees"),
            ObjectId::new("ldap", "cn=staff"),
        ]);
        let desired = desired_with_alternates(&["cn=staff"]);
        assert!(RenameDetector::detect(&desired, &target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_existing_alternate_falls_to_create() {
        let target = ExistsTarget::holding(&[]);
        let desired = desired_with_alternates(&["cn=staff", "cn=old-staff"]);
        assert!(RenameDetector::detect(&desired, &target).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ambiguous_alternates_skipped() {
        let target = ExistsTarget::holding(&[
            ObjectId::new("ldap", "cn=staff"),
            ObjectId::new("ldap", "cn=old-staff"),
        ]);
        let desired = desired_with_alternates(&["cn=staff", "cn=old-staff"]);
        assert!(RenameDetector::detect(&desired, &target).await.unwrap().is_none());
    }
}
