//! Whole-object diffing
//!
//! Diffs one managed object against its observed counterpart into an ordered
//! change-set, then bundles or unbundles it per the target's capability.

use tracing::debug;

use accord_connector::changeset::{ChangeSet, MutationOp};
use accord_connector::object::ManagedObject;
use accord_connector::policy::PolicyConfig;

use crate::error::{ReconcileError, ReconcileResult};
use crate::valueset::ValueSetReconciler;

/// Result of diffing one object.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffResult {
    /// Observed state already matches the desired state.
    Unchanged,
    /// Change-sets to apply, in order.
    Changed(Vec<ChangeSet>),
}

impl DiffResult {
    /// Whether the diff found anything to do.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, DiffResult::Unchanged)
    }

    /// The change-sets, empty when unchanged.
    pub fn into_changesets(self) -> Vec<ChangeSet> {
        match self {
            DiffResult::Unchanged => Vec::new(),
            DiffResult::Changed(sets) => sets,
        }
    }
}

/// Diffs whole managed objects field by field.
pub struct ObjectDiffer<'a> {
    policies: &'a PolicyConfig,
    /// Whether reference relations are in reconciliation scope.
    include_references: bool,
}

impl<'a> ObjectDiffer<'a> {
    /// Create a differ over a policy tree.
    pub fn new(policies: &'a PolicyConfig) -> Self {
        Self {
            policies,
            include_references: true,
        }
    }

    /// Exclude reference relations from diffing.
    #[must_use]
    pub fn attributes_only(mut self) -> Self {
        self.include_references = false;
        self
    }

    /// Diff `desired` against `observed` for the same identifier.
    ///
    /// Both objects must report the same schema; a mismatch is a fatal
    /// configuration error, never silently resolved. Fields are walked in
    /// the desired object's declared order first, then observed-only fields
    /// in the observed object's order; attribute operations precede
    /// reference operations.
    pub fn diff(
        &self,
        desired: &ManagedObject,
        observed: &ManagedObject,
        supports_bundled_mutations: bool,
    ) -> ReconcileResult<DiffResult> {
        if desired.schema != observed.schema {
            return Err(ReconcileError::SchemaMismatch {
                id: desired.id.clone(),
                desired: desired.schema.clone(),
                observed: observed.schema.clone(),
            });
        }

        let reconciler = ValueSetReconciler::new(self.policies);
        let mut ops: Vec<MutationOp> = Vec::new();

        for field in Self::field_union(
            desired.attribute_fields(),
            observed.attribute_fields(),
        ) {
            ops.extend(reconciler.diff_attribute(
                field,
                observed.attribute(field),
                desired.attribute(field),
            ));
        }

        if self.include_references {
            for relation in Self::field_union(
                desired.reference_relations(),
                observed.reference_relations(),
            ) {
                ops.extend(reconciler.diff_reference(
                    relation,
                    observed.reference(relation),
                    desired.reference(relation),
                ));
            }
        }

        if ops.is_empty() {
            return Ok(DiffResult::Unchanged);
        }

        debug!(
            id = %desired.id,
            schema = %desired.schema,
            op_count = ops.len(),
            bundled = supports_bundled_mutations,
            "Computed object diff"
        );

        let changeset = ChangeSet::new(desired.id.clone(), ops).with_schema(&desired.schema);
        let sets = if supports_bundled_mutations {
            vec![changeset]
        } else {
            changeset.unbundle()
        };
        Ok(DiffResult::Changed(sets))
    }

    /// Diff a single reference relation of `desired` against `observed`.
    ///
    /// Used by the incremental processor to recompute just the relation a
    /// reference event touched.
    pub fn diff_relation(
        &self,
        desired: &ManagedObject,
        observed: &ManagedObject,
        relation: &str,
        supports_bundled_mutations: bool,
    ) -> ReconcileResult<DiffResult> {
        if desired.schema != observed.schema {
            return Err(ReconcileError::SchemaMismatch {
                id: desired.id.clone(),
                desired: desired.schema.clone(),
                observed: observed.schema.clone(),
            });
        }

        let reconciler = ValueSetReconciler::new(self.policies);
        let ops = reconciler.diff_reference(
            relation,
            observed.reference(relation),
            desired.reference(relation),
        );
        if ops.is_empty() {
            return Ok(DiffResult::Unchanged);
        }

        let changeset = ChangeSet::new(desired.id.clone(), ops).with_schema(&desired.schema);
        let sets = if supports_bundled_mutations {
            vec![changeset]
        } else {
            changeset.unbundle()
        };
        Ok(DiffResult::Changed(sets))
    }

    /// Desired field names first, in declared order, then observed-only
    /// names in their own order. Stable, never hash order.
    fn field_union<'f>(
        desired: impl Iterator<Item = &'f str>,
        observed: impl Iterator<Item = &'f str>,
    ) -> Vec<&'f str> {
        let mut fields: Vec<&str> = desired.collect();
        for field in observed {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_connector::ids::ObjectId;
    use accord_connector::policy::AttributePolicy;

    fn group(local: &str) -> ManagedObject {
        ManagedObject::new(ObjectId::new("ldap", local), "group")
    }

    #[test]
    fn test_self_diff_is_unchanged() {
        let object = group("cn=staff")
            .with_attribute("description", ["All staff"])
            .with_reference("member", [ObjectId::new("ldap", "uid=alice")]);
        let policies = PolicyConfig::new();

        let result = ObjectDiffer::new(&policies)
            .diff(&object, &object, true)
            .unwrap();
        assert!(result.is_unchanged());
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let desired = group("cn=staff");
        let observed = ManagedObject::new(ObjectId::new("ldap", "cn=staff"), "container");
        let policies = PolicyConfig::new();

        let err = ObjectDiffer::new(&policies)
            .diff(&desired, &observed, true)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_attribute_ops_precede_reference_ops() {
        let desired = group("cn=staff")
            .with_attribute("description", ["fresh"])
            .with_reference("member", [ObjectId::new("ldap", "uid=alice")]);
        let observed = group("cn=staff")
            .with_attribute("description", ["stale"])
            .with_reference("member", [ObjectId::new("ldap", "uid=bob")]);
        let policies = PolicyConfig::new();

        let sets = ObjectDiffer::new(&policies)
            .diff(&desired, &observed, true)
            .unwrap()
            .into_changesets();
        assert_eq!(sets.len(), 1);

        let ops = &sets[0].ops;
        let first_reference = ops
            .iter()
            .position(|op| matches!(op, MutationOp::AddReference { .. } | MutationOp::RemoveReference { .. }))
            .unwrap();
        let last_attribute = ops
            .iter()
            .rposition(|op| matches!(op, MutationOp::AddValue { .. } | MutationOp::RemoveValue { .. }))
            .unwrap();
        assert!(last_attribute < first_reference);
    }

    #[test]
    fn test_observed_only_field_is_cleared() {
        let desired = group("cn=staff");
        let observed = group("cn=staff").with_attribute("mail", ["stale@example.com"]);
        let policies = PolicyConfig::new();

        let sets = ObjectDiffer::new(&policies)
            .diff(&desired, &observed, true)
            .unwrap()
            .into_changesets();
        assert_eq!(
            sets[0].ops,
            vec![MutationOp::RemoveValue {
                field: "mail".into(),
                value: "stale@example.com".into()
            }]
        );
    }

    #[test]
    fn test_unbundled_emits_one_set_per_op() {
        let desired = group("cn=staff").with_attribute("description", ["a", "b"]);
        let observed = group("cn=staff").with_attribute("description", ["c"]);
        let policies = PolicyConfig::new();

        let sets = ObjectDiffer::new(&policies)
            .diff(&desired, &observed, false)
            .unwrap()
            .into_changesets();
        assert_eq!(sets.len(), 3);
        assert!(sets.iter().all(|s| s.ops.len() == 1));
    }

    #[test]
    fn test_attributes_only_skips_references() {
        let desired = group("cn=staff").with_reference("member", [ObjectId::new("ldap", "uid=a")]);
        let observed = group("cn=staff").with_reference("member", [ObjectId::new("ldap", "uid=b")]);
        let policies = PolicyConfig::new();

        let result = ObjectDiffer::new(&policies)
            .attributes_only()
            .diff(&desired, &observed, true)
            .unwrap();
        assert!(result.is_unchanged());
    }

    #[test]
    fn test_deterministic_field_order() {
        let desired = group("cn=staff")
            .with_attribute("description", ["d"])
            .with_attribute("mail", ["m"]);
        let observed = group("cn=staff").with_attribute("owner", ["o"]);
        let policies = PolicyConfig::new()
            .with_attribute_policy("description", AttributePolicy::replace_wholesale());

        let sets = ObjectDiffer::new(&policies)
            .diff(&desired, &observed, true)
            .unwrap()
            .into_changesets();
        let fields: Vec<&str> = sets[0].ops.iter().filter_map(MutationOp::field).collect();
        // Desired declared order first, observed-only fields after.
        assert_eq!(fields, vec!["description", "mail", "owner"]);
    }
}
