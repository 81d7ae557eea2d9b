//! Value-set reconciliation
//!
//! Diffs one multi-valued field between its current and desired value sets,
//! applying the field's retention/replacement policy. Membership is exact
//! string equality (lowercased first for case-insensitive relations); no
//! fuzzy matching, ever.

use accord_connector::changeset::MutationOp;
use accord_connector::ids::ObjectId;
use accord_connector::policy::{PolicyConfig, ReferencePolicy};

/// Per-field diff engine.
///
/// Borrows the deployment's policy tree; one instance serves a whole diff.
pub struct ValueSetReconciler<'a> {
    policies: &'a PolicyConfig,
}

impl<'a> ValueSetReconciler<'a> {
    /// Create a reconciler over a policy tree.
    pub fn new(policies: &'a PolicyConfig) -> Self {
        Self { policies }
    }

    /// Diff one attribute field.
    ///
    /// `current` of `None` means the field does not exist on the target;
    /// `desired` of `None` means the field is not applicable. Values present
    /// in desired but not current become additions; values present in
    /// current but not desired become removals, unless the field retains all
    /// existing values. A wholesale-replace field collapses everything into
    /// one replace operation.
    pub fn diff_attribute(
        &self,
        field: &str,
        current: Option<&[String]>,
        desired: Option<&[String]>,
    ) -> Vec<MutationOp> {
        let policy = self.policies.attribute(field);
        let current_values = current.unwrap_or(&[]);
        let desired_values = desired.unwrap_or(&[]);

        // Absent on target and nothing desired: nothing to do.
        if current.is_none() && desired_values.is_empty() {
            return Vec::new();
        }

        // Stale values go first so a later addition can reuse a value slot
        // on targets that treat attribute values as unique.
        let mut ops = Vec::new();
        if !policy.retain_all {
            for value in current_values {
                if !desired_values.contains(value) {
                    ops.push(MutationOp::RemoveValue {
                        field: field.to_string(),
                        value: value.clone(),
                    });
                }
            }
        }
        for value in desired_values {
            if !current_values.contains(value) {
                ops.push(MutationOp::AddValue {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }

        if policy.replace_wholesale && !ops.is_empty() {
            return vec![MutationOp::ReplaceValues {
                field: field.to_string(),
                values: desired_values.to_vec(),
            }];
        }

        ops
    }

    /// Diff one reference relation.
    ///
    /// Case-insensitive relations lowercase the local identifier for
    /// membership testing only; emitted operations keep original casing.
    /// A relation's empty placeholder is structural filler, not membership:
    /// it is never removed while the desired set is empty, and is removed
    /// like any stale value once real references exist.
    pub fn diff_reference(
        &self,
        relation: &str,
        current: Option<&[ObjectId]>,
        desired: Option<&[ObjectId]>,
    ) -> Vec<MutationOp> {
        let policy = self.policies.reference(relation);
        let current_refs = current.unwrap_or(&[]);
        let desired_refs = desired.unwrap_or(&[]);

        if current.is_none() && desired_refs.is_empty() {
            return Vec::new();
        }

        let current_keys: Vec<String> = current_refs
            .iter()
            .map(|id| Self::membership_key(id, policy))
            .collect();
        let desired_keys: Vec<String> = desired_refs
            .iter()
            .map(|id| Self::membership_key(id, policy))
            .collect();

        // Additions go first so a relation the target requires non-empty is
        // never transiently emptied by the removal of its last stale value.
        let mut ops = Vec::new();
        for (reference, key) in desired_refs.iter().zip(&desired_keys) {
            if !current_keys.contains(key) {
                ops.push(MutationOp::AddReference {
                    relation: relation.to_string(),
                    to: reference.clone(),
                });
            }
        }
        for (reference, key) in current_refs.iter().zip(&current_keys) {
            if desired_keys.contains(key) {
                continue;
            }
            if desired_refs.is_empty() && Self::is_placeholder(reference, policy) {
                continue;
            }
            ops.push(MutationOp::RemoveReference {
                relation: relation.to_string(),
                to: reference.clone(),
            });
        }

        ops
    }

    // Keyed on target plus local so membership agrees with ObjectId
    // equality; only the local part is case-folded.
    fn membership_key(id: &ObjectId, policy: &ReferencePolicy) -> String {
        if policy.case_sensitive {
            format!("{}:{}", id.target(), id.local())
        } else {
            format!("{}:{}", id.target(), id.local().to_lowercase())
        }
    }

    fn is_placeholder(id: &ObjectId, policy: &ReferencePolicy) -> bool {
        match &policy.empty_placeholder {
            Some(placeholder) if policy.case_sensitive => id.local() == placeholder,
            Some(placeholder) => id.local().eq_ignore_ascii_case(placeholder),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_connector::policy::{AttributePolicy, ReferencePolicy};

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn refs(items: &[&str]) -> Vec<ObjectId> {
        items.iter().map(|v| ObjectId::new("ldap", *v)).collect()
    }

    #[test]
    fn test_add_and_remove() {
        // current {A,B}, desired {B,C} -> remove A, add C
        let policies = PolicyConfig::new();
        let reconciler = ValueSetReconciler::new(&policies);

        let ops = reconciler.diff_attribute(
            "member",
            Some(&values(&["A", "B"])),
            Some(&values(&["B", "C"])),
        );
        assert_eq!(
            ops,
            vec![
                MutationOp::RemoveValue {
                    field: "member".into(),
                    value: "A".into()
                },
                MutationOp::AddValue {
                    field: "member".into(),
                    value: "C".into()
                },
            ]
        );
    }

    #[test]
    fn test_absent_current_empty_desired_is_noop() {
        let policies = PolicyConfig::new().with_reference_policy(
            "member",
            ReferencePolicy::default().with_placeholder("cn=_none_"),
        );
        let reconciler = ValueSetReconciler::new(&policies);

        assert!(reconciler.diff_reference("member", None, Some(&[])).is_empty());
        assert!(reconciler.diff_attribute("mail", None, None).is_empty());
    }

    #[test]
    fn test_retain_all_never_removes() {
        let policies =
            PolicyConfig::new().with_attribute_policy("seeAlso", AttributePolicy::retain_all());
        let reconciler = ValueSetReconciler::new(&policies);

        let ops = reconciler.diff_attribute(
            "seeAlso",
            Some(&values(&["old-1", "old-2"])),
            Some(&values(&["new"])),
        );
        assert_eq!(
            ops,
            vec![MutationOp::AddValue {
                field: "seeAlso".into(),
                value: "new".into()
            }]
        );
    }

    #[test]
    fn test_replace_wholesale_collapses() {
        let policies = PolicyConfig::new()
            .with_attribute_policy("description", AttributePolicy::replace_wholesale());
        let reconciler = ValueSetReconciler::new(&policies);

        let ops = reconciler.diff_attribute(
            "description",
            Some(&values(&["stale"])),
            Some(&values(&["fresh", "extra"])),
        );
        assert_eq!(
            ops,
            vec![MutationOp::ReplaceValues {
                field: "description".into(),
                values: values(&["fresh", "extra"]),
            }]
        );
    }

    #[test]
    fn test_replace_wholesale_noop_when_equal() {
        let policies = PolicyConfig::new()
            .with_attribute_policy("description", AttributePolicy::replace_wholesale());
        let reconciler = ValueSetReconciler::new(&policies);

        let ops = reconciler.diff_attribute(
            "description",
            Some(&values(&["same"])),
            Some(&values(&["same"])),
        );
        assert!(ops.is_empty());
    }

    #[test]
    fn test_case_insensitive_membership_preserves_casing() {
        let policies =
            PolicyConfig::new().with_reference_policy("member", ReferencePolicy::case_insensitive());
        let reconciler = ValueSetReconciler::new(&policies);

        // Same member, different case: no ops.
        let ops = reconciler.diff_reference(
            "member",
            Some(&refs(&["UID=Alice"])),
            Some(&refs(&["uid=alice"])),
        );
        assert!(ops.is_empty());

        // A genuinely new member keeps its original casing in the op.
        let ops = reconciler.diff_reference(
            "member",
            Some(&refs(&["UID=Alice"])),
            Some(&refs(&["uid=alice", "UID=Bob"])),
        );
        assert_eq!(
            ops,
            vec![MutationOp::AddReference {
                relation: "member".into(),
                to: ObjectId::new("ldap", "UID=Bob"),
            }]
        );
    }

    #[test]
    fn test_same_local_on_different_targets_is_distinct() {
        let policies = PolicyConfig::new();
        let reconciler = ValueSetReconciler::new(&policies);

        let ops = reconciler.diff_reference(
            "member",
            Some(&[ObjectId::new("ldap-west", "uid=alice")]),
            Some(&[ObjectId::new("ldap-east", "uid=alice")]),
        );
        assert_eq!(
            ops,
            vec![
                MutationOp::AddReference {
                    relation: "member".into(),
                    to: ObjectId::new("ldap-east", "uid=alice"),
                },
                MutationOp::RemoveReference {
                    relation: "member".into(),
                    to: ObjectId::new("ldap-west", "uid=alice"),
                },
            ]
        );
    }

    #[test]
    fn test_placeholder_not_removed_when_desired_empty() {
        let policies = PolicyConfig::new().with_reference_policy(
            "member",
            ReferencePolicy::default().with_placeholder("cn=_none_"),
        );
        let reconciler = ValueSetReconciler::new(&policies);

        let ops = reconciler.diff_reference("member", Some(&refs(&["cn=_none_"])), Some(&[]));
        assert!(ops.is_empty());
    }

    #[test]
    fn test_placeholder_removed_when_real_members_arrive() {
        let policies = PolicyConfig::new().with_reference_policy(
            "member",
            ReferencePolicy::default().with_placeholder("cn=_none_"),
        );
        let reconciler = ValueSetReconciler::new(&policies);

        let ops = reconciler.diff_reference(
            "member",
            Some(&refs(&["cn=_none_"])),
            Some(&refs(&["uid=alice"])),
        );
        assert_eq!(
            ops,
            vec![
                MutationOp::AddReference {
                    relation: "member".into(),
                    to: ObjectId::new("ldap", "uid=alice"),
                },
                MutationOp::RemoveReference {
                    relation: "member".into(),
                    to: ObjectId::new("ldap", "cn=_none_"),
                },
            ]
        );
    }
}
