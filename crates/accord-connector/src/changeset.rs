//! Mutations and change-sets
//!
//! A `ChangeSet` is the ordered list of mutations the engine wants applied to
//! one object. Targets that support bundled mutations receive one set with
//! every operation; others receive one set per value-level operation, each
//! separately applicable and separately retriable.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ObjectId;

/// One mutation against a managed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationOp {
    /// Add a value to a multi-valued attribute field.
    AddValue { field: String, value: String },

    /// Remove a value from a multi-valued attribute field.
    RemoveValue { field: String, value: String },

    /// Replace every value of an attribute field in one operation.
    ReplaceValues { field: String, values: Vec<String> },

    /// Add a reference to another object.
    AddReference { relation: String, to: ObjectId },

    /// Remove a reference to another object.
    RemoveReference { relation: String, to: ObjectId },

    /// Retarget the object's identity, preserving all other fields.
    Rename { from: ObjectId, to: ObjectId },
}

impl MutationOp {
    /// The attribute field or relation this operation touches, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            MutationOp::AddValue { field, .. }
            | MutationOp::RemoveValue { field, .. }
            | MutationOp::ReplaceValues { field, .. } => Some(field),
            MutationOp::AddReference { relation, .. }
            | MutationOp::RemoveReference { relation, .. } => Some(relation),
            MutationOp::Rename { .. } => None,
        }
    }

    /// Whether this operation removes a reference.
    pub fn is_reference_removal(&self) -> bool {
        matches!(self, MutationOp::RemoveReference { .. })
    }
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationOp::AddValue { field, value } => write!(f, "+{field}={value}"),
            MutationOp::RemoveValue { field, value } => write!(f, "-{field}={value}"),
            MutationOp::ReplaceValues { field, values } => {
                write!(f, "={field}({})", values.len())
            }
            MutationOp::AddReference { relation, to } => write!(f, "+{relation}->{to}"),
            MutationOp::RemoveReference { relation, to } => write!(f, "-{relation}->{to}"),
            MutationOp::Rename { from, to } => write!(f, "rename {from} -> {to}"),
        }
    }
}

/// An ordered list of mutations targeting one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// The object the mutations apply to.
    pub id: ObjectId,
    /// Schema of the object, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Mutations in application order.
    pub ops: Vec<MutationOp>,
}

impl ChangeSet {
    /// Create a change-set for one object.
    pub fn new(id: ObjectId, ops: Vec<MutationOp>) -> Self {
        Self {
            id,
            schema: None,
            ops,
        }
    }

    /// Tag the change-set with its object's schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Whether the set carries no mutations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of mutations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Decompose into one change-set per operation.
    ///
    /// Used for targets without bundled-mutation support, where each
    /// value-level operation must be applied (and can be retried) on its own.
    pub fn unbundle(self) -> Vec<ChangeSet> {
        let ChangeSet { id, schema, ops } = self;
        ops.into_iter()
            .map(|op| ChangeSet {
                id: id.clone(),
                schema: schema.clone(),
                ops: vec![op],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChangeSet {
        ChangeSet::new(
            ObjectId::new("ldap", "cn=staff"),
            vec![
                MutationOp::AddValue {
                    field: "description".into(),
                    value: "All staff".into(),
                },
                MutationOp::RemoveReference {
                    relation: "member".into(),
                    to: ObjectId::new("ldap", "uid=bob"),
                },
            ],
        )
        .with_schema("group")
    }

    #[test]
    fn test_unbundle_preserves_order_and_schema() {
        let sets = sample().unbundle();
        assert_eq!(sets.len(), 2);
        for set in &sets {
            assert_eq!(set.ops.len(), 1);
            assert_eq!(set.schema.as_deref(), Some("group"));
            assert_eq!(set.id.local(), "cn=staff");
        }
        assert!(matches!(sets[0].ops[0], MutationOp::AddValue { .. }));
        assert!(matches!(sets[1].ops[0], MutationOp::RemoveReference { .. }));
    }

    #[test]
    fn test_op_field_accessor() {
        let op = MutationOp::ReplaceValues {
            field: "mail".into(),
            values: vec!["a@x".into()],
        };
        assert_eq!(op.field(), Some("mail"));

        let rename = MutationOp::Rename {
            from: ObjectId::new("ldap", "a"),
            to: ObjectId::new("ldap", "b"),
        };
        assert_eq!(rename.field(), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let set = sample();
        let json = serde_json::to_string(&set).unwrap();
        let parsed: ChangeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }
}
