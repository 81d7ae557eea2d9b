//! Managed object representation
//!
//! The desired or observed state of one provisioned entity: its identity,
//! schema, multi-valued attributes, and references to other objects.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;

/// A managed object: one entity under provisioning.
///
/// Attribute and reference maps are insertion-ordered (`IndexMap`) so that a
/// diff of a desired object against an observed one walks fields in the
/// desired object's declared order, making engine output deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedObject {
    /// The object's identity within its target.
    pub id: ObjectId,
    /// Name of the entity schema this object instantiates.
    pub schema: String,
    /// Multi-valued attributes, field name to ordered values.
    #[serde(default)]
    pub attributes: IndexMap<String, Vec<String>>,
    /// References to other managed objects, relation name to targets.
    #[serde(default)]
    pub references: IndexMap<String, Vec<ObjectId>>,
    /// Identities this object used to be known as; drives rename detection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_ids: Vec<ObjectId>,
}

impl ManagedObject {
    /// Create a new managed object with no fields.
    pub fn new(id: ObjectId, schema: impl Into<String>) -> Self {
        Self {
            id,
            schema: schema.into(),
            attributes: IndexMap::new(),
            references: IndexMap::new(),
            alternate_ids: Vec::new(),
        }
    }

    /// Add an attribute field (builder style).
    #[must_use]
    pub fn with_attribute<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Add a reference relation (builder style).
    #[must_use]
    pub fn with_reference<I>(mut self, relation: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = ObjectId>,
    {
        self.references
            .insert(relation.into(), targets.into_iter().collect());
        self
    }

    /// Record an identity this object was previously known as.
    #[must_use]
    pub fn with_alternate_id(mut self, id: ObjectId) -> Self {
        self.alternate_ids.push(id);
        self
    }

    /// Values of an attribute field, if the field exists.
    pub fn attribute(&self, field: &str) -> Option<&[String]> {
        self.attributes.get(field).map(Vec::as_slice)
    }

    /// Targets of a reference relation, if the relation exists.
    pub fn reference(&self, relation: &str) -> Option<&[ObjectId]> {
        self.references.get(relation).map(Vec::as_slice)
    }

    /// Whether the object carries a given attribute field at all.
    pub fn has_attribute(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }

    /// Attribute field names in declared order.
    pub fn attribute_fields(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Reference relation names in declared order.
    pub fn reference_relations(&self) -> impl Iterator<Item = &str> {
        self.references.keys().map(String::as_str)
    }

    /// Return a copy re-identified under a new id, all other fields kept.
    ///
    /// This is the post-rename view of the object: identity changes
    /// atomically, nothing else does.
    #[must_use]
    pub fn reidentified(&self, id: ObjectId) -> Self {
        let mut object = self.clone();
        object.id = id;
        object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ObjectId;

    fn staff_group() -> ManagedObject {
        ManagedObject::new(ObjectId::new("ldap", "cn=staff"), "group")
            .with_attribute("description", ["All staff"])
            .with_attribute("mail", ["staff@example.com"])
            .with_reference("member", [ObjectId::new("ldap", "uid=alice")])
    }

    #[test]
    fn test_builder_and_accessors() {
        let group = staff_group();
        assert_eq!(group.attribute("description"), Some(&["All staff".to_string()][..]));
        assert!(group.has_attribute("mail"));
        assert!(!group.has_attribute("owner"));
        assert_eq!(group.reference("member").map(<[ObjectId]>::len), Some(1));
    }

    #[test]
    fn test_field_order_is_declared_order() {
        let group = staff_group();
        let fields: Vec<&str> = group.attribute_fields().collect();
        assert_eq!(fields, vec!["description", "mail"]);
    }

    #[test]
    fn test_reidentified_keeps_fields() {
        let group = staff_group();
        let renamed = group.reidentified(ObjectId::new("ldap", "cn=employees"));
        assert_eq!(renamed.id.local(), "cn=employees");
        assert_eq!(renamed.attributes, group.attributes);
        assert_eq!(renamed.references, group.references);
    }
}
