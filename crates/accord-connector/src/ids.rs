//! Identifier types
//!
//! Target-scoped object identity. Identifiers are opaque strings keyed by the
//! target system they live in; they carry no meaning beyond equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Name of a downstream target system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Create a new target id.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the target name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of a managed object within a target namespace.
///
/// The optional `container` records the parent scope an object lives under
/// (e.g. an organizational unit path). It is carried for adapters that need
/// it to address the object, but it is NOT part of the object's identity:
/// equality and hashing ignore it, so identifier inventories and deletion
/// candidate sets never key on container scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectId {
    /// The target system this identifier is scoped to.
    pub target: TargetId,
    /// The local identifier within the target, opaque to the engine.
    pub local: String,
    /// Optional parent scope, excluded from identity comparison.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl ObjectId {
    /// Create a new object identifier.
    pub fn new(target: impl Into<TargetId>, local: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            local: local.into(),
            container: None,
        }
    }

    /// Attach a container (parent scope) to this identifier.
    #[must_use]
    pub fn in_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// The local identifier within the target.
    pub fn local(&self) -> &str {
        &self.local
    }

    /// The target this identifier belongs to.
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Return a copy with the container scope stripped.
    #[must_use]
    pub fn without_container(&self) -> Self {
        Self {
            target: self.target.clone(),
            local: self.local.clone(),
            container: None,
        }
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.local == other.local
    }
}

impl Eq for ObjectId {}

impl Hash for ObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
        self.local.hash(state);
    }
}

// Ordering follows identity: target then local, container ignored.
impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.target, &self.local).cmp(&(&other.target, &other.local))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target, self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_object_id_display() {
        let id = ObjectId::new("ldap-primary", "cn=staff,ou=groups");
        assert_eq!(id.to_string(), "ldap-primary:cn=staff,ou=groups");
    }

    #[test]
    fn test_container_excluded_from_identity() {
        let plain = ObjectId::new("ldap", "cn=staff");
        let scoped = ObjectId::new("ldap", "cn=staff").in_container("ou=groups");

        assert_eq!(plain, scoped);

        let mut set = HashSet::new();
        set.insert(plain);
        assert!(set.contains(&scoped));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_distinct_targets_distinct_identity() {
        let a = ObjectId::new("ldap", "cn=staff");
        let b = ObjectId::new("idm", "cn=staff");
        assert_ne!(a, b);
    }

    #[test]
    fn test_without_container() {
        let scoped = ObjectId::new("ldap", "cn=staff").in_container("ou=groups");
        let stripped = scoped.without_container();
        assert!(stripped.container.is_none());
        assert_eq!(stripped, scoped);
    }
}
