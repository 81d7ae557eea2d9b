//! Field policies
//!
//! Per-field retention, replacement, and comparison policy. Policies are a
//! plain declarative configuration tree loaded once at startup and passed
//! explicitly to the diffing engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Policy for one multi-valued attribute field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AttributePolicy {
    /// Existing values are never removed, even when absent from the desired
    /// set; only additions are applied.
    #[serde(default)]
    pub retain_all: bool,

    /// The field's mutation is expressed as a single replace-all-values
    /// operation instead of incremental add/remove.
    #[serde(default)]
    pub replace_wholesale: bool,
}

impl AttributePolicy {
    /// Policy whose values are only ever added, never removed.
    pub fn retain_all() -> Self {
        Self {
            retain_all: true,
            replace_wholesale: false,
        }
    }

    /// Policy that replaces the whole value set in one operation.
    pub fn replace_wholesale() -> Self {
        Self {
            retain_all: false,
            replace_wholesale: true,
        }
    }
}

/// Policy for one reference relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePolicy {
    /// Compare reference values case-sensitively. When false, membership
    /// tests lowercase both sides; emitted operations keep original casing.
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,

    /// Standalone value inserted when the target structurally requires the
    /// relation to be non-empty (rejects an attribute with zero values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_placeholder: Option<String>,
}

fn default_case_sensitive() -> bool {
    true
}

impl Default for ReferencePolicy {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            empty_placeholder: None,
        }
    }
}

impl ReferencePolicy {
    /// Case-insensitive comparison policy.
    pub fn case_insensitive() -> Self {
        Self {
            case_sensitive: false,
            empty_placeholder: None,
        }
    }

    /// Set the placeholder for structurally required relations.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.empty_placeholder = Some(placeholder.into());
        self
    }
}

/// The immutable per-field policy tree for one deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Per-attribute-field policies; fields not listed use the default.
    #[serde(default)]
    pub attributes: HashMap<String, AttributePolicy>,

    /// Per-relation policies; relations not listed use the default.
    #[serde(default)]
    pub references: HashMap<String, ReferencePolicy>,

    /// Fallback policy for attribute fields without an explicit entry.
    #[serde(default)]
    pub default_attribute: AttributePolicy,

    /// Fallback policy for relations without an explicit entry.
    #[serde(default)]
    pub default_reference: ReferencePolicy,
}

impl PolicyConfig {
    /// Create an empty policy tree using defaults everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for an attribute field (builder style).
    #[must_use]
    pub fn with_attribute_policy(
        mut self,
        field: impl Into<String>,
        policy: AttributePolicy,
    ) -> Self {
        self.attributes.insert(field.into(), policy);
        self
    }

    /// Register a policy for a reference relation (builder style).
    #[must_use]
    pub fn with_reference_policy(
        mut self,
        relation: impl Into<String>,
        policy: ReferencePolicy,
    ) -> Self {
        self.references.insert(relation.into(), policy);
        self
    }

    /// Policy for an attribute field.
    pub fn attribute(&self, field: &str) -> AttributePolicy {
        self.attributes
            .get(field)
            .copied()
            .unwrap_or(self.default_attribute)
    }

    /// Policy for a reference relation.
    pub fn reference(&self, relation: &str) -> &ReferencePolicy {
        self.references
            .get(relation)
            .unwrap_or(&self.default_reference)
    }
}
