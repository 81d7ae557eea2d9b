//! Entity schemas
//!
//! A schema names a kind of managed object within a target (group, container,
//! account), declares its attribute and reference fields, and carries an
//! identifying predicate used to classify an observed target record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object::ManagedObject;

/// Declarative predicate over an observed record's attributes.
///
/// Predicates are plain data, loaded once with the rest of the configuration
/// tree; classification never calls user code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaPredicate {
    /// Matches when the attribute exists with at least one value.
    AttributePresent { attribute: String },

    /// Matches when the attribute carries the given value.
    AttributeEquals { attribute: String, value: String },

    /// Matches when all inner predicates match.
    All { predicates: Vec<SchemaPredicate> },

    /// Matches when any inner predicate matches.
    Any { predicates: Vec<SchemaPredicate> },

    /// Matches when the inner predicate does not.
    Not { predicate: Box<SchemaPredicate> },
}

impl SchemaPredicate {
    /// Predicate matching records that carry `attribute`.
    pub fn present(attribute: impl Into<String>) -> Self {
        SchemaPredicate::AttributePresent {
            attribute: attribute.into(),
        }
    }

    /// Predicate matching records where `attribute` carries `value`.
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        SchemaPredicate::AttributeEquals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Conjunction of predicates.
    pub fn all(predicates: Vec<SchemaPredicate>) -> Self {
        SchemaPredicate::All { predicates }
    }

    /// Negation of a predicate.
    pub fn negate(predicate: SchemaPredicate) -> Self {
        SchemaPredicate::Not {
            predicate: Box::new(predicate),
        }
    }

    /// Evaluate this predicate against an observed record.
    pub fn matches(&self, record: &ManagedObject) -> bool {
        match self {
            SchemaPredicate::AttributePresent { attribute } => record
                .attribute(attribute)
                .is_some_and(|values| !values.is_empty()),
            SchemaPredicate::AttributeEquals { attribute, value } => record
                .attribute(attribute)
                .is_some_and(|values| values.iter().any(|v| v == value)),
            SchemaPredicate::All { predicates } => {
                predicates.iter().all(|p| p.matches(record))
            }
            SchemaPredicate::Any { predicates } => {
                predicates.iter().any(|p| p.matches(record))
            }
            SchemaPredicate::Not { predicate } => !predicate.matches(record),
        }
    }
}

/// A named entity kind within a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Schema name, unique within a target (e.g. "group", "container").
    pub name: String,
    /// Declared attribute field names, in order.
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Declared reference relation names, in order.
    #[serde(default)]
    pub references: Vec<String>,
    /// Identifying predicate; exactly one schema must match a given record.
    pub predicate: SchemaPredicate,
}

impl EntitySchema {
    /// Create a schema with a name and identifying predicate.
    pub fn new(name: impl Into<String>, predicate: SchemaPredicate) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            references: Vec::new(),
            predicate,
        }
    }

    /// Declare attribute fields (builder style).
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Declare reference relations (builder style).
    #[must_use]
    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references = references.into_iter().map(Into::into).collect();
        self
    }
}

/// Failure to classify an observed record into a schema.
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    /// No schema's predicate matched the record.
    #[error("no schema matches record {record}")]
    NoMatch { record: String },

    /// More than one schema's predicate matched the record.
    #[error("record {record} matches multiple schemas: {matched:?}")]
    MultipleMatches { record: String, matched: Vec<String> },
}

/// Classify an observed record into exactly one of the given schemas.
///
/// Zero or multiple matches are configuration errors: the schema set for a
/// target must partition its records.
pub fn classify<'a>(
    record: &ManagedObject,
    schemas: &'a [EntitySchema],
) -> Result<&'a EntitySchema, ClassifyError> {
    let matched: Vec<&EntitySchema> = schemas
        .iter()
        .filter(|s| s.predicate.matches(record))
        .collect();

    match matched.as_slice() {
        [single] => Ok(single),
        [] => Err(ClassifyError::NoMatch {
            record: record.id.to_string(),
        }),
        many => Err(ClassifyError::MultipleMatches {
            record: record.id.to_string(),
            matched: many.iter().map(|s| s.name.clone()).collect(),
        }),
    }
}
