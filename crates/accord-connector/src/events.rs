//! Change events
//!
//! Items of the ordered, gap-free change stream that keeps the population
//! synchronized between bulk passes. Events are produced externally, consumed
//! exactly once in sequence order, and never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ObjectId;

/// What happened to the subject object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEventKind {
    /// The subject was created at the source of truth.
    ObjectCreated,
    /// The subject's attributes changed at the source of truth.
    ObjectUpdated,
    /// The subject was removed at the source of truth.
    ObjectDeleted,
    /// A reference was added to the subject's relation.
    ReferenceAdded { relation: String },
    /// A reference was removed from the subject's relation.
    ReferenceRemoved { relation: String },
}

impl fmt::Display for ChangeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEventKind::ObjectCreated => write!(f, "object_created"),
            ChangeEventKind::ObjectUpdated => write!(f, "object_updated"),
            ChangeEventKind::ObjectDeleted => write!(f, "object_deleted"),
            ChangeEventKind::ReferenceAdded { relation } => {
                write!(f, "reference_added({relation})")
            }
            ChangeEventKind::ReferenceRemoved { relation } => {
                write!(f, "reference_removed({relation})")
            }
        }
    }
}

/// One item of the incremental change stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Strictly increasing, gap-free per source.
    pub sequence: i64,
    /// What happened.
    pub kind: ChangeEventKind,
    /// The object the event concerns.
    pub subject: ObjectId,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(sequence: i64, kind: ChangeEventKind, subject: ObjectId) -> Self {
        Self {
            sequence,
            kind,
            subject,
        }
    }
}
