//! # Accord Reconciliation Engine
//!
//! Declarative reconciliation of managed objects across a source-of-truth
//! resolver and downstream targets: compute the desired representation,
//! diff it against the observed one, and apply a minimal, policy-correct
//! set of mutations.
//!
//! ## Architecture
//!
//! ```text
//! IncrementalEventProcessor ─┐                 ┌─> ObjectDiffer ─> ValueSetReconciler
//!                            ├─> SingleObjectReconciler
//! BulkReconciler ────────────┘                 └─> RenameDetector
//! ```
//!
//! [`SingleObjectReconciler`] converges one identifier: resolve, look up,
//! detect renames, diff, apply. [`BulkReconciler`] runs it over the whole
//! desired universe and then deletes observed identifiers that are no longer
//! desired, in target-prescribed order. [`IncrementalEventProcessor`]
//! consumes the ordered change stream between bulk passes, with a
//! crash-resumable checkpoint and mutual exclusion against bulk runs through
//! the shared [`ReconcilerState`].
//!
//! ## Crate Organization
//!
//! - [`valueset`] - Value-set diffing under per-field policy
//! - [`differ`] - Whole-object diffing into change-sets
//! - [`rename`] - Rename detection from alternate identities
//! - [`single`] - Single-identifier convergence
//! - [`bulk`] - Full-population passes with ordered deletion
//! - [`incremental`] - Change-stream batches and checkpointing
//! - [`state`] - Shared bulk/batch ownership state
//! - [`report`] - Outcome records, statistics, run results
//! - [`config`] - Engine configuration
//! - [`error`] - Engine error taxonomy
//!
//! [`SingleObjectReconciler`]: single::SingleObjectReconciler
//! [`BulkReconciler`]: bulk::BulkReconciler
//! [`IncrementalEventProcessor`]: incremental::IncrementalEventProcessor
//! [`ReconcilerState`]: state::ReconcilerState

pub mod bulk;
pub mod config;
pub mod differ;
pub mod error;
pub mod incremental;
pub mod rename;
pub mod report;
pub mod single;
pub mod state;
pub mod valueset;

/// Prelude module for convenient imports.
///
/// ```
/// use accord_engine::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bulk::BulkReconciler;
    pub use crate::config::{EngineConfig, ErrorPolicy};
    pub use crate::differ::{DiffResult, ObjectDiffer};
    pub use crate::error::{ReconcileError, ReconcileResult};
    pub use crate::incremental::IncrementalEventProcessor;
    pub use crate::rename::RenameDetector;
    pub use crate::report::{
        BatchOutcome, BulkOutcome, ReconcileRecord, RunStatistics, RunStatus,
    };
    pub use crate::single::SingleObjectReconciler;
    pub use crate::state::{BatchGuard, BulkGuard, ReconcilerState};
    pub use crate::valueset::ValueSetReconciler;
}
