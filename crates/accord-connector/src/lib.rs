//! # Accord Connector Framework
//!
//! Data model and collaborator contracts for the accord reconciliation
//! engine.
//!
//! This crate defines what the engine reconciles (managed objects, their
//! schemas, field policies, mutations) and the capability traits it drives:
//! target adapters, the source-of-truth resolver, checkpoint persistence,
//! and outcome reporting. Concrete adapters (LDAP directories, group
//! management APIs, databases) implement these traits in their own crates.
//!
//! ## Architecture
//!
//! - [`TargetAdapter`] - lookup, create, apply, delete against one target
//! - [`AuthoritativeSource`] - inventory discovery and deletion ordering
//! - [`Resolver`] - computes desired state from the source of truth
//! - [`CheckpointStore`] - persistence for the incremental checkpoint
//! - [`OutcomeSink`] - structured per-identifier outcome reporting
//!
//! ## Example
//!
//! ```
//! use accord_connector::prelude::*;
//!
//! let desired = ManagedObject::new(ObjectId::new("ldap", "cn=staff"), "group")
//!     .with_attribute("description", ["All staff"])
//!     .with_reference("member", [ObjectId::new("ldap", "uid=alice")]);
//!
//! assert_eq!(desired.attribute("description"), Some(&["All staff".to_string()][..]));
//! ```
//!
//! ## Crate Organization
//!
//! - [`ids`] - Target-scoped identifiers (`TargetId`, `ObjectId`)
//! - [`object`] - `ManagedObject` representation
//! - [`schema`] - Entity schemas and record classification
//! - [`policy`] - Per-field retention/replacement/comparison policy
//! - [`changeset`] - Mutations and change-sets
//! - [`events`] - Incremental change stream items
//! - [`outcome`] - Per-identifier outcomes and the reporting sink
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - Collaborator capability traits
//!
//! [`TargetAdapter`]: traits::TargetAdapter
//! [`AuthoritativeSource`]: traits::AuthoritativeSource
//! [`Resolver`]: traits::Resolver
//! [`CheckpointStore`]: traits::CheckpointStore
//! [`OutcomeSink`]: outcome::OutcomeSink

pub mod changeset;
pub mod error;
pub mod events;
pub mod ids;
pub mod object;
pub mod outcome;
pub mod policy;
pub mod schema;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use accord_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::changeset::{ChangeSet, MutationOp};
    pub use crate::error::{ResolveError, ResolveResult, TargetError, TargetResult};
    pub use crate::events::{ChangeEvent, ChangeEventKind};
    pub use crate::ids::{ObjectId, TargetId};
    pub use crate::object::ManagedObject;
    pub use crate::outcome::{OutcomeSink, SyncOutcome, TracingOutcomeSink};
    pub use crate::policy::{AttributePolicy, PolicyConfig, ReferencePolicy};
    pub use crate::schema::{classify, ClassifyError, EntitySchema, SchemaPredicate};
    pub use crate::traits::{AuthoritativeSource, CheckpointStore, Resolver, TargetAdapter};
}

// Re-export async_trait for adapter implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _id = ObjectId::new("ldap", "cn=staff");
        let _target = TargetId::new("ldap");
        let _policy = AttributePolicy::retain_all();
        let _predicate = SchemaPredicate::present("objectClass");
        let _outcome = SyncOutcome::Unchanged;
    }
}
