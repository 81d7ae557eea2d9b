//! Target and resolver error types
//!
//! Error definitions with transient/permanent classification. The engine
//! dispatches on the reference-cardinality and rename-unsupported kinds;
//! everything else only affects how a failure is reported.

use thiserror::Error;

use crate::ids::ObjectId;

/// Error reported by a target adapter.
#[derive(Debug, Error)]
pub enum TargetError {
    // Connection errors (usually transient)
    /// Failed to reach the target system.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Target system is temporarily unavailable.
    #[error("target unavailable: {message}")]
    Unavailable { message: String },

    // Object-level errors
    /// The object addressed by a mutation does not exist.
    #[error("object not found: {id}")]
    NotFound { id: ObjectId },

    /// Create collided with an existing object.
    #[error("object already exists: {id}")]
    AlreadyExists { id: ObjectId },

    /// The target rejected removing the last value of a relation it
    /// requires to be non-empty. Triggers the engine's one-shot
    /// placeholder-insert retry.
    #[error("reference cardinality violation on relation '{relation}' of {id}")]
    ReferenceCardinalityViolation { id: ObjectId, relation: String },

    /// The target cannot rename this object in place (e.g. no subtree
    /// rename support for hierarchical containers). Non-fatal: the engine
    /// falls back to a full resync of the new identity.
    #[error("rename not supported by target for {id}")]
    RenameUnsupported { id: ObjectId },

    /// The target rejected a mutation for any other reason.
    #[error("mutation rejected: {message}")]
    ApplyRejected {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Configuration errors (permanent)
    /// Adapter configuration is invalid.
    #[error("invalid adapter configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Internal adapter error.
    #[error("internal adapter error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TargetError {
    /// Whether the operation may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TargetError::ConnectionFailed { .. }
                | TargetError::Timeout { .. }
                | TargetError::Unavailable { .. }
        )
    }

    /// Whether retrying cannot help without intervention.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Whether this is the reference-cardinality schema violation the
    /// engine's placeholder retry path handles.
    pub fn is_reference_cardinality(&self) -> bool {
        matches!(self, TargetError::ReferenceCardinalityViolation { .. })
    }

    /// Stable code for classification in logs and sinks.
    pub fn error_code(&self) -> &'static str {
        match self {
            TargetError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            TargetError::Timeout { .. } => "TIMEOUT",
            TargetError::Unavailable { .. } => "TARGET_UNAVAILABLE",
            TargetError::NotFound { .. } => "OBJECT_NOT_FOUND",
            TargetError::AlreadyExists { .. } => "OBJECT_EXISTS",
            TargetError::ReferenceCardinalityViolation { .. } => "REFERENCE_CARDINALITY",
            TargetError::RenameUnsupported { .. } => "RENAME_UNSUPPORTED",
            TargetError::ApplyRejected { .. } => "APPLY_REJECTED",
            TargetError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            TargetError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection-failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        TargetError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        TargetError::Unavailable {
            message: message.into(),
        }
    }

    /// Create an apply-rejected error.
    pub fn apply_rejected(message: impl Into<String>) -> Self {
        TargetError::ApplyRejected {
            message: message.into(),
            source: None,
        }
    }

    /// Create an apply-rejected error with its underlying cause.
    pub fn apply_rejected_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TargetError::ApplyRejected {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        TargetError::Internal {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for target adapter operations.
pub type TargetResult<T> = Result<T, TargetError>;

/// Error reported by the source-of-truth resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolver knows nothing about the identifier. Recoverable:
    /// reported per identifier, not retried within the same pass.
    #[error("no such identifier: {id}")]
    NoSuchIdentifier { id: ObjectId },

    /// The resolver itself failed.
    #[error("resolver failure: {message}")]
    Failure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ResolveError {
    /// Create a resolver failure.
    pub fn failure(message: impl Into<String>) -> Self {
        ResolveError::Failure {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TargetError::connection_failed("x").is_transient());
        assert!(TargetError::Timeout { timeout_secs: 5 }.is_transient());
        assert!(TargetError::unavailable("maintenance").is_transient());

        assert!(TargetError::apply_rejected("bad value").is_permanent());
        assert!(TargetError::RenameUnsupported {
            id: ObjectId::new("ldap", "ou=x"),
        }
        .is_permanent());
    }

    #[test]
    fn test_reference_cardinality_detection() {
        let err = TargetError::ReferenceCardinalityViolation {
            id: ObjectId::new("ldap", "cn=staff"),
            relation: "member".into(),
        };
        assert!(err.is_reference_cardinality());
        assert_eq!(err.error_code(), "REFERENCE_CARDINALITY");
        assert!(!TargetError::apply_rejected("x").is_reference_cardinality());
    }

    #[test]
    fn test_error_display() {
        let err = TargetError::ReferenceCardinalityViolation {
            id: ObjectId::new("ldap", "cn=staff"),
            relation: "member".into(),
        };
        assert_eq!(
            err.to_string(),
            "reference cardinality violation on relation 'member' of ldap:cn=staff"
        );
    }
}
