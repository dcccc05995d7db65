//! # Error Types: Fabrication Error Taxonomy
//!
//! Every fallible operation in the nexus returns [`NexusError`]. The variants
//! are a closed taxonomy so callers can pattern-match on the failure class:
//!
//! - `Conflict` is transient. Another worker won an optimistic write; the
//!   caller may retry.
//! - `IllegalTransition` and `BusinessRule` are permanent given the current
//!   state; retrying without changing the request will fail again.
//!
//! Nothing inside the core retries.

use thiserror::Error;

/// Convenience alias used across the workspace.
pub type NexusResult<T> = Result<T, NexusError>;

/// Top-level error type for chain and segment fabrication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NexusError {
    /// Malformed entity or missing required field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced record does not exist or is outside the caller's scope.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller lacks the required access level.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Requested state is not reachable from the current state.
    #[error("illegal {kind} transition from {from} to {to}")]
    IllegalTransition {
        /// Lifecycle kind ("Chain" or "Segment").
        kind: &'static str,
        /// Current state name.
        from: String,
        /// Disallowed target state name.
        to: String,
    },

    /// Domain invariant violated.
    #[error("business rule violated: {0}")]
    BusinessRule(String),

    /// Optimistic conditional write affected zero rows.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl NexusError {
    /// The "no records updated" conflict raised when a conditional write loses.
    pub fn no_records_updated() -> Self {
        Self::Conflict("no records updated".to_string())
    }

    /// Another non-Erase chain already holds the embed key being written.
    pub fn embed_key_taken() -> Self {
        Self::BusinessRule("Existing Chain with this embed_key".to_string())
    }

    /// HTTP status an API layer should report for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Authorization(_) => 403,
            Self::Validation(_) | Self::BusinessRule(_) | Self::IllegalTransition { .. } => 422,
            Self::Conflict(_) => 409,
            Self::Storage(_) => 500,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Authorization(_) => "FORBIDDEN",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::BusinessRule(_) => "BUSINESS_RULE",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether a caller should retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(NexusError::NotFound("chain".into()).http_status(), 404);
        assert_eq!(NexusError::Authorization("engineer".into()).http_status(), 403);
        assert_eq!(NexusError::Validation("name".into()).http_status(), 422);
        assert_eq!(NexusError::BusinessRule("dup".into()).http_status(), 422);
        assert_eq!(
            NexusError::IllegalTransition {
                kind: "Chain",
                from: "Erase".into(),
                to: "Draft".into()
            }
            .http_status(),
            422
        );
        assert_eq!(NexusError::no_records_updated().http_status(), 409);
        assert_eq!(NexusError::Storage("io".into()).http_status(), 500);
    }

    #[test]
    fn only_conflict_is_retryable() {
        assert!(NexusError::no_records_updated().is_retryable());
        assert!(!NexusError::BusinessRule("x".into()).is_retryable());
        assert!(!NexusError::IllegalTransition {
            kind: "Segment",
            from: "Dubbed".into(),
            to: "Planned".into()
        }
        .is_retryable());
    }

    #[test]
    fn illegal_transition_message_names_target() {
        let err = NexusError::IllegalTransition {
            kind: "Chain",
            from: "Fabricate".into(),
            to: "Draft".into(),
        };
        assert_eq!(err.to_string(), "illegal Chain transition from Fabricate to Draft");
        assert_eq!(err.code(), "ILLEGAL_TRANSITION");
    }
}
