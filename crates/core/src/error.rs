//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage failures belong to the infrastructure layer.
///
/// Every message names the offending value (IPN, required status, totals) so a
/// caller can diagnose the rejection without server-side logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record does not exist (or is no longer in an actionable state).
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. a concurrent request won the race).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A requested lifecycle edge is not in the transition table.
    #[error("invalid transition {from} -> {to}, requires status={required}")]
    InvalidTransition {
        from: String,
        to: String,
        required: String,
    },

    /// Not enough unreserved stock to satisfy a request.
    #[error("insufficient inventory for {ipn}: requested {requested}, available {available}")]
    InsufficientInventory {
        ipn: String,
        requested: i64,
        available: i64,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn insufficient(ipn: impl Into<String>, requested: i64, available: i64) -> Self {
        Self::InsufficientInventory {
            ipn: ipn.into(),
            requested,
            available,
        }
    }
}
