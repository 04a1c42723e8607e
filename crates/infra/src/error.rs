//! Service-level error taxonomy.
//!
//! Every failure leaving this crate falls into one of four classes:
//!
//! | Class | Meaning | HTTP |
//! |-------|---------|------|
//! | `Validation` | malformed input, disposition exceeds receipt | 400 |
//! | `NotFound` | unknown id, or an inspection that was already disposed | 404 |
//! | `Conflict` | illegal transition, insufficient stock, lost race | 409 |
//! | `Storage` | constraint violation, connection failure | 500 |
//!
//! A `Storage` error is fatal to the enclosing operation: the surrounding
//! database transaction is dropped and rolled back, so nothing commits partially.

use serde::Serialize;
use thiserror::Error;

use solderp_core::DomainError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Why a request conflicted with current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The requested edge is not in the order transition table.
    InvalidTransition,
    /// Not enough unreserved stock for a line.
    InsufficientInventory,
    /// Another request moved the order first (compare-and-swap matched no row).
    ConcurrentTransition,
    /// A record that may exist only once already exists.
    AlreadyExists,
    /// Stored state disagrees with a domain invariant.
    Invariant,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::InvalidTransition => "invalid_transition",
            ConflictKind::InsufficientInventory => "insufficient_inventory",
            ConflictKind::ConcurrentTransition => "concurrent_transition",
            ConflictKind::AlreadyExists => "already_exists",
            ConflictKind::Invariant => "invariant_violation",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { kind: ConflictKind, message: String },

    #[error("storage error in {operation}: {message}")]
    Storage {
        operation: String,
        message: String,
        /// The database rejected the statement on a schema constraint.
        constraint: bool,
    },
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(kind: ConflictKind, msg: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            message: msg.into(),
        }
    }

    pub fn storage(operation: &str, msg: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            message: msg.into(),
            constraint: false,
        }
    }

    /// Stable machine-readable code, used as the `error` field of API responses.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict { kind, .. } => kind.as_str(),
            ServiceError::Storage { .. } => "storage_error",
        }
    }

    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            ServiceError::Conflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, ServiceError::Storage { constraint: true, .. })
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::NotFound(msg) => ServiceError::NotFound(msg),
            DomainError::Conflict(msg) => ServiceError::conflict(ConflictKind::AlreadyExists, msg),
            DomainError::InvariantViolation(msg) => {
                ServiceError::conflict(ConflictKind::Invariant, msg)
            }
            e @ DomainError::InvalidTransition { .. } => {
                ServiceError::conflict(ConflictKind::InvalidTransition, e.to_string())
            }
            e @ DomainError::InsufficientInventory { .. } => {
                ServiceError::conflict(ConflictKind::InsufficientInventory, e.to_string())
            }
        }
    }
}

/// Map a sqlx error into the `Storage` class, naming the failing operation.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = matches!(
                db_err.kind(),
                sqlx::error::ErrorKind::CheckViolation
                    | sqlx::error::ErrorKind::UniqueViolation
                    | sqlx::error::ErrorKind::ForeignKeyViolation
                    | sqlx::error::ErrorKind::NotNullViolation
            ) || db_err.message().contains("constraint failed");
            ServiceError::Storage {
                operation: operation.to_string(),
                message: db_err.message().to_string(),
                constraint,
            }
        }
        sqlx::Error::PoolClosed => ServiceError::storage(operation, "connection pool closed"),
        sqlx::Error::PoolTimedOut => {
            ServiceError::storage(operation, "timed out waiting for a database connection")
        }
        other => ServiceError::storage(operation, other.to_string()),
    }
}

/// A stored row that no longer parses into its domain type.
pub(crate) fn corrupt_row(operation: &str, err: impl core::fmt::Display) -> ServiceError {
    ServiceError::storage(operation, format!("corrupt row: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_into_the_four_classes() {
        assert!(matches!(
            ServiceError::from(DomainError::validation("x")),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            ServiceError::from(DomainError::not_found("x")),
            ServiceError::NotFound(_)
        ));
        let err = ServiceError::from(DomainError::insufficient("IC-1", 10, 5));
        assert_eq!(err.conflict_kind(), Some(ConflictKind::InsufficientInventory));
        assert!(err.to_string().contains("IC-1"));
    }

    #[test]
    fn invalid_transition_keeps_the_required_status_in_the_message() {
        let err = ServiceError::from(DomainError::InvalidTransition {
            from: "confirmed".into(),
            to: "shipped".into(),
            required: "picked".into(),
        });
        assert_eq!(err.code(), "invalid_transition");
        assert!(err.to_string().contains("requires status=picked"));
    }

    #[test]
    fn pool_errors_are_storage() {
        let err = map_sqlx_error("begin", sqlx::Error::PoolClosed);
        assert_eq!(err.code(), "storage_error");
        assert!(!err.is_constraint_violation());
        assert!(err.to_string().contains("begin"));
    }
}
