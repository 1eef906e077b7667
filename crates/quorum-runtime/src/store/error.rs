//! Backing store errors.

use quorum_types::{EntityKind, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

/// Faults raised by a [`BackingStore`](super::BackingStore).
///
/// Messages may name tables and constraints; they are for logs only and
/// never reach callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {id} does not exist")]
    Missing { kind: EntityKind, id: Uuid },

    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint '{constraint}' violated")]
    ForeignKeyViolation { constraint: String },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    pub fn foreign_key(constraint: impl Into<String>) -> Self {
        Self::ForeignKeyViolation {
            constraint: constraint.into(),
        }
    }
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "STORE_MISSING",
            Self::UniqueViolation { .. } => "STORE_UNIQUE_VIOLATION",
            Self::ForeignKeyViolation { .. } => "STORE_FOREIGN_KEY_VIOLATION",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::Backend(_) => "STORE_BACKEND",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                StoreError::Missing {
                    kind: EntityKind::Survey,
                    id: Uuid::new_v4(),
                },
                StoreError::unique("identity.email"),
                StoreError::foreign_key("survey.tenant_id"),
                StoreError::Unavailable("x".into()),
                StoreError::Backend("x".into()),
            ],
            "STORE_",
        );
    }
}
