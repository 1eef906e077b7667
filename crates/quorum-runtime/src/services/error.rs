//! Service layer errors.
//!
//! All service errors use the `SERVICE_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`ServiceError::NotFound`] | `SERVICE_NOT_FOUND` | No |
//! | [`ServiceError::Validation`] | `SERVICE_VALIDATION` | No |
//! | [`ServiceError::Conflict`] | `SERVICE_CONFLICT` | No |
//! | [`ServiceError::Store`] | `SERVICE_STORE` | If the store fault is |
//! | [`ServiceError::Internal`] | `SERVICE_INTERNAL` | No |
//!
//! Store faults are translated once, in the `From<StoreError>` impl:
//! unique violations become conflicts, referential violations become
//! validation failures, and everything else stays a store fault that the
//! orchestrator reports as internal.

use crate::store::StoreError;
use quorum_types::{
    AnswerRejected, Entity, EntityKey, EntityKind, ErrorCode, IllegalTransition,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("{kind} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The entity's current state forbids the operation.
    #[error("{0}")]
    Conflict(String),

    #[error("store failure: {0}")]
    Store(#[source] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found<E: Entity>(id: E::Id) -> Self {
        Self::NotFound {
            kind: E::KIND,
            id: id.as_uuid(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Validation failure attributed to one argument.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

/// `"identity.email"` → `"email"`.
fn column(constraint: &str) -> &str {
    constraint.rsplit('.').next().unwrap_or(constraint)
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => Self::Conflict(format!(
                "a record with this {} already exists",
                column(&constraint)
            )),
            StoreError::ForeignKeyViolation { constraint } => Self::Validation {
                message: "the operation would break a reference between records".into(),
                field: Some(column(&constraint).to_string()),
            },
            StoreError::Missing { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

impl From<AnswerRejected> for ServiceError {
    fn from(err: AnswerRejected) -> Self {
        Self::invalid_field("payload", err.reason)
    }
}

impl From<IllegalTransition> for ServiceError {
    fn from(err: IllegalTransition) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl ErrorCode for ServiceError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "SERVICE_NOT_FOUND",
            Self::Validation { .. } => "SERVICE_VALIDATION",
            Self::Conflict(_) => "SERVICE_CONFLICT",
            Self::Store(_) => "SERVICE_STORE",
            Self::Internal(_) => "SERVICE_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{assert_error_codes, Survey};

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                ServiceError::not_found::<Survey>(quorum_types::SurveyId::new()),
                ServiceError::validation("x"),
                ServiceError::conflict("x"),
                ServiceError::Store(StoreError::Unavailable("x".into())),
                ServiceError::Internal("x".into()),
            ],
            "SERVICE_",
        );
    }

    #[test]
    fn store_faults_are_translated() {
        let unique = ServiceError::from(StoreError::unique("identity.email"));
        assert_eq!(
            unique,
            ServiceError::Conflict("a record with this email already exists".into())
        );

        let fk = ServiceError::from(StoreError::foreign_key("response.question_id"));
        assert!(matches!(
            fk,
            ServiceError::Validation { field: Some(ref f), .. } if f == "question_id"
        ));

        let down = ServiceError::from(StoreError::Unavailable("timeout".into()));
        assert_eq!(down.code(), "SERVICE_STORE");
        assert!(down.is_recoverable());
    }

    #[test]
    fn not_found_message_hides_id() {
        let id = quorum_types::SurveyId::new();
        let err = ServiceError::not_found::<Survey>(id);
        assert_eq!(err.to_string(), "survey not found");
    }
}
