//! External error taxonomy.
//!
//! Every layer error ends up here exactly once, at the orchestrator
//! boundary:
//!
//! | Source | [`ErrorKind`] | HTTP |
//! |--------|---------------|------|
//! | no identity, revoked key | `UNAUTHENTICATED` | 401 |
//! | missing permission or tier | `FORBIDDEN` | 403 |
//! | another tenant's data | `NOT_FOUND` | 404 |
//! | bad arguments, failed rules | `VALIDATION` | 400 |
//! | state forbids the operation | `CONFLICT` | 409 |
//! | token bucket empty | `RATE_LIMITED` | 429 |
//! | store or programming fault | `INTERNAL` | 500 |
//!
//! Internal errors are logged with their code and returned with a generic
//! message.

use crate::services::ServiceError;
use quorum_auth::{AccessDenied, DenialKind};
use quorum_types::{ErrorCode, RequestId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable error category seen by API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    Validation,
    Conflict,
    NotFound,
    RateLimited,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::NotFound => 404,
            Self::RateLimited => 429,
            Self::Internal => 500,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one operation in a batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        field: Option<String>,
    },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("rate limit exceeded")]
    RateLimited,
}

impl OperationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Turns a `serde_json` deserialization failure into an argument error,
    /// naming the field when serde reports one.
    pub fn from_json(err: &serde_json::Error) -> Self {
        let message = err.to_string();
        let field = ["missing field `", "unknown field `"]
            .iter()
            .find_map(|marker| {
                let rest = message.split_once(marker)?.1;
                rest.split_once('`').map(|(name, _)| name.to_string())
            });
        Self::InvalidArguments { message, field }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Denied(denied) if denied.conceals_existence() => ErrorKind::NotFound,
            Self::Denied(denied) => match denied.kind() {
                DenialKind::Unauthenticated => ErrorKind::Unauthenticated,
                DenialKind::Forbidden => ErrorKind::Forbidden,
            },
            Self::Service(err) => match err {
                ServiceError::NotFound { .. } => ErrorKind::NotFound,
                ServiceError::Validation { .. } => ErrorKind::Validation,
                ServiceError::Conflict(_) => ErrorKind::Conflict,
                ServiceError::Store(_) | ServiceError::Internal(_) => ErrorKind::Internal,
            },
            Self::InvalidArguments { .. } | Self::UnknownOperation(_) => ErrorKind::Validation,
            Self::RateLimited => ErrorKind::RateLimited,
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidArguments { field, .. }
            | Self::Service(ServiceError::Validation { field, .. }) => field.as_deref(),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Denied(AccessDenied::TenantMismatch { .. }) => "tenant not found".to_string(),
            _ if self.kind() == ErrorKind::Internal => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ErrorCode for OperationError {
    fn code(&self) -> &'static str {
        match self {
            Self::Denied(err) => err.code(),
            Self::Service(err) => err.code(),
            Self::InvalidArguments { .. } => "REQUEST_INVALID_ARGUMENTS",
            Self::UnknownOperation(_) => "REQUEST_UNKNOWN_OPERATION",
            Self::RateLimited => "REQUEST_RATE_LIMITED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Denied(err) => err.is_recoverable(),
            Self::Service(err) => err.is_recoverable(),
            Self::RateLimited => true,
            Self::InvalidArguments { .. } | Self::UnknownOperation(_) => false,
        }
    }
}

/// One entry of a response's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub message: String,
    pub code: ErrorKind,
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl ApiError {
    /// Renders an operation failure for the caller. Internal faults are
    /// logged here with the request id and never leak their message.
    pub fn render(err: &OperationError, request: RequestId, path: Vec<String>) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Internal {
            tracing::error!(
                request = %request,
                path = ?path,
                code = err.code(),
                recoverable = err.is_recoverable(),
                error = %err,
                "operation failed"
            );
        } else {
            tracing::debug!(request = %request, path = ?path, code = err.code(), "operation rejected");
        }
        Self {
            message: err.public_message(),
            code: kind,
            http_status: kind.http_status(),
            field: err.field().map(str::to_string),
            path,
        }
    }
}

/// Operation table construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    Duplicate(String),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "REGISTRY_DUPLICATE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
