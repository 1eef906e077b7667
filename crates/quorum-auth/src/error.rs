//! Unified access denied error type.
//!
//! [`AccessDenied`] covers every way the gate can refuse a caller. Each
//! variant falls into one of two [`DenialKind`]s:
//!
//! ```text
//! Unauthenticated : no identity, inactive identity, revoked credential
//! Forbidden       : missing permission, insufficient role, tenant mismatch
//! ```

use quorum_types::{ErrorCode, Permission, Role, TenantId};
use thiserror::Error;

/// Coarse classification of a denial, used by the response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    Unauthenticated,
    Forbidden,
}

/// Error returned by every [`AuthorizationGate`](crate::AuthorizationGate)
/// check.
///
/// # Example
///
/// ```
/// use quorum_auth::{AccessDenied, DenialKind};
/// use quorum_types::Permission;
///
/// let err = AccessDenied::MissingPermission {
///     permission: Permission::SurveyPublish,
/// };
/// assert_eq!(err.kind(), DenialKind::Forbidden);
/// assert!(err.to_string().contains("survey:publish"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// No identity was resolved for the request, or it is inactive.
    #[error("authentication required")]
    Unauthenticated,

    /// The request authenticated with a credential that has been revoked.
    #[error("credential has been revoked")]
    CredentialRevoked,

    #[error("missing permission: {permission}")]
    MissingPermission { permission: Permission },

    #[error("requires role {required}, caller has {actual}")]
    InsufficientRole { required: Role, actual: Role },

    /// The caller's tenant differs from the requested one.
    ///
    /// Rendered to callers exactly like a missing entity so tenant
    /// membership of an id is not disclosed.
    #[error("tenant {requested} is outside the caller's scope")]
    TenantMismatch { requested: TenantId },
}

impl AccessDenied {
    #[must_use]
    pub fn kind(&self) -> DenialKind {
        match self {
            Self::Unauthenticated | Self::CredentialRevoked => DenialKind::Unauthenticated,
            Self::MissingPermission { .. }
            | Self::InsufficientRole { .. }
            | Self::TenantMismatch { .. } => DenialKind::Forbidden,
        }
    }

    /// Returns `true` if this denial must not reveal whether the target
    /// exists.
    #[must_use]
    pub fn conceals_existence(&self) -> bool {
        matches!(self, Self::TenantMismatch { .. })
    }
}

impl ErrorCode for AccessDenied {
    fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "AUTH_UNAUTHENTICATED",
            Self::CredentialRevoked => "AUTH_CREDENTIAL_REVOKED",
            Self::MissingPermission { .. } => "AUTH_MISSING_PERMISSION",
            Self::InsufficientRole { .. } => "AUTH_INSUFFICIENT_ROLE",
            Self::TenantMismatch { .. } => "AUTH_TENANT_MISMATCH",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
