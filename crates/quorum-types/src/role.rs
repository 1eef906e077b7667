//! Role tiers and permission identifiers.
//!
//! These are pure identity data: an [`Identity`](crate::Identity) carries a
//! [`Role`] and a set of explicitly granted [`Permission`]s. Deciding what a
//! role is allowed to do is the job of `quorum-auth`, which derives the
//! permission set of each tier from injected configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ordered role tiers.
///
/// `VIEWER < USER < ANALYST < TENANT_ADMIN < SYSTEM_ADMIN`. The derived
/// `Ord` follows declaration order, which is the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Viewer,
    User,
    Analyst,
    TenantAdmin,
    SystemAdmin,
}

impl Role {
    /// All tiers, lowest first.
    pub const ALL: [Role; 5] = [
        Role::Viewer,
        Role::User,
        Role::Analyst,
        Role::TenantAdmin,
        Role::SystemAdmin,
    ];

    /// Position in the hierarchy (0 = lowest).
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::User => 1,
            Self::Analyst => 2,
            Self::TenantAdmin => 3,
            Self::SystemAdmin => 4,
        }
    }

    /// Returns `true` if this tier is at least `other`.
    #[must_use]
    pub fn at_least(self, other: Role) -> bool {
        self.ordinal() >= other.ordinal()
    }

    /// Tiers strictly below and including this one, lowest first.
    pub fn tiers_up_to(self) -> impl Iterator<Item = Role> {
        Self::ALL.into_iter().filter(move |r| r.ordinal() <= self.ordinal())
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "VIEWER",
            Self::User => "USER",
            Self::Analyst => "ANALYST",
            Self::TenantAdmin => "TENANT_ADMIN",
            Self::SystemAdmin => "SYSTEM_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role or permission name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Role {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownName {
                kind: "role",
                value: s.to_string(),
            })
    }
}

/// A single permission, rendered as `resource:action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "tenant:read")]
    TenantRead,
    #[serde(rename = "tenant:manage")]
    TenantManage,
    #[serde(rename = "tenant:create")]
    TenantCreate,
    /// Access to entities of tenants other than the caller's own.
    #[serde(rename = "tenant:cross")]
    CrossTenant,
    #[serde(rename = "identity:read")]
    IdentityRead,
    #[serde(rename = "identity:manage")]
    IdentityManage,
    #[serde(rename = "survey:read")]
    SurveyRead,
    #[serde(rename = "survey:write")]
    SurveyWrite,
    #[serde(rename = "survey:publish")]
    SurveyPublish,
    #[serde(rename = "survey:delete")]
    SurveyDelete,
    #[serde(rename = "question:write")]
    QuestionWrite,
    #[serde(rename = "session:start")]
    SessionStart,
    #[serde(rename = "session:read")]
    SessionRead,
    #[serde(rename = "response:submit")]
    ResponseSubmit,
    #[serde(rename = "response:read")]
    ResponseRead,
    #[serde(rename = "analytics:read")]
    AnalyticsRead,
    #[serde(rename = "analysis:write")]
    AnalysisWrite,
    #[serde(rename = "credential:read")]
    CredentialRead,
    #[serde(rename = "credential:manage")]
    CredentialManage,
    #[serde(rename = "system:maintain")]
    SystemMaintain,
}

impl Permission {
    pub const ALL: [Permission; 20] = [
        Permission::TenantRead,
        Permission::TenantManage,
        Permission::TenantCreate,
        Permission::CrossTenant,
        Permission::IdentityRead,
        Permission::IdentityManage,
        Permission::SurveyRead,
        Permission::SurveyWrite,
        Permission::SurveyPublish,
        Permission::SurveyDelete,
        Permission::QuestionWrite,
        Permission::SessionStart,
        Permission::SessionRead,
        Permission::ResponseSubmit,
        Permission::ResponseRead,
        Permission::AnalyticsRead,
        Permission::AnalysisWrite,
        Permission::CredentialRead,
        Permission::CredentialManage,
        Permission::SystemMaintain,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TenantRead => "tenant:read",
            Self::TenantManage => "tenant:manage",
            Self::TenantCreate => "tenant:create",
            Self::CrossTenant => "tenant:cross",
            Self::IdentityRead => "identity:read",
            Self::IdentityManage => "identity:manage",
            Self::SurveyRead => "survey:read",
            Self::SurveyWrite => "survey:write",
            Self::SurveyPublish => "survey:publish",
            Self::SurveyDelete => "survey:delete",
            Self::QuestionWrite => "question:write",
            Self::SessionStart => "session:start",
            Self::SessionRead => "session:read",
            Self::ResponseSubmit => "response:submit",
            Self::ResponseRead => "response:read",
            Self::AnalyticsRead => "analytics:read",
            Self::AnalysisWrite => "analysis:write",
            Self::CredentialRead => "credential:read",
            Self::CredentialManage => "credential:manage",
            Self::SystemMaintain => "system:maintain",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "permission",
                value: s.to_string(),
            })
    }
}

/// Ordered set of permissions.
pub type PermissionSet = BTreeSet<Permission>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_order_matches_hierarchy() {
        assert!(Role::Viewer < Role::User);
        assert!(Role::User < Role::Analyst);
        assert!(Role::Analyst < Role::TenantAdmin);
        assert!(Role::TenantAdmin < Role::SystemAdmin);
        for pair in Role::ALL.windows(2) {
            assert!(pair[0].ordinal() < pair[1].ordinal());
        }
    }

    #[test]
    fn tiers_up_to_includes_self() {
        let tiers: Vec<Role> = Role::Analyst.tiers_up_to().collect();
        assert_eq!(tiers, vec![Role::Viewer, Role::User, Role::Analyst]);
    }

    #[test]
    fn role_parse_and_serde() {
        assert_eq!("tenant_admin".parse::<Role>().unwrap(), Role::TenantAdmin);
        assert!("root".parse::<Role>().is_err());
        let json = serde_json::to_string(&Role::SystemAdmin).unwrap();
        assert_eq!(json, "\"SYSTEM_ADMIN\"");
    }

    #[test]
    fn permission_string_forms_agree() {
        for p in Permission::ALL {
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.as_str()));
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
    }

    #[test]
    fn unknown_permission() {
        let err = "survey:explode".parse::<Permission>().unwrap_err();
        assert!(err.to_string().contains("survey:explode"));
    }
}
