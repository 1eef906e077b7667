use super::{Entity, EntityKind};
use crate::{IdentityId, Permission, PermissionSet, Role, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated caller.
///
/// An identity only states *who* the caller is and which tier and explicit
/// grants it holds. What those allow is decided by the authorization gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    /// Permissions granted on top of the role-derived set.
    #[serde(default)]
    pub grants: PermissionSet,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Identity {
    /// Creates an active, unverified identity with no explicit grants.
    #[must_use]
    pub fn new(email: impl Into<String>, role: Role, tenant_id: Option<TenantId>) -> Self {
        Self {
            id: IdentityId::new(),
            email: email.into(),
            display_name: String::new(),
            role,
            tenant_id,
            grants: PermissionSet::new(),
            active: true,
            verified: false,
            last_seen_at: None,
            created_at: Utc::now(),
        }
    }

    /// Builder-style explicit grant, used by fixtures.
    #[must_use]
    pub fn with_grant(mut self, permission: Permission) -> Self {
        self.grants.insert(permission);
        self
    }

    /// Returns `true` if the permission was granted explicitly.
    #[must_use]
    pub fn has_grant(&self, permission: Permission) -> bool {
        self.grants.contains(&permission)
    }
}

impl Entity for Identity {
    type Id = IdentityId;
    const KIND: EntityKind = EntityKind::Identity;

    fn id(&self) -> IdentityId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }
}
