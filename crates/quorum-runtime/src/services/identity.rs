//! Identity service.

use super::{required_text, ServiceDeps, ServiceError};
use crate::store::Filter;
use chrono::{DateTime, Utc};
use quorum_types::{Identity, IdentityId, Page, Permission, Role, TenantId};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIdentity {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

/// Partial identity update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityPatch {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub verified: Option<bool>,
}

#[derive(Clone)]
pub struct IdentityService {
    deps: ServiceDeps,
}

fn normalize_email(email: &str) -> Result<String, ServiceError> {
    let email = required_text("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_lowercase())
        }
        _ => Err(ServiceError::invalid_field("email", "email address is malformed")),
    }
}

impl IdentityService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn get(&self, id: IdentityId) -> Result<Identity, ServiceError> {
        self.deps.require::<Identity>(id).await
    }

    /// Creates an identity. Only SYSTEM_ADMIN identities may be tenantless.
    pub async fn create(&self, input: NewIdentity) -> Result<Identity, ServiceError> {
        let email = normalize_email(&input.email)?;
        if input.tenant_id.is_none() && input.role != Role::SystemAdmin {
            return Err(ServiceError::invalid_field(
                "tenantId",
                "only system administrators may exist outside a tenant",
            ));
        }
        let mut identity = Identity::new(email, input.role, input.tenant_id);
        identity.display_name = input.display_name.trim().to_string();
        let identity = self.deps.insert(identity).await?;
        tracing::info!(identity = %identity.id, role = %identity.role, "identity created");
        Ok(identity)
    }

    pub async fn update(&self, id: IdentityId, patch: IdentityPatch) -> Result<Identity, ServiceError> {
        let mut identity = self.get(id).await?;
        if let Some(name) = patch.display_name {
            identity.display_name = name.trim().to_string();
        }
        if let Some(role) = patch.role {
            if identity.tenant_id.is_none() && role != Role::SystemAdmin {
                return Err(ServiceError::invalid_field(
                    "role",
                    "a tenantless identity must stay a system administrator",
                ));
            }
            identity.role = role;
        }
        if let Some(active) = patch.active {
            identity.active = active;
        }
        if let Some(verified) = patch.verified {
            identity.verified = verified;
        }
        self.deps.save(identity).await
    }

    /// Deletes an identity that owns no credentials.
    pub async fn delete(&self, id: IdentityId) -> Result<Identity, ServiceError> {
        let identity = self.get(id).await?;
        match self.deps.remove::<Identity>(id).await {
            Ok(_) => Ok(identity),
            Err(ServiceError::Validation { .. }) => Err(ServiceError::conflict(
                "identity still owns credentials; revoke and remove them first",
            )),
            Err(err) => Err(err),
        }
    }

    /// Adds an explicit permission on top of the role's set.
    pub async fn grant(&self, id: IdentityId, permission: Permission) -> Result<Identity, ServiceError> {
        let mut identity = self.get(id).await?;
        if permission == Permission::CrossTenant && identity.tenant_id.is_some() {
            tracing::warn!(identity = %id, "cross-tenant access granted explicitly");
        }
        if identity.grants.insert(permission) {
            return self.deps.save(identity).await;
        }
        Ok(identity)
    }

    /// Removes an explicit permission. Role-derived permissions are unaffected.
    pub async fn revoke(&self, id: IdentityId, permission: Permission) -> Result<Identity, ServiceError> {
        let mut identity = self.get(id).await?;
        if identity.grants.remove(&permission) {
            return self.deps.save(identity).await;
        }
        Ok(identity)
    }

    /// Records that the identity made a request.
    pub async fn touch_last_seen(&self, id: IdentityId, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let mut identity = self.get(id).await?;
        identity.last_seen_at = Some(now);
        self.deps.save(identity).await.map(|_| ())
    }

    pub async fn list_by_tenant(&self, tenant: TenantId, page: Page) -> Result<Vec<Identity>, ServiceError> {
        self.deps.list(vec![Filter::Tenant(tenant)], Some(page)).await
    }
}
