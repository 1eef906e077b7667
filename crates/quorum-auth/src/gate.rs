//! Authorization gate.
//!
//! An [`AuthorizationGate`] is bound to one request's resolved identity and
//! answers four questions about it:
//!
//! | Check | Fails with |
//! |-------|-----------|
//! | [`require_authenticated`](AuthorizationGate::require_authenticated) | `Unauthenticated` |
//! | [`require_permission`](AuthorizationGate::require_permission) | `MissingPermission` |
//! | [`require_role`](AuthorizationGate::require_role) | `InsufficientRole` |
//! | [`require_tenant_scope`](AuthorizationGate::require_tenant_scope) | `TenantMismatch` |
//!
//! Every check is a pure function of the bound identity, the injected
//! [`RoleMatrix`] and the requested scope. Checks never touch the store.
//!
//! # Effective Permissions
//!
//! ```text
//! effective = (permission_set(role) ∪ explicit_grants) ∩ credential_scope
//! ```
//!
//! SYSTEM_ADMIN holds every permission unconditionally, except that a
//! credential scope still narrows it. A revoked credential scope fails every
//! check with `CredentialRevoked`.
//!
//! # Audit Logging
//!
//! - Allowed checks: debug level
//! - Denied checks: warn level

use crate::{AccessDenied, CredentialScope, RoleMatrix};
use quorum_types::{Entity, Identity, IdentityId, Permission, PermissionSet, Role, TenantId};
use std::sync::Arc;

/// Request-scoped authorization evaluator.
///
/// # Example
///
/// ```
/// use quorum_auth::{AuthorizationGate, RoleMatrix};
/// use quorum_types::{Identity, Permission, Role, TenantId};
/// use std::sync::Arc;
///
/// let matrix = Arc::new(RoleMatrix::default());
/// let tenant = TenantId::new();
/// let analyst = Identity::new("a@example.com", Role::Analyst, Some(tenant));
///
/// let gate = AuthorizationGate::new(matrix, Some(Arc::new(analyst)));
/// assert!(gate.require_permission(Permission::AnalyticsRead).is_ok());
/// assert!(gate.require_permission(Permission::SurveyPublish).is_err());
/// assert!(gate.require_tenant_scope(tenant).is_ok());
/// assert!(gate.require_tenant_scope(TenantId::new()).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    matrix: Arc<RoleMatrix>,
    identity: Option<Arc<Identity>>,
    scope: Option<CredentialScope>,
}

impl AuthorizationGate {
    /// Binds a gate to a resolved identity.
    ///
    /// An inactive identity is treated as no identity.
    #[must_use]
    pub fn new(matrix: Arc<RoleMatrix>, identity: Option<Arc<Identity>>) -> Self {
        let identity = identity.filter(|id| {
            if !id.active {
                tracing::debug!(identity = %id.id, "inactive identity treated as anonymous");
            }
            id.active
        });
        Self {
            matrix,
            identity,
            scope: None,
        }
    }

    /// A gate with no identity.
    #[must_use]
    pub fn anonymous(matrix: Arc<RoleMatrix>) -> Self {
        Self::new(matrix, None)
    }

    /// Narrows this gate to an API credential's permission subset.
    #[must_use]
    pub fn with_credential_scope(mut self, scope: CredentialScope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_deref()
    }

    #[must_use]
    pub fn identity_id(&self) -> Option<IdentityId> {
        self.identity.as_ref().map(|id| id.id)
    }

    /// Home tenant of the caller.
    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.identity.as_ref().and_then(|id| id.tenant_id)
    }

    #[must_use]
    pub fn credential_scope(&self) -> Option<&CredentialScope> {
        self.scope.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && !self.scope_revoked()
    }

    fn scope_revoked(&self) -> bool {
        self.scope.as_ref().is_some_and(|s| s.revoked)
    }

    /// Returns `true` if the caller holds `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        let Some(identity) = self.identity.as_deref() else {
            return false;
        };
        let held = identity.role == Role::SystemAdmin
            || self.matrix.role_grants(identity.role, permission)
            || identity.has_grant(permission);
        match &self.scope {
            Some(scope) => held && scope.allows(permission),
            None => held,
        }
    }

    /// All permissions the caller effectively holds.
    #[must_use]
    pub fn effective_permissions(&self) -> PermissionSet {
        Permission::ALL
            .into_iter()
            .filter(|p| self.has_permission(*p))
            .collect()
    }

    /// Fails unless an active identity was resolved.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::Unauthenticated`] or
    /// [`AccessDenied::CredentialRevoked`].
    pub fn require_authenticated(&self) -> Result<&Identity, AccessDenied> {
        if self.scope_revoked() {
            tracing::warn!(identity = ?self.identity_id(), "check denied: credential revoked");
            return Err(AccessDenied::CredentialRevoked);
        }
        match self.identity.as_deref() {
            Some(identity) => Ok(identity),
            None => {
                tracing::debug!("check denied: unauthenticated");
                Err(AccessDenied::Unauthenticated)
            }
        }
    }

    /// Fails unless the caller holds `permission`.
    ///
    /// # Errors
    ///
    /// Authentication failures first, then [`AccessDenied::MissingPermission`].
    pub fn require_permission(&self, permission: Permission) -> Result<(), AccessDenied> {
        let identity = self.require_authenticated()?;
        if self.has_permission(permission) {
            tracing::debug!(identity = %identity.id, permission = %permission, "permission allowed");
            Ok(())
        } else {
            tracing::warn!(
                identity = %identity.id,
                role = %identity.role,
                permission = %permission,
                "permission denied"
            );
            Err(AccessDenied::MissingPermission { permission })
        }
    }

    /// Fails unless the caller's tier is at least `required`.
    ///
    /// Reserved for operations that are tier-gated rather than
    /// permission-gated.
    ///
    /// # Errors
    ///
    /// Authentication failures first, then [`AccessDenied::InsufficientRole`].
    pub fn require_role(&self, required: Role) -> Result<(), AccessDenied> {
        let identity = self.require_authenticated()?;
        if identity.role.at_least(required) {
            tracing::debug!(identity = %identity.id, role = %identity.role, required = %required, "role allowed");
            Ok(())
        } else {
            tracing::warn!(identity = %identity.id, role = %identity.role, required = %required, "role denied");
            Err(AccessDenied::InsufficientRole {
                required,
                actual: identity.role,
            })
        }
    }

    /// Fails unless the caller belongs to `tenant` or holds `tenant:cross`.
    ///
    /// Being an administrator of one tenant never implies access to another.
    ///
    /// # Errors
    ///
    /// Authentication failures first, then [`AccessDenied::TenantMismatch`].
    pub fn require_tenant_scope(&self, tenant: TenantId) -> Result<(), AccessDenied> {
        let identity = self.require_authenticated()?;
        if identity.tenant_id == Some(tenant) || self.has_permission(Permission::CrossTenant) {
            Ok(())
        } else {
            tracing::warn!(
                identity = %identity.id,
                home = ?identity.tenant_id,
                requested = %tenant,
                "tenant scope denied"
            );
            Err(AccessDenied::TenantMismatch { requested: tenant })
        }
    }

    /// Tenant-scopes any entity.
    ///
    /// Entities with no tenant (system identities) require `tenant:cross`.
    ///
    /// # Errors
    ///
    /// Same as [`require_tenant_scope`](Self::require_tenant_scope), or
    /// [`AccessDenied::MissingPermission`] for tenantless entities.
    pub fn require_entity_scope<E: Entity>(&self, entity: &E) -> Result<(), AccessDenied> {
        match entity.tenant_id() {
            Some(tenant) => self.require_tenant_scope(tenant),
            None => self.require_permission(Permission::CrossTenant),
        }
    }

    /// Returns `true` if [`require_entity_scope`](Self::require_entity_scope)
    /// would succeed.
    #[must_use]
    pub fn can_see<E: Entity>(&self, entity: &E) -> bool {
        match entity.tenant_id() {
            Some(tenant) => {
                self.is_authenticated()
                    && (self.tenant_id() == Some(tenant)
                        || self.has_permission(Permission::CrossTenant))
            }
            None => self.is_authenticated() && self.has_permission(Permission::CrossTenant),
        }
    }

    /// Tenant used when the caller does not name one explicitly.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::MissingPermission`] (`tenant:cross`) if the caller
    /// has no home tenant and `explicit` is `None`; otherwise the
    /// tenant-scope check result.
    pub fn resolve_tenant(&self, explicit: Option<TenantId>) -> Result<TenantId, AccessDenied> {
        let identity = self.require_authenticated()?;
        let tenant = match (explicit, identity.tenant_id) {
            (Some(t), _) | (None, Some(t)) => t,
            (None, None) => {
                return Err(AccessDenied::MissingPermission {
                    permission: Permission::CrossTenant,
                })
            }
        };
        self.require_tenant_scope(tenant)?;
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{CredentialId, Survey};

    fn matrix() -> Arc<RoleMatrix> {
        Arc::new(RoleMatrix::default())
    }

    fn gate_for(role: Role, tenant: Option<TenantId>) -> AuthorizationGate {
        let identity = Identity::new("x@example.com", role, tenant);
        AuthorizationGate::new(matrix(), Some(Arc::new(identity)))
    }

    fn scope(perms: &[Permission], revoked: bool) -> CredentialScope {
        CredentialScope {
            credential_id: CredentialId::new(),
            permissions: perms.iter().copied().collect(),
            revoked,
        }
    }

    #[test]
    fn anonymous_is_unauthenticated() {
        let gate = AuthorizationGate::anonymous(matrix());
        assert!(!gate.is_authenticated());
        assert_eq!(
            gate.require_authenticated().unwrap_err(),
            AccessDenied::Unauthenticated
        );
        assert_eq!(
            gate.require_permission(Permission::SurveyRead).unwrap_err(),
            AccessDenied::Unauthenticated
        );
        assert!(gate.effective_permissions().is_empty());
    }

    #[test]
    fn inactive_identity_is_anonymous() {
        let mut identity = Identity::new("gone@example.com", Role::TenantAdmin, None);
        identity.active = false;
        let gate = AuthorizationGate::new(matrix(), Some(Arc::new(identity)));
        assert!(gate.identity().is_none());
        assert!(gate.require_authenticated().is_err());
    }

    #[test]
    fn role_derived_permissions() {
        let gate = gate_for(Role::User, Some(TenantId::new()));
        assert!(gate.require_permission(Permission::SurveyRead).is_ok());
        assert!(gate.require_permission(Permission::ResponseSubmit).is_ok());
        assert_eq!(
            gate.require_permission(Permission::AnalyticsRead).unwrap_err(),
            AccessDenied::MissingPermission {
                permission: Permission::AnalyticsRead
            }
        );
    }

    #[test]
    fn explicit_grant_extends_role() {
        let identity = Identity::new("x@example.com", Role::Viewer, Some(TenantId::new()))
            .with_grant(Permission::AnalyticsRead);
        let gate = AuthorizationGate::new(matrix(), Some(Arc::new(identity)));
        assert!(gate.require_permission(Permission::AnalyticsRead).is_ok());
        assert!(gate.require_permission(Permission::ResponseRead).is_err());
    }

    #[test]
    fn system_admin_holds_everything() {
        let gate = gate_for(Role::SystemAdmin, None);
        for p in Permission::ALL {
            assert!(gate.require_permission(p).is_ok(), "{p}");
        }
    }

    #[test]
    fn require_role_is_ordinal() {
        let gate = gate_for(Role::Analyst, Some(TenantId::new()));
        assert!(gate.require_role(Role::Viewer).is_ok());
        assert!(gate.require_role(Role::Analyst).is_ok());
        assert!(matches!(
            gate.require_role(Role::TenantAdmin),
            Err(AccessDenied::InsufficientRole { .. })
        ));
    }

    #[test]
    fn user_cannot_reach_other_tenant() {
        let a = TenantId::new();
        let b = TenantId::new();
        let user = gate_for(Role::User, Some(a));
        assert!(user.require_tenant_scope(a).is_ok());
        assert_eq!(
            user.require_tenant_scope(b).unwrap_err(),
            AccessDenied::TenantMismatch { requested: b }
        );

        let admin = gate_for(Role::SystemAdmin, None);
        assert!(admin.require_tenant_scope(b).is_ok());
    }

    #[test]
    fn tenant_admin_is_not_cross_tenant() {
        let gate = gate_for(Role::TenantAdmin, Some(TenantId::new()));
        assert!(gate.require_tenant_scope(TenantId::new()).is_err());
    }

    #[test]
    fn explicit_cross_tenant_grant() {
        let identity = Identity::new("auditor@example.com", Role::Analyst, Some(TenantId::new()))
            .with_grant(Permission::CrossTenant);
        let gate = AuthorizationGate::new(matrix(), Some(Arc::new(identity)));
        assert!(gate.require_tenant_scope(TenantId::new()).is_ok());
    }

    #[test]
    fn credential_scope_narrows() {
        let tenant = TenantId::new();
        let gate = gate_for(Role::TenantAdmin, Some(tenant))
            .with_credential_scope(scope(&[Permission::SurveyRead, Permission::SystemMaintain], false));
        assert!(gate.require_permission(Permission::SurveyRead).is_ok());
        // In the key's subset but not held by the owner.
        assert!(gate.require_permission(Permission::SystemMaintain).is_err());
        // Held by the owner but outside the key's subset.
        assert!(gate.require_permission(Permission::SurveyPublish).is_err());
    }

    #[test]
    fn credential_scope_narrows_system_admin() {
        let gate = gate_for(Role::SystemAdmin, None)
            .with_credential_scope(scope(&[Permission::SurveyRead], false));
        assert!(gate.require_permission(Permission::SurveyRead).is_ok());
        assert!(gate.require_permission(Permission::TenantCreate).is_err());
        assert!(gate.require_tenant_scope(TenantId::new()).is_err());
    }

    #[test]
    fn revoked_scope_fails_every_check() {
        let tenant = TenantId::new();
        let gate = gate_for(Role::SystemAdmin, Some(tenant))
            .with_credential_scope(scope(&Permission::ALL, true));
        assert!(!gate.is_authenticated());
        assert_eq!(
            gate.require_authenticated().unwrap_err(),
            AccessDenied::CredentialRevoked
        );
        for p in Permission::ALL {
            assert_eq!(
                gate.require_permission(p).unwrap_err(),
                AccessDenied::CredentialRevoked
            );
        }
        assert!(gate.require_role(Role::Viewer).is_err());
        assert!(gate.require_tenant_scope(tenant).is_err());
    }

    #[test]
    fn entity_scope() {
        let a = TenantId::new();
        let gate = gate_for(Role::Viewer, Some(a));
        let own = Survey::new(a, "mine");
        let other = Survey::new(TenantId::new(), "theirs");
        assert!(gate.require_entity_scope(&own).is_ok());
        assert!(gate.can_see(&own));
        assert!(gate.require_entity_scope(&other).is_err());
        assert!(!gate.can_see(&other));

        let root = Identity::new("root@example.com", Role::SystemAdmin, None);
        assert!(gate.require_entity_scope(&root).is_err());
    }

    #[test]
    fn resolve_tenant_defaults_to_home() {
        let a = TenantId::new();
        let gate = gate_for(Role::Analyst, Some(a));
        assert_eq!(gate.resolve_tenant(None).unwrap(), a);
        assert!(gate.resolve_tenant(Some(TenantId::new())).is_err());

        let admin = gate_for(Role::SystemAdmin, None);
        assert!(admin.resolve_tenant(None).is_err());
        let b = TenantId::new();
        assert_eq!(admin.resolve_tenant(Some(b)).unwrap(), b);
    }
}
