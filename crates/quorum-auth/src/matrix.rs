//! Role → permission matrix.
//!
//! The matrix stores the *incremental* permissions each tier adds on top of
//! the tiers below it. A tier's effective set is the union of its own
//! increment and every lower tier's increment, so for `R1 < R2`,
//! `permission_set(R1) ⊆ permission_set(R2)` always holds.
//!
//! # Default Increments
//!
//! | Tier | Adds |
//! |------|------|
//! | VIEWER | `survey:read`, `tenant:read` |
//! | USER | `session:start`, `session:read`, `response:submit` |
//! | ANALYST | `response:read`, `analytics:read`, `analysis:write`, `survey:write`, `question:write`, `identity:read` |
//! | TENANT_ADMIN | `survey:publish`, `survey:delete`, `identity:manage`, `credential:read`, `credential:manage`, `tenant:manage` |
//! | SYSTEM_ADMIN | `tenant:cross`, `tenant:create`, `system:maintain` |
//!
//! The matrix is built once at startup and shared as `Arc<RoleMatrix>`;
//! it is never mutated afterwards.

use quorum_types::{Permission, PermissionSet, Role};
use std::collections::BTreeMap;
use thiserror::Error;

/// Invalid role matrix configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// Cross-tenant access may only come from SYSTEM_ADMIN or an explicit
    /// per-identity grant.
    #[error("{0} cannot be granted tenant:cross through the role matrix")]
    CrossTenantBelowSystem(Role),
}

impl quorum_types::ErrorCode for MatrixError {
    fn code(&self) -> &'static str {
        match self {
            Self::CrossTenantBelowSystem(_) => "AUTH_MATRIX_CROSS_TENANT",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMatrix {
    increments: BTreeMap<Role, PermissionSet>,
    /// Cumulative sets, precomputed.
    effective: BTreeMap<Role, PermissionSet>,
}

impl RoleMatrix {
    /// Builds a matrix from per-tier increments.
    ///
    /// Tiers missing from `increments` add nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::CrossTenantBelowSystem`] if `tenant:cross` is
    /// assigned to any tier below SYSTEM_ADMIN.
    pub fn from_increments(
        increments: BTreeMap<Role, PermissionSet>,
    ) -> Result<Self, MatrixError> {
        for (role, set) in &increments {
            if *role != Role::SystemAdmin && set.contains(&Permission::CrossTenant) {
                return Err(MatrixError::CrossTenantBelowSystem(*role));
            }
        }

        Ok(Self::cumulative(increments))
    }

    fn cumulative(increments: BTreeMap<Role, PermissionSet>) -> Self {
        let mut effective = BTreeMap::new();
        let mut acc = PermissionSet::new();
        for role in Role::ALL {
            if let Some(set) = increments.get(&role) {
                acc.extend(set.iter().copied());
            }
            effective.insert(role, acc.clone());
        }
        Self {
            increments,
            effective,
        }
    }

    /// Returns a copy with the increments of the given tiers replaced.
    ///
    /// # Errors
    ///
    /// Same as [`from_increments`](Self::from_increments).
    pub fn with_overrides(
        &self,
        overrides: BTreeMap<Role, PermissionSet>,
    ) -> Result<Self, MatrixError> {
        let mut increments = self.increments.clone();
        increments.extend(overrides);
        Self::from_increments(increments)
    }

    /// Effective permission set of `role` (union over all tiers ≤ role).
    #[must_use]
    pub fn permission_set(&self, role: Role) -> &PermissionSet {
        // cumulative() inserts every tier.
        &self.effective[&role]
    }

    /// Permissions `role` adds over the tier below it.
    #[must_use]
    pub fn increment(&self, role: Role) -> PermissionSet {
        self.increments.get(&role).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn role_grants(&self, role: Role, permission: Permission) -> bool {
        self.permission_set(role).contains(&permission)
    }
}

impl Default for RoleMatrix {
    fn default() -> Self {
        use Permission::*;
        let increments: BTreeMap<Role, PermissionSet> = [
            (Role::Viewer, vec![SurveyRead, TenantRead]),
            (Role::User, vec![SessionStart, SessionRead, ResponseSubmit]),
            (
                Role::Analyst,
                vec![
                    ResponseRead,
                    AnalyticsRead,
                    AnalysisWrite,
                    SurveyWrite,
                    QuestionWrite,
                    IdentityRead,
                ],
            ),
            (
                Role::TenantAdmin,
                vec![
                    SurveyPublish,
                    SurveyDelete,
                    IdentityManage,
                    CredentialRead,
                    CredentialManage,
                    TenantManage,
                ],
            ),
            (Role::SystemAdmin, vec![CrossTenant, TenantCreate, SystemMaintain]),
        ]
        .into_iter()
        .map(|(role, perms)| (role, perms.into_iter().collect()))
        .collect();
        Self::cumulative(increments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_monotonic(matrix: &RoleMatrix) {
        for lower in Role::ALL {
            for higher in Role::ALL.into_iter().filter(|r| *r > lower) {
                let lo = matrix.permission_set(lower);
                let hi = matrix.permission_set(higher);
                assert!(lo.is_subset(hi), "{lower} ⊄ {higher}");
            }
        }
    }

    #[test]
    fn default_sets_are_monotonic() {
        assert_monotonic(&RoleMatrix::default());
    }

    #[test]
    fn overridden_sets_stay_monotonic() {
        let overrides = [(
            Role::Viewer,
            [Permission::AnalyticsRead].into_iter().collect(),
        )]
        .into_iter()
        .collect();
        let matrix = RoleMatrix::default().with_overrides(overrides).unwrap();
        assert_monotonic(&matrix);
        assert!(matrix.role_grants(Role::Viewer, Permission::AnalyticsRead));
        assert!(!matrix.role_grants(Role::Viewer, Permission::SurveyRead));
        assert!(matrix.role_grants(Role::Analyst, Permission::AnalyticsRead));
    }

    #[test]
    fn default_tiers() {
        let m = RoleMatrix::default();
        assert!(m.role_grants(Role::Viewer, Permission::SurveyRead));
        assert!(!m.role_grants(Role::Viewer, Permission::SessionStart));
        assert!(m.role_grants(Role::User, Permission::SurveyRead));
        assert!(m.role_grants(Role::Analyst, Permission::AnalyticsRead));
        assert!(!m.role_grants(Role::Analyst, Permission::SurveyPublish));
        assert!(m.role_grants(Role::TenantAdmin, Permission::CredentialManage));
        assert!(!m.role_grants(Role::TenantAdmin, Permission::CrossTenant));
        assert_eq!(
            m.permission_set(Role::SystemAdmin).len(),
            Permission::ALL.len()
        );
    }

    #[test]
    fn default_matches_from_increments() {
        let m = RoleMatrix::default();
        let rebuilt = RoleMatrix::from_increments(
            Role::ALL.into_iter().map(|r| (r, m.increment(r))).collect(),
        )
        .unwrap();
        assert_eq!(rebuilt, m);
    }

    #[test]
    fn cross_tenant_reserved_for_system_admin() {
        let overrides = [(
            Role::TenantAdmin,
            [Permission::CrossTenant].into_iter().collect(),
        )]
        .into_iter()
        .collect();
        let err = RoleMatrix::default().with_overrides(overrides).unwrap_err();
        assert_eq!(err, MatrixError::CrossTenantBelowSystem(Role::TenantAdmin));
    }
}
