//! Operation table.
//!
//! Resolver modules register their operations explicitly; a name can be
//! registered once. The table is built at startup and read-only afterwards.

use super::error::RegistryError;
use super::handler::Handler;
use quorum_auth::{AccessDenied, AuthorizationGate};
use quorum_types::{Permission, Role};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// Gate requirement checked before an operation's arguments are parsed.
///
/// Entity-level tenant scoping happens inside handlers, once the target
/// entity is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No identity needed.
    Public,
    Authenticated,
    Permission(Permission),
    /// Tier-gated; reserved for system maintenance.
    Role(Role),
}

impl Access {
    /// Runs the requirement against the gate.
    ///
    /// # Errors
    ///
    /// The gate's denial.
    pub fn check(self, gate: &AuthorizationGate) -> Result<(), AccessDenied> {
        match self {
            Self::Public => Ok(()),
            Self::Authenticated => gate.require_authenticated().map(|_| ()),
            Self::Permission(permission) => gate.require_permission(permission),
            Self::Role(role) => gate.require_role(role),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Permission(p) => write!(f, "permission {p}"),
            Self::Role(r) => write!(f, "role {r}"),
        }
    }
}

/// One registered operation.
#[derive(Clone)]
pub struct OperationDef {
    pub name: String,
    pub kind: OperationKind,
    pub access: Access,
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for OperationDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, OperationDef>,
}

impl OperationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Duplicate`] if the name is taken.
    pub fn register(&mut self, def: OperationDef) -> Result<&mut Self, RegistryError> {
        if self.operations.contains_key(&def.name) {
            return Err(RegistryError::Duplicate(def.name));
        }
        tracing::trace!(operation = %def.name, access = %def.access, "operation registered");
        self.operations.insert(def.name.clone(), def);
        Ok(self)
    }

    /// Registers a read operation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Duplicate`] if the name is taken.
    pub fn query(
        &mut self,
        name: &str,
        access: Access,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, RegistryError> {
        self.register(OperationDef {
            name: name.to_string(),
            kind: OperationKind::Query,
            access,
            handler,
        })
    }

    /// Registers a write operation. Its events are published on success.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Duplicate`] if the name is taken.
    pub fn mutation(
        &mut self,
        name: &str,
        access: Access,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, RegistryError> {
        self.register(OperationDef {
            name: name.to_string(),
            kind: OperationKind::Mutation,
            access,
            handler,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OperationDef> {
        self.operations.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::handler::{handler, Outcome};
    use crate::orchestrator::OperationError;
    use crate::context::RequestContext;
    use quorum_auth::RoleMatrix;
    use quorum_types::{Identity, TenantId};
    use serde_json::Value;

    async fn noop(_ctx: Arc<RequestContext>, _args: Value) -> Result<Outcome, OperationError> {
        Ok(Outcome::default())
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = OperationRegistry::new();
        registry
            .query("survey", Access::Public, handler(noop))
            .unwrap();
        let err = registry
            .mutation("survey", Access::Authenticated, handler(noop))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("survey".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("survey").unwrap().kind, OperationKind::Query);
    }

    #[test]
    fn access_checks() {
        let matrix = Arc::new(RoleMatrix::default());
        let anonymous = AuthorizationGate::anonymous(Arc::clone(&matrix));
        let analyst = AuthorizationGate::new(
            Arc::clone(&matrix),
            Some(Arc::new(Identity::new("a@example.com", Role::Analyst, Some(TenantId::new())))),
        );

        assert!(Access::Public.check(&anonymous).is_ok());
        assert_eq!(Access::Authenticated.check(&anonymous), Err(AccessDenied::Unauthenticated));
        assert!(Access::Permission(Permission::AnalyticsRead).check(&analyst).is_ok());
        assert!(Access::Permission(Permission::SurveyPublish).check(&analyst).is_err());
        assert!(Access::Role(Role::SystemAdmin).check(&analyst).is_err());
    }
}
