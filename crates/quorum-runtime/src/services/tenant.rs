//! Tenant service.

use super::{required_text, ServiceDeps, ServiceError};
use chrono::Utc;
use quorum_types::{Page, Tenant, TenantId};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Partial tenant update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantPatch {
    pub name: Option<String>,
    /// Keys set to `null` are removed.
    pub settings: Option<BTreeMap<String, Value>>,
    pub active: Option<bool>,
    pub trial: Option<bool>,
}

#[derive(Clone)]
pub struct TenantService {
    deps: ServiceDeps,
}

impl TenantService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn get(&self, id: TenantId) -> Result<Tenant, ServiceError> {
        self.deps.require::<Tenant>(id).await
    }

    /// Creates a tenant. Names are unique, ignoring case.
    pub async fn create(&self, name: &str, trial: bool) -> Result<Tenant, ServiceError> {
        let mut tenant = Tenant::new(required_text("name", name)?);
        tenant.trial = trial;
        let tenant = self.deps.insert(tenant).await?;
        tracing::info!(tenant = %tenant.id, name = %tenant.name, "tenant created");
        Ok(tenant)
    }

    pub async fn update(&self, id: TenantId, patch: TenantPatch) -> Result<Tenant, ServiceError> {
        let mut tenant = self.get(id).await?;
        if let Some(name) = patch.name {
            tenant.name = required_text("name", &name)?;
        }
        if let Some(settings) = patch.settings {
            for (key, value) in settings {
                if value.is_null() {
                    tenant.settings.remove(&key);
                } else {
                    tenant.settings.insert(key, value);
                }
            }
        }
        if let Some(active) = patch.active {
            tenant.active = active;
        }
        if let Some(trial) = patch.trial {
            tenant.trial = trial;
        }
        tenant.updated_at = Utc::now();
        self.deps.save(tenant).await
    }

    /// Deletes an empty tenant.
    ///
    /// A tenant that still owns identities, surveys or credentials cannot be
    /// deleted; deactivate it instead.
    pub async fn delete(&self, id: TenantId) -> Result<Tenant, ServiceError> {
        let tenant = self.get(id).await?;
        match self.deps.remove::<Tenant>(id).await {
            Ok(_) => {
                self.deps.loaders.credentials_by_tenant.clear(&id);
                tracing::info!(tenant = %id, "tenant deleted");
                Ok(tenant)
            }
            Err(ServiceError::Validation { .. }) => Err(ServiceError::conflict(
                "tenant still owns records; deactivate it instead",
            )),
            Err(err) => Err(err),
        }
    }

    pub async fn list(&self, page: Page) -> Result<Vec<Tenant>, ServiceError> {
        self.deps.list(Vec::new(), Some(page)).await
    }
}
