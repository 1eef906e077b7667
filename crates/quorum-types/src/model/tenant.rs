use super::{Entity, EntityKind};
use crate::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An organization; the isolation boundary for surveys, sessions,
/// responses and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub trial: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Tenant {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TenantId::new(),
            name: name.into(),
            settings: BTreeMap::new(),
            active: true,
            trial: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Tenant {
    type Id = TenantId;
    const KIND: EntityKind = EntityKind::Tenant;

    fn id(&self) -> TenantId {
        self.id
    }

    /// A tenant is scoped to itself.
    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.id)
    }
}
