use super::{Entity, EntityKind};
use crate::{CredentialId, IdentityId, PermissionSet, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix carried by every plaintext API key.
pub const API_KEY_PREFIX: &str = "qk_";

/// A long-lived API key.
///
/// Only the SHA-256 hash of the key is stored; the plaintext is returned
/// once at issuance. Revocation is soft and irreversible: once `revoked` is
/// set, [`Credential::revoke`] never clears it and nothing else writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: CredentialId,
    pub owner_id: IdentityId,
    pub tenant_id: TenantId,
    pub name: String,
    /// First characters of the plaintext key, for display.
    pub key_prefix: String,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    /// Upper bound on what the key may do.
    #[serde(default)]
    pub permissions: PermissionSet,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_by: Option<IdentityId>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Credential {
    /// Returns `true` if the key may authenticate.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.active && !self.revoked
    }

    /// Revokes the key. Returns `false` if it was already revoked, in which
    /// case nothing changes.
    pub fn revoke(&mut self, by: Option<IdentityId>, now: DateTime<Utc>) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.active = false;
        self.revoked_at = Some(now);
        self.revoked_by = by;
        true
    }

    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used_at = Some(now);
    }
}

impl Entity for Credential {
    type Id = CredentialId;
    const KIND: EntityKind = EntityKind::Credential;

    fn id(&self) -> CredentialId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            id: CredentialId::new(),
            owner_id: IdentityId::new(),
            tenant_id: TenantId::new(),
            name: "ci".into(),
            key_prefix: "qk_abcd".into(),
            key_hash: "deadbeef".into(),
            permissions: PermissionSet::new(),
            active: true,
            revoked: false,
            revoked_at: None,
            revoked_by: None,
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn revoke_is_idempotent() {
        let mut c = credential();
        let admin = IdentityId::new();
        let first = Utc::now();
        assert!(c.revoke(Some(admin), first));
        let snapshot = c.clone();

        assert!(!c.revoke(None, first + chrono::Duration::hours(1)));
        assert_eq!(c, snapshot);
        assert!(!c.is_usable());
        assert_eq!(c.revoked_by, Some(admin));
    }

    #[test]
    fn hash_is_never_serialized() {
        let json = serde_json::to_value(credential()).unwrap();
        assert!(json.get("keyHash").is_none());
        assert_eq!(json["keyPrefix"], "qk_abcd");
    }
}
