//! API key service.
//!
//! Keys look like `qk_<64 hex chars>`. The plaintext is handed out exactly
//! once by [`CredentialService::issue`]; only its SHA-256 digest is stored.

use super::{required_text, ServiceDeps, ServiceError};
use crate::store::Filter;
use chrono::Utc;
use quorum_types::{
    Credential, CredentialId, Identity, IdentityId, PermissionSet, TenantId, API_KEY_PREFIX,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Characters of the plaintext kept for display.
const DISPLAY_PREFIX_LEN: usize = 10;

/// Hex-encoded SHA-256 of a plaintext key.
#[must_use]
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn generate_key() -> String {
    format!(
        "{API_KEY_PREFIX}{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCredential {
    pub name: String,
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// A freshly issued key. `key` is never retrievable again.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub credential: Credential,
    pub key: String,
}

/// A key that matched a stored credential.
#[derive(Debug, Clone)]
pub struct AuthenticatedKey {
    pub credential: Credential,
    pub owner: Identity,
}

#[derive(Clone)]
pub struct CredentialService {
    deps: ServiceDeps,
}

impl CredentialService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn get(&self, id: CredentialId) -> Result<Credential, ServiceError> {
        self.deps.require::<Credential>(id).await
    }

    /// Issues a key owned by `owner` within `tenant`.
    pub async fn issue(
        &self,
        owner: IdentityId,
        tenant: TenantId,
        input: NewCredential,
    ) -> Result<IssuedCredential, ServiceError> {
        let name = required_text("name", &input.name)?;
        let key = generate_key();
        let credential = Credential {
            id: CredentialId::new(),
            owner_id: owner,
            tenant_id: tenant,
            name,
            key_prefix: key.chars().take(DISPLAY_PREFIX_LEN).collect(),
            key_hash: hash_key(&key),
            permissions: input.permissions,
            active: true,
            revoked: false,
            revoked_at: None,
            revoked_by: None,
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
        };
        let credential = self.deps.insert(credential).await?;
        self.deps.loaders.credentials_by_tenant.clear(&tenant);
        tracing::info!(credential = %credential.id, owner = %owner, "credential issued");
        Ok(IssuedCredential { credential, key })
    }

    /// Revokes a key. Revoking twice is a no-op; the flag reports whether
    /// this call changed anything.
    pub async fn revoke(
        &self,
        id: CredentialId,
        by: Option<IdentityId>,
    ) -> Result<(Credential, bool), ServiceError> {
        let mut credential = self.get(id).await?;
        if !credential.revoke(by, Utc::now()) {
            return Ok((credential, false));
        }
        let credential = self.deps.save(credential).await?;
        self.deps
            .loaders
            .credentials_by_tenant
            .clear(&credential.tenant_id);
        tracing::info!(credential = %id, "credential revoked");
        Ok((credential, true))
    }

    /// Looks up the credential for a plaintext key.
    ///
    /// Revoked keys are still returned so the caller can tell a revoked key
    /// from an unknown one. Usage is recorded only for usable keys, and a
    /// failure to record it does not fail authentication.
    pub async fn authenticate(&self, key: &str) -> Result<Option<AuthenticatedKey>, ServiceError> {
        if !key.starts_with(API_KEY_PREFIX) {
            return Ok(None);
        }
        let matches: Vec<Credential> = self
            .deps
            .list(vec![Filter::KeyHash(hash_key(key))], None)
            .await?;
        let Some(mut credential) = matches.into_iter().next() else {
            return Ok(None);
        };
        let Some(owner) = self.deps.find::<Identity>(credential.owner_id).await else {
            tracing::warn!(credential = %credential.id, "credential owner missing");
            return Ok(None);
        };

        if credential.is_usable() {
            credential.record_use(Utc::now());
            match self.deps.save(credential.clone()).await {
                Ok(saved) => {
                    self.deps.loaders.credentials_by_tenant.clear(&saved.tenant_id);
                    credential = saved;
                }
                Err(err) => {
                    tracing::warn!(credential = %credential.id, error = %err, "failed to record key usage");
                }
            }
        }
        Ok(Some(AuthenticatedKey { credential, owner }))
    }

    /// Credentials of a tenant, newest last.
    pub async fn list_by_tenant(&self, tenant: TenantId) -> Vec<Credential> {
        self.deps
            .loaders
            .credentials_by_tenant
            .load(tenant)
            .await
            .unwrap_or_default()
    }
}
