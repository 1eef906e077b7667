//! Credential scope.

use quorum_types::{Credential, CredentialId, Permission, PermissionSet};
use serde::{Deserialize, Serialize};

/// Restrictions carried by a request that authenticated with an API key.
///
/// The caller's permissions are intersected with [`permissions`](Self::permissions),
/// so a key can never do more than its owner, and its owner's role never
/// widens what the key was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialScope {
    pub credential_id: CredentialId,
    pub permissions: PermissionSet,
    pub revoked: bool,
}

impl CredentialScope {
    #[must_use]
    pub fn from_credential(credential: &Credential) -> Self {
        Self {
            credential_id: credential.id,
            permissions: credential.permissions.clone(),
            revoked: !credential.is_usable(),
        }
    }

    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        !self.revoked && self.permissions.contains(&permission)
    }
}
