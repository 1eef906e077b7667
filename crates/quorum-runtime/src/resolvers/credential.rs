use super::{event, load_visible, ByIdArgs};
use crate::context::RequestContext;
use crate::orchestrator::{handler, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::NewCredential;
use quorum_auth::AccessDenied;
use quorum_event::MutationKind;
use quorum_types::{Credential, CredentialId, Permission, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    let manage = Access::Permission(Permission::CredentialManage);
    registry
        .query("credentials", Access::Permission(Permission::CredentialRead), handler(credentials))?
        .mutation("issueCredential", manage, handler(issue))?
        .mutation("revokeCredential", manage, handler(revoke))?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    #[serde(default)]
    tenant_id: Option<TenantId>,
}

async fn credentials(ctx: Arc<RequestContext>, args: ListArgs) -> Result<Outcome, OperationError> {
    let tenant = ctx.gate.resolve_tenant(args.tenant_id)?;
    let credentials = ctx.services.credentials.list_by_tenant(tenant).await;
    Outcome::data(&credentials)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueArgs {
    #[serde(default)]
    tenant_id: Option<TenantId>,
    #[serde(flatten)]
    credential: NewCredential,
}

async fn issue(ctx: Arc<RequestContext>, args: IssueArgs) -> Result<Outcome, OperationError> {
    let tenant = ctx.gate.resolve_tenant(args.tenant_id)?;
    let owner = ctx.gate.require_authenticated()?.id;

    // A key can never carry more than its issuer holds.
    let held = ctx.gate.effective_permissions();
    if let Some(missing) = args.credential.permissions.iter().find(|p| !held.contains(*p)) {
        return Err(AccessDenied::MissingPermission {
            permission: *missing,
        }
        .into());
    }

    let issued = ctx.services.credentials.issue(owner, tenant, args.credential).await?;
    Ok(Outcome::data(&issued)?.with_event(event(MutationKind::Created, &issued.credential)))
}

#[derive(Debug, Serialize)]
struct Revoked {
    credential: Credential,
    changed: bool,
}

async fn revoke(ctx: Arc<RequestContext>, args: ByIdArgs<CredentialId>) -> Result<Outcome, OperationError> {
    load_visible::<Credential>(&ctx, args.id).await?;
    let (credential, changed) = ctx
        .services
        .credentials
        .revoke(args.id, ctx.gate.identity_id())
        .await?;
    let outcome = Outcome::data(&Revoked {
        credential: credential.clone(),
        changed,
    })?;
    Ok(if changed {
        let revoked_by = credential.revoked_by;
        outcome.with_event(event(MutationKind::Revoked, &credential).with_payload(json!({ "revokedBy": revoked_by })))
    } else {
        outcome
    })
}
