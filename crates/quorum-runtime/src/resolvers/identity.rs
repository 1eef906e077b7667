use super::{event, load_visible, ByIdArgs, Paging};
use crate::context::RequestContext;
use crate::orchestrator::{handler, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::{IdentityPatch, NewIdentity, ServiceError};
use quorum_auth::AccessDenied;
use quorum_event::MutationKind;
use quorum_types::{CredentialId, Identity, IdentityId, Permission, PermissionSet, Role, TenantId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    let manage = Access::Permission(Permission::IdentityManage);
    registry
        .query("me", Access::Authenticated, handler(me))?
        .query("identity", Access::Permission(Permission::IdentityRead), handler(identity))?
        .query("identities", Access::Permission(Permission::IdentityRead), handler(identities))?
        .mutation("createIdentity", manage, handler(create))?
        .mutation("updateIdentity", manage, handler(update))?
        .mutation("deleteIdentity", manage, handler(delete))?
        .mutation("grantPermission", manage, handler(grant))?
        .mutation("revokePermission", manage, handler(revoke))?;
    Ok(())
}

/// Callers cannot hand out a tier above their own.
fn check_assignable(ctx: &RequestContext, role: Role) -> Result<(), OperationError> {
    let caller = ctx.gate.require_authenticated()?;
    if caller.role.at_least(role) {
        Ok(())
    } else {
        Err(AccessDenied::InsufficientRole {
            required: role,
            actual: caller.role,
        }
        .into())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Me<'a> {
    #[serde(flatten)]
    identity: &'a Identity,
    effective_permissions: PermissionSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_id: Option<CredentialId>,
}

async fn me(ctx: Arc<RequestContext>, _args: serde_json::Value) -> Result<Outcome, OperationError> {
    let identity = ctx.gate.require_authenticated()?;
    Outcome::data(&Me {
        identity,
        effective_permissions: ctx.gate.effective_permissions(),
        credential_id: ctx.gate.credential_scope().map(|s| s.credential_id),
    })
}

async fn identity(ctx: Arc<RequestContext>, args: ByIdArgs<IdentityId>) -> Result<Outcome, OperationError> {
    let identity = load_visible::<Identity>(&ctx, args.id).await?;
    Outcome::data(&identity)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    #[serde(default)]
    tenant_id: Option<TenantId>,
    #[serde(flatten)]
    paging: Paging,
}

async fn identities(ctx: Arc<RequestContext>, args: ListArgs) -> Result<Outcome, OperationError> {
    let tenant = ctx.gate.resolve_tenant(args.tenant_id)?;
    let identities = ctx
        .services
        .identities
        .list_by_tenant(tenant, args.paging.page(&ctx))
        .await?;
    Outcome::data(&identities)
}

async fn create(ctx: Arc<RequestContext>, mut input: NewIdentity) -> Result<Outcome, OperationError> {
    check_assignable(&ctx, input.role)?;
    match input.tenant_id {
        Some(tenant) => ctx.gate.require_tenant_scope(tenant)?,
        None => input.tenant_id = ctx.gate.tenant_id(),
    }
    let identity = ctx.services.identities.create(input).await?;
    Ok(Outcome::data(&identity)?.with_event(event(MutationKind::Created, &identity)))
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    id: IdentityId,
    #[serde(flatten)]
    patch: IdentityPatch,
}

async fn update(ctx: Arc<RequestContext>, args: UpdateArgs) -> Result<Outcome, OperationError> {
    let target = load_visible::<Identity>(&ctx, args.id).await?;
    check_assignable(&ctx, target.role)?;
    if let Some(role) = args.patch.role {
        check_assignable(&ctx, role)?;
    }
    let identity = ctx.services.identities.update(args.id, args.patch).await?;
    Ok(Outcome::data(&identity)?.with_event(event(MutationKind::Updated, &identity)))
}

async fn delete(ctx: Arc<RequestContext>, args: ByIdArgs<IdentityId>) -> Result<Outcome, OperationError> {
    let target = load_visible::<Identity>(&ctx, args.id).await?;
    if ctx.gate.identity_id() == Some(target.id) {
        return Err(ServiceError::conflict("an identity cannot delete itself").into());
    }
    check_assignable(&ctx, target.role)?;
    let identity = ctx.services.identities.delete(args.id).await?;
    Ok(Outcome::data(&identity)?.with_event(event(MutationKind::Deleted, &identity)))
}

#[derive(Debug, Deserialize)]
struct GrantArgs {
    id: IdentityId,
    permission: Permission,
}

async fn grant(ctx: Arc<RequestContext>, args: GrantArgs) -> Result<Outcome, OperationError> {
    // A caller can only hand out what it holds itself.
    ctx.gate.require_permission(args.permission)?;
    let target = load_visible::<Identity>(&ctx, args.id).await?;
    check_assignable(&ctx, target.role)?;
    let identity = ctx.services.identities.grant(args.id, args.permission).await?;
    Ok(Outcome::data(&identity)?.with_event(event(MutationKind::Updated, &identity)))
}

async fn revoke(ctx: Arc<RequestContext>, args: GrantArgs) -> Result<Outcome, OperationError> {
    let target = load_visible::<Identity>(&ctx, args.id).await?;
    check_assignable(&ctx, target.role)?;
    let identity = ctx.services.identities.revoke(args.id, args.permission).await?;
    Ok(Outcome::data(&identity)?.with_event(event(MutationKind::Updated, &identity)))
}
