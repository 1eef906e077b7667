use super::{check_includes, event, load_visible, ByIdArgs, Expanded, Paging};
use crate::context::RequestContext;
use crate::orchestrator::{handler, to_value, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::TenantPatch;
use quorum_event::MutationKind;
use quorum_types::{Permission, Tenant, TenantId};
use serde::Deserialize;
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    registry
        .query("tenant", Access::Permission(Permission::TenantRead), handler(tenant))?
        .query("tenants", Access::Permission(Permission::CrossTenant), handler(tenants))?
        .mutation("createTenant", Access::Permission(Permission::TenantCreate), handler(create))?
        .mutation("updateTenant", Access::Permission(Permission::TenantManage), handler(update))?
        .mutation("deleteTenant", Access::Permission(Permission::TenantCreate), handler(delete))?;
    Ok(())
}

const INCLUDES: &[&str] = &["surveys", "credentials"];

async fn expand(ctx: &RequestContext, tenant: &Tenant, include: &[String]) -> Result<Expanded, OperationError> {
    let mut out = Expanded::new(tenant)?;
    for field in include {
        let value = match field.as_str() {
            "surveys" => {
                let page = Paging::default().page(ctx);
                match ctx.services.surveys.list(tenant.id, None, page).await {
                    Ok(surveys) => to_value(&surveys),
                    Err(err) => Err(err.into()),
                }
            }
            "credentials" => match ctx.gate.require_permission(Permission::CredentialRead) {
                Ok(()) => to_value(&ctx.services.credentials.list_by_tenant(tenant.id).await),
                Err(denied) => Err(denied.into()),
            },
            _ => continue,
        };
        out.attach(field, value);
    }
    Ok(out)
}

async fn tenant(ctx: Arc<RequestContext>, args: ByIdArgs<TenantId>) -> Result<Outcome, OperationError> {
    check_includes("tenant", &args.include, INCLUDES)?;
    let tenant = load_visible::<Tenant>(&ctx, args.id).await?;
    Ok(expand(&ctx, &tenant, &args.include).await?.into_outcome())
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(flatten)]
    paging: Paging,
}

async fn tenants(ctx: Arc<RequestContext>, args: ListArgs) -> Result<Outcome, OperationError> {
    let tenants = ctx.services.tenants.list(args.paging.page(&ctx)).await?;
    Outcome::data(&tenants)
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    name: String,
    #[serde(default)]
    trial: bool,
}

async fn create(ctx: Arc<RequestContext>, args: CreateArgs) -> Result<Outcome, OperationError> {
    let tenant = ctx.services.tenants.create(&args.name, args.trial).await?;
    Ok(Outcome::data(&tenant)?.with_event(event(MutationKind::Created, &tenant)))
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    id: TenantId,
    #[serde(flatten)]
    patch: TenantPatch,
}

async fn update(ctx: Arc<RequestContext>, args: UpdateArgs) -> Result<Outcome, OperationError> {
    load_visible::<Tenant>(&ctx, args.id).await?;
    let tenant = ctx.services.tenants.update(args.id, args.patch).await?;
    Ok(Outcome::data(&tenant)?.with_event(event(MutationKind::Updated, &tenant)))
}

async fn delete(ctx: Arc<RequestContext>, args: ByIdArgs<TenantId>) -> Result<Outcome, OperationError> {
    let tenant = ctx.services.tenants.delete(args.id).await?;
    Ok(Outcome::data(&tenant)?.with_event(event(MutationKind::Deleted, &tenant)))
}
