use super::{check_includes, event, expand_all, load_visible, visible, ByIdArgs, Expanded, Paging};
use crate::context::RequestContext;
use crate::orchestrator::{handler, to_value, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::{NewSurvey, SurveyPatch};
use quorum_event::MutationKind;
use quorum_types::{Permission, Survey, SurveyId, SurveyStatus, Tenant, TenantId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    let write = Access::Permission(Permission::SurveyWrite);
    let publish = Access::Permission(Permission::SurveyPublish);
    registry
        .query("survey", Access::Permission(Permission::SurveyRead), handler(survey))?
        .query("surveys", Access::Permission(Permission::SurveyRead), handler(surveys))?
        .mutation("createSurvey", write, handler(create))?
        .mutation("updateSurvey", write, handler(update))?
        .mutation("duplicateSurvey", write, handler(duplicate))?
        .mutation("publishSurvey", publish, handler(publish_survey))?
        .mutation("pauseSurvey", publish, handler(pause))?
        .mutation("archiveSurvey", publish, handler(archive))?
        .mutation("deleteSurvey", Access::Permission(Permission::SurveyDelete), handler(delete))?;
    Ok(())
}

const INCLUDES: &[&str] = &["questions", "stats", "tenant"];

pub(super) async fn expand(
    ctx: &RequestContext,
    survey: &Survey,
    include: &[String],
) -> Result<Expanded, OperationError> {
    let mut out = Expanded::new(survey)?;
    for field in include {
        let value = match field.as_str() {
            "questions" => to_value(&ctx.services.surveys.questions(survey.id).await),
            "stats" => match ctx.gate.require_permission(Permission::AnalyticsRead) {
                Ok(()) => match ctx.services.analyses.stats(survey.id).await {
                    Ok(stats) => to_value(&stats),
                    Err(err) => Err(err.into()),
                },
                Err(denied) => Err(denied.into()),
            },
            "tenant" => match ctx.gate.require_tenant_scope(survey.tenant_id) {
                Ok(()) => match load_visible::<Tenant>(ctx, survey.tenant_id).await {
                    Ok(tenant) => to_value(&tenant),
                    Err(err) => Err(err),
                },
                Err(denied) => Err(denied.into()),
            },
            _ => continue,
        };
        out.attach(field, value);
    }
    Ok(out)
}

async fn survey(ctx: Arc<RequestContext>, args: ByIdArgs<SurveyId>) -> Result<Outcome, OperationError> {
    check_includes("survey", &args.include, INCLUDES)?;
    let survey = load_visible::<Survey>(&ctx, args.id).await?;
    Ok(expand(&ctx, &survey, &args.include).await?.into_outcome())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    #[serde(default)]
    tenant_id: Option<TenantId>,
    #[serde(default)]
    status: Option<SurveyStatus>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(flatten)]
    paging: Paging,
}

async fn surveys(ctx: Arc<RequestContext>, args: ListArgs) -> Result<Outcome, OperationError> {
    check_includes("survey", &args.include, INCLUDES)?;
    let tenant = ctx.gate.resolve_tenant(args.tenant_id)?;
    let surveys = ctx
        .services
        .surveys
        .list(tenant, args.status, args.paging.page(&ctx))
        .await?;
    let ctx = &ctx;
    let include = &args.include;
    expand_all(surveys, |survey| async move { expand(ctx, &survey, include).await }).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateArgs {
    #[serde(default)]
    tenant_id: Option<TenantId>,
    #[serde(flatten)]
    survey: NewSurvey,
}

async fn create(ctx: Arc<RequestContext>, args: CreateArgs) -> Result<Outcome, OperationError> {
    let tenant = ctx.gate.resolve_tenant(args.tenant_id)?;
    let survey = ctx
        .services
        .surveys
        .create(tenant, args.survey, ctx.gate.identity_id())
        .await?;
    Ok(Outcome::data(&survey)?.with_event(event(MutationKind::Created, &survey)))
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    id: SurveyId,
    #[serde(flatten)]
    patch: SurveyPatch,
}

async fn update(ctx: Arc<RequestContext>, args: UpdateArgs) -> Result<Outcome, OperationError> {
    load_visible::<Survey>(&ctx, args.id).await?;
    let survey = ctx.services.surveys.update(args.id, args.patch).await?;
    Ok(Outcome::data(&survey)?.with_event(event(MutationKind::Updated, &survey)))
}

async fn duplicate(ctx: Arc<RequestContext>, args: ByIdArgs<SurveyId>) -> Result<Outcome, OperationError> {
    load_visible::<Survey>(&ctx, args.id).await?;
    let copy = ctx
        .services
        .surveys
        .duplicate(args.id, ctx.gate.identity_id())
        .await?;
    let copy = visible(&ctx, copy)?;
    Ok(Outcome::data(&copy)?.with_event(event(MutationKind::Created, &copy)))
}

fn status_changed(survey: &Survey) -> Result<Outcome, OperationError> {
    let event = event(MutationKind::StatusChanged, survey).with_payload(json!({ "status": survey.status }));
    Ok(Outcome::data(survey)?.with_event(event))
}

async fn publish_survey(ctx: Arc<RequestContext>, args: ByIdArgs<SurveyId>) -> Result<Outcome, OperationError> {
    load_visible::<Survey>(&ctx, args.id).await?;
    status_changed(&ctx.services.surveys.publish(args.id).await?)
}

async fn pause(ctx: Arc<RequestContext>, args: ByIdArgs<SurveyId>) -> Result<Outcome, OperationError> {
    load_visible::<Survey>(&ctx, args.id).await?;
    status_changed(&ctx.services.surveys.pause(args.id).await?)
}

async fn archive(ctx: Arc<RequestContext>, args: ByIdArgs<SurveyId>) -> Result<Outcome, OperationError> {
    load_visible::<Survey>(&ctx, args.id).await?;
    status_changed(&ctx.services.surveys.archive(args.id).await?)
}

async fn delete(ctx: Arc<RequestContext>, args: ByIdArgs<SurveyId>) -> Result<Outcome, OperationError> {
    load_visible::<Survey>(&ctx, args.id).await?;
    let survey = ctx.services.surveys.delete(args.id).await?;
    Ok(Outcome::data(&survey)?.with_event(event(MutationKind::Deleted, &survey)))
}
