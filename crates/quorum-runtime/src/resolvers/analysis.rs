use super::{event, load_visible, ByIdArgs, Paging};
use crate::context::RequestContext;
use crate::orchestrator::{handler, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::NewAnalysis;
use quorum_event::MutationKind;
use quorum_types::{AnalysisId, AnalysisResult, AnalysisTarget, Permission, Response, Survey, SurveyId};
use serde::Deserialize;
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    let read = Access::Permission(Permission::AnalyticsRead);
    registry
        .query("surveyStats", read, handler(survey_stats))?
        .query("analysis", read, handler(analysis))?
        .query("analyses", read, handler(analyses))?
        .mutation("recordAnalysis", Access::Permission(Permission::AnalysisWrite), handler(record))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsArgs {
    survey_id: SurveyId,
}

async fn survey_stats(ctx: Arc<RequestContext>, args: StatsArgs) -> Result<Outcome, OperationError> {
    let survey = load_visible::<Survey>(&ctx, args.survey_id).await?;
    let stats = ctx.services.analyses.stats(survey.id).await?;
    Outcome::data(&stats)
}

async fn analysis(ctx: Arc<RequestContext>, args: ByIdArgs<AnalysisId>) -> Result<Outcome, OperationError> {
    let analysis = load_visible::<AnalysisResult>(&ctx, args.id).await?;
    Outcome::data(&analysis)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    survey_id: SurveyId,
    #[serde(flatten)]
    paging: Paging,
}

async fn analyses(ctx: Arc<RequestContext>, args: ListArgs) -> Result<Outcome, OperationError> {
    let survey = load_visible::<Survey>(&ctx, args.survey_id).await?;
    let analyses = ctx
        .services
        .analyses
        .list_for_survey(survey.id, args.paging.page(&ctx))
        .await?;
    Outcome::data(&analyses)
}

async fn record(ctx: Arc<RequestContext>, args: NewAnalysis) -> Result<Outcome, OperationError> {
    match args.target {
        AnalysisTarget::Response(id) => {
            load_visible::<Response>(&ctx, id).await?;
        }
        AnalysisTarget::Survey(id) => {
            load_visible::<Survey>(&ctx, id).await?;
        }
    }
    let analysis = ctx.services.analyses.record(args).await?;
    Ok(Outcome::data(&analysis)?.with_event(event(MutationKind::Created, &analysis)))
}
