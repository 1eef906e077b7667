use super::{event, load_visible, ByIdArgs};
use crate::context::RequestContext;
use crate::orchestrator::{handler, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::{NewQuestion, QuestionPatch};
use quorum_event::{MutationEvent, MutationKind, Topic};
use quorum_types::{EntityKey, Permission, Question, QuestionId, Survey, SurveyId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    let write = Access::Permission(Permission::QuestionWrite);
    registry
        .query("question", Access::Permission(Permission::SurveyRead), handler(question))?
        .mutation("addQuestion", write, handler(add))?
        .mutation("updateQuestion", write, handler(update))?
        .mutation("deleteQuestion", write, handler(delete))?
        .mutation("reorderQuestions", write, handler(reorder))?;
    Ok(())
}

async fn question(ctx: Arc<RequestContext>, args: ByIdArgs<QuestionId>) -> Result<Outcome, OperationError> {
    let question = load_visible::<Question>(&ctx, args.id).await?;
    Outcome::data(&question)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddArgs {
    survey_id: SurveyId,
    #[serde(flatten)]
    question: NewQuestion,
}

async fn add(ctx: Arc<RequestContext>, args: AddArgs) -> Result<Outcome, OperationError> {
    load_visible::<Survey>(&ctx, args.survey_id).await?;
    let question = ctx.services.questions.add(args.survey_id, args.question).await?;
    Ok(Outcome::data(&question)?.with_event(event(MutationKind::Created, &question)))
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    id: QuestionId,
    #[serde(flatten)]
    patch: QuestionPatch,
}

async fn update(ctx: Arc<RequestContext>, args: UpdateArgs) -> Result<Outcome, OperationError> {
    load_visible::<Question>(&ctx, args.id).await?;
    let question = ctx.services.questions.update(args.id, args.patch).await?;
    Ok(Outcome::data(&question)?.with_event(event(MutationKind::Updated, &question)))
}

async fn delete(ctx: Arc<RequestContext>, args: ByIdArgs<QuestionId>) -> Result<Outcome, OperationError> {
    load_visible::<Question>(&ctx, args.id).await?;
    let question = ctx.services.questions.delete(args.id).await?;
    Ok(Outcome::data(&question)?.with_event(event(MutationKind::Deleted, &question)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderArgs {
    survey_id: SurveyId,
    order: Vec<QuestionId>,
}

async fn reorder(ctx: Arc<RequestContext>, args: ReorderArgs) -> Result<Outcome, OperationError> {
    let survey = load_visible::<Survey>(&ctx, args.survey_id).await?;
    let questions = ctx.services.questions.reorder(survey.id, &args.order).await?;
    let event = MutationEvent::new(
        Topic::Question,
        MutationKind::Updated,
        survey.id.as_uuid(),
        Some(survey.tenant_id),
    )
    .with_payload(json!({ "reordered": true }));
    Ok(Outcome::data(&questions)?.with_event(event))
}
