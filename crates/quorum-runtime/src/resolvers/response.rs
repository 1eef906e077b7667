use super::session::{respondent_session, status_event};
use super::{event, load_visible, Paging};
use crate::context::RequestContext;
use crate::orchestrator::{handler, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use quorum_event::MutationKind;
use quorum_types::{AnswerPayload, Permission, QuestionId, Response, ResponseId, Session, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    registry
        .query("responses", Access::Permission(Permission::ResponseRead), handler(responses))?
        .mutation("submitResponse", Access::Public, handler(submit))?
        .mutation("editResponse", Access::Public, handler(edit))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    session_id: SessionId,
    #[serde(flatten)]
    paging: Paging,
}

async fn responses(ctx: Arc<RequestContext>, args: ListArgs) -> Result<Outcome, OperationError> {
    let session = load_visible::<Session>(&ctx, args.session_id).await?;
    let responses = ctx
        .services
        .responses
        .list_by_session(session.id, args.paging.page(&ctx))
        .await?;
    Outcome::data(&responses)
}

#[derive(Debug, Serialize)]
struct Submitted<'a> {
    response: &'a Response,
    session: &'a Session,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitArgs {
    session_id: SessionId,
    question_id: QuestionId,
    payload: AnswerPayload,
}

async fn submit(ctx: Arc<RequestContext>, args: SubmitArgs) -> Result<Outcome, OperationError> {
    let before = respondent_session(&ctx, args.session_id, Permission::ResponseSubmit).await?;
    let (response, session) = ctx
        .services
        .responses
        .submit(args.session_id, args.question_id, args.payload)
        .await?;

    let mut outcome = Outcome::data(&Submitted {
        response: &response,
        session: &session,
    })?
    .with_event(event(MutationKind::Created, &response));
    if session.status != before.status {
        outcome = outcome.with_event(status_event(&session));
    }
    Ok(outcome)
}

#[derive(Debug, Deserialize)]
struct EditArgs {
    id: ResponseId,
    payload: AnswerPayload,
}

async fn edit(ctx: Arc<RequestContext>, args: EditArgs) -> Result<Outcome, OperationError> {
    let current = ctx.services.responses.get(args.id).await?;
    respondent_session(&ctx, current.session_id, Permission::ResponseSubmit).await?;
    let response = ctx.services.responses.edit(args.id, args.payload).await?;
    Ok(Outcome::data(&response)?.with_event(event(MutationKind::Updated, &response)))
}
