use super::{check_includes, event, load_visible, visible, ByIdArgs, Expanded, Paging};
use crate::context::RequestContext;
use crate::orchestrator::{handler, to_value, Access, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::ServiceError;
use chrono::Utc;
use quorum_event::MutationKind;
use quorum_types::{Permission, Role, Session, SessionId, Survey, SurveyId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub(super) fn register(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    registry
        .query("session", Access::Permission(Permission::SessionRead), handler(session))?
        .query("sessions", Access::Permission(Permission::ResponseRead), handler(sessions))?
        // Anonymous respondents are allowed where the survey permits them;
        // see `check_respondent`.
        .mutation("startSession", Access::Public, handler(start))?
        .mutation("abandonSession", Access::Public, handler(abandon))?
        .mutation("expireSessions", Access::Role(Role::SystemAdmin), handler(expire))?;
    Ok(())
}

/// Checks the caller may act as the respondent of `session`.
///
/// An identity-bound session belongs to that identity alone; anyone else
/// gets `NOT_FOUND`. An anonymous session is addressed by its id. An
/// authenticated caller still needs `permission` either way.
pub(super) fn check_respondent(
    ctx: &RequestContext,
    session: &Session,
    permission: Permission,
) -> Result<(), OperationError> {
    if ctx.gate.is_authenticated() || session.identity_id.is_some() {
        ctx.gate.require_permission(permission)?;
    }
    match session.identity_id {
        Some(owner) if ctx.gate.identity_id() != Some(owner) => {
            Err(ServiceError::not_found::<Session>(session.id).into())
        }
        _ => Ok(()),
    }
}

/// Loads a session for its respondent.
pub(super) async fn respondent_session(
    ctx: &RequestContext,
    id: SessionId,
    permission: Permission,
) -> Result<Session, OperationError> {
    let session = ctx
        .loaders
        .sessions
        .load(id)
        .await
        .ok_or_else(|| ServiceError::not_found::<Session>(id))?;
    let session = if ctx.gate.is_authenticated() {
        visible(ctx, session)?
    } else {
        session
    };
    check_respondent(ctx, &session, permission)?;
    Ok(session)
}

pub(super) fn status_event(session: &Session) -> quorum_event::MutationEvent {
    event(MutationKind::StatusChanged, session).with_payload(json!({
        "status": session.status,
        "progress": session.progress_percent(),
    }))
}

const INCLUDES: &[&str] = &["responses", "survey"];

async fn session(ctx: Arc<RequestContext>, args: ByIdArgs<SessionId>) -> Result<Outcome, OperationError> {
    check_includes("session", &args.include, INCLUDES)?;
    let session = ctx
        .loaders
        .sessions
        .load(args.id)
        .await
        .ok_or_else(|| ServiceError::not_found::<Session>(args.id))?;
    let session = visible(&ctx, session)?;
    if !ctx.gate.has_permission(Permission::ResponseRead) {
        check_respondent(&ctx, &session, Permission::SessionRead)?;
    }
    // Only a reader who may see the session gets to expire it.
    let session = ctx.services.sessions.get(session.id).await?;

    let mut out = Expanded::new(&session)?;
    for field in &args.include {
        let value = match field.as_str() {
            "responses" => match ctx.gate.require_permission(Permission::ResponseRead) {
                Ok(()) => to_value(&ctx.services.responses.of_session(session.id).await),
                Err(denied) => Err(denied.into()),
            },
            "survey" => match ctx.loaders.surveys.load(session.survey_id).await {
                Some(survey) => to_value(&survey),
                None => Err(ServiceError::not_found::<Survey>(session.survey_id).into()),
            },
            _ => continue,
        };
        out.attach(field, value);
    }
    Ok(out.into_outcome())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListArgs {
    survey_id: SurveyId,
    #[serde(flatten)]
    paging: Paging,
}

async fn sessions(ctx: Arc<RequestContext>, args: ListArgs) -> Result<Outcome, OperationError> {
    let survey = load_visible::<Survey>(&ctx, args.survey_id).await?;
    let sessions = ctx
        .services
        .sessions
        .list(survey.id, args.paging.page(&ctx))
        .await?;
    Outcome::data(&sessions)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartArgs {
    survey_id: SurveyId,
}

async fn start(ctx: Arc<RequestContext>, args: StartArgs) -> Result<Outcome, OperationError> {
    let survey = if ctx.gate.is_authenticated() {
        ctx.gate.require_permission(Permission::SessionStart)?;
        load_visible::<Survey>(&ctx, args.survey_id).await?
    } else {
        ctx.loaders
            .surveys
            .load(args.survey_id)
            .await
            .ok_or_else(|| ServiceError::not_found::<Survey>(args.survey_id))?
    };
    let session = ctx
        .services
        .sessions
        .start(survey.id, ctx.gate.identity_id())
        .await?;
    Ok(Outcome::data(&session)?.with_event(event(MutationKind::Created, &session)))
}

#[derive(Debug, Deserialize)]
struct AbandonArgs {
    id: SessionId,
}

async fn abandon(ctx: Arc<RequestContext>, args: AbandonArgs) -> Result<Outcome, OperationError> {
    respondent_session(&ctx, args.id, Permission::SessionStart).await?;
    let session = ctx.services.sessions.abandon(args.id).await?;
    Ok(Outcome::data(&session)?.with_event(status_event(&session)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Expired {
    expired: usize,
    session_ids: Vec<SessionId>,
}

async fn expire(ctx: Arc<RequestContext>, _args: serde_json::Value) -> Result<Outcome, OperationError> {
    let expired = ctx.services.sessions.expire_stale(Utc::now()).await?;
    let mut outcome = Outcome::data(&Expired {
        expired: expired.len(),
        session_ids: expired.iter().map(|s| s.id).collect(),
    })?;
    for session in &expired {
        outcome = outcome.with_event(status_event(session));
    }
    Ok(outcome)
}
