//! Response service.

use super::{ServiceDeps, ServiceError, SessionService};
use crate::store::Filter;
use chrono::Utc;
use quorum_types::{
    AnswerPayload, Page, Question, QuestionId, Response, ResponseId, Session, SessionId,
};
use std::collections::BTreeSet;

#[derive(Clone)]
pub struct ResponseService {
    deps: ServiceDeps,
    sessions: SessionService,
}

impl ResponseService {
    pub fn new(deps: ServiceDeps) -> Self {
        let sessions = SessionService::new(deps.clone());
        Self { deps, sessions }
    }

    pub async fn get(&self, id: ResponseId) -> Result<Response, ServiceError> {
        self.deps.require::<Response>(id).await
    }

    /// Responses of a session in submission order.
    pub async fn of_session(&self, session: SessionId) -> Vec<Response> {
        self.deps
            .loaders
            .responses_by_session
            .load(session)
            .await
            .unwrap_or_default()
    }

    async fn open_session(&self, id: SessionId) -> Result<Session, ServiceError> {
        let session = self.sessions.get(id).await?;
        if !session.is_open() {
            return Err(ServiceError::conflict(format!(
                "session is {}",
                session.status.as_str().to_lowercase()
            )));
        }
        Ok(session)
    }

    async fn question_of(&self, session: &Session, id: QuestionId) -> Result<Question, ServiceError> {
        let question = self.deps.require::<Question>(id).await?;
        if question.survey_id != session.survey_id {
            return Err(ServiceError::invalid_field(
                "questionId",
                "question does not belong to the session's survey",
            ));
        }
        Ok(question)
    }

    /// Records one answer and advances the session. The session completes
    /// when every question has an answer.
    pub async fn submit(
        &self,
        session_id: SessionId,
        question_id: QuestionId,
        payload: AnswerPayload,
    ) -> Result<(Response, Session), ServiceError> {
        let session = self.open_session(session_id).await?;
        let question = self.question_of(&session, question_id).await?;
        question.validate_answer(&payload)?;

        let existing = self.of_session(session_id).await;
        if existing.iter().any(|r| r.question_id == question_id) {
            return Err(ServiceError::conflict(
                "question already answered; edit the response instead",
            ));
        }

        let now = Utc::now();
        let response = self
            .deps
            .insert(Response {
                id: ResponseId::new(),
                session_id,
                question_id,
                survey_id: session.survey_id,
                tenant_id: session.tenant_id,
                payload,
                quality_score: None,
                edit_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await?;
        let loaders = &self.deps.loaders;
        loaders.responses_by_session.clear(&session_id);
        loaders.survey_stats.clear(&session.survey_id);

        let answered: BTreeSet<QuestionId> = existing
            .iter()
            .map(|r| r.question_id)
            .chain([question_id])
            .collect();
        let answered = u32::try_from(answered.len()).unwrap_or(u32::MAX);
        let session = self.sessions.advance(session, answered, now).await?;
        tracing::debug!(response = %response.id, session = %session_id, answered, "response recorded");
        Ok((response, session))
    }

    /// Replaces the payload of an answer while its session is still open.
    pub async fn edit(&self, id: ResponseId, payload: AnswerPayload) -> Result<Response, ServiceError> {
        let mut response = self.get(id).await?;
        let session = self.open_session(response.session_id).await?;
        let question = self.question_of(&session, response.question_id).await?;
        question.validate_answer(&payload)?;

        response.payload = payload;
        response.edit_count = response.edit_count.saturating_add(1);
        response.updated_at = Utc::now();
        let response = self.deps.save(response).await?;
        self.deps.loaders.responses_by_session.clear(&response.session_id);
        Ok(response)
    }

    pub async fn list_by_session(&self, session: SessionId, page: Page) -> Result<Vec<Response>, ServiceError> {
        self.deps.list(vec![Filter::Session(session)], Some(page)).await
    }
}
