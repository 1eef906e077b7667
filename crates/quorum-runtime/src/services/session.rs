//! Survey-taking session service.
//!
//! ```text
//! NotStarted ──► InProgress ──► Completed
//!      │              │
//!      └──────────────┴──► Abandoned | Expired
//! ```
//!
//! Expiry happens lazily: any read through [`SessionService::get`] expires
//! a session whose inactivity deadline has passed. [`SessionService::expire_stale`]
//! sweeps the rest.

use super::{ServiceDeps, ServiceError};
use crate::store::Filter;
use chrono::{DateTime, Duration, Utc};
use quorum_types::{IdentityId, Page, Session, SessionId, SessionStatus, Survey, SurveyId, SurveyStatus};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone)]
pub struct SessionService {
    deps: ServiceDeps,
}

impl SessionService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    /// Inactivity allowed before a session of `survey` expires.
    fn timeout(&self, survey: Option<&Survey>) -> Duration {
        let secs = survey
            .and_then(|s| s.settings.session_timeout_secs)
            .unwrap_or(self.deps.config.sessions.timeout_secs);
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Loads a session, expiring it first if its deadline has passed.
    pub async fn get(&self, id: SessionId) -> Result<Session, ServiceError> {
        let session = self.deps.require::<Session>(id).await?;
        let survey = self.deps.find::<Survey>(session.survey_id).await;
        self.expire_if_stale(session, survey.as_ref(), Utc::now()).await
    }

    async fn expire_if_stale(
        &self,
        mut session: Session,
        survey: Option<&Survey>,
        now: DateTime<Utc>,
    ) -> Result<Session, ServiceError> {
        if !session.is_past_deadline(self.timeout(survey), now) {
            return Ok(session);
        }
        session.transition(SessionStatus::Expired, now)?;
        let session = self.deps.save(session).await?;
        self.deps.loaders.survey_stats.clear(&session.survey_id);
        tracing::info!(session = %session.id, "session expired");
        Ok(session)
    }

    /// Opens a session on an active survey.
    pub async fn start(&self, survey_id: SurveyId, identity: Option<IdentityId>) -> Result<Session, ServiceError> {
        let survey = self.deps.require::<Survey>(survey_id).await?;
        if survey.status != SurveyStatus::Active {
            return Err(ServiceError::conflict("survey is not accepting responses"));
        }
        if identity.is_none() && !survey.settings.allow_anonymous {
            return Err(ServiceError::validation("survey does not accept anonymous responses"));
        }
        let total = self
            .deps
            .loaders
            .questions_by_survey
            .load(survey_id)
            .await
            .map_or(0, |qs| qs.len());
        let total = u32::try_from(total).unwrap_or(u32::MAX);

        let session = self
            .deps
            .insert(Session::new(survey.id, survey.tenant_id, identity, total))
            .await?;
        self.deps.loaders.survey_stats.clear(&survey_id);
        tracing::debug!(session = %session.id, survey = %survey_id, "session started");
        Ok(session)
    }

    /// Applies `answered` to an already loaded session and stores it.
    pub(super) async fn advance(
        &self,
        mut session: Session,
        answered: u32,
        now: DateTime<Utc>,
    ) -> Result<Session, ServiceError> {
        let before = session.status;
        session.record_progress(answered, now)?;
        let session = self.deps.save(session).await?;
        if session.status != before {
            self.deps.loaders.survey_stats.clear(&session.survey_id);
        }
        Ok(session)
    }

    /// Records progress; completes the session at 100%.
    pub async fn record_progress(&self, id: SessionId, answered: u32) -> Result<Session, ServiceError> {
        let session = self.get(id).await?;
        self.advance(session, answered, Utc::now()).await
    }

    pub async fn abandon(&self, id: SessionId) -> Result<Session, ServiceError> {
        let mut session = self.get(id).await?;
        session.transition(SessionStatus::Abandoned, Utc::now())?;
        let session = self.deps.save(session).await?;
        self.deps.loaders.survey_stats.clear(&session.survey_id);
        Ok(session)
    }

    /// Expires every open session whose deadline passed before `now`.
    /// Returns the sessions that were expired.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<Session>, ServiceError> {
        let open: Vec<Session> = self
            .deps
            .list(
                vec![Filter::AnyOf(vec![
                    Filter::SessionStatus(SessionStatus::NotStarted),
                    Filter::SessionStatus(SessionStatus::InProgress),
                ])],
                None,
            )
            .await?;

        let survey_ids: Vec<SurveyId> = open
            .iter()
            .map(|s| s.survey_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let surveys: HashMap<SurveyId, Survey> = self
            .deps
            .loaders
            .surveys
            .load_many(survey_ids.clone())
            .await
            .into_iter()
            .zip(survey_ids)
            .filter_map(|(survey, id)| survey.map(|s| (id, s)))
            .collect();

        let mut expired = Vec::new();
        for session in open {
            let survey = surveys.get(&session.survey_id);
            let session = self.expire_if_stale(session, survey, now).await?;
            if session.status == SessionStatus::Expired {
                expired.push(session);
            }
        }
        tracing::info!(expired = expired.len(), "stale session sweep finished");
        Ok(expired)
    }

    pub async fn list(&self, survey: SurveyId, page: Page) -> Result<Vec<Session>, ServiceError> {
        self.deps.list(vec![Filter::Survey(survey)], Some(page)).await
    }
}
