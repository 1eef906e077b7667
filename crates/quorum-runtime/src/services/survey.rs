//! Survey service.
//!
//! Survey lifecycle:
//!
//! ```text
//! Draft ──publish──► Active ◄──publish── Paused
//!                      │                   ▲
//!                      └──────pause────────┘
//! any ──archive──► Archived (read-only)
//! ```

use super::{required_text, ServiceDeps, ServiceError};
use crate::store::{Filter, Query};
use chrono::Utc;
use quorum_types::{
    AnalysisResult, EntityKind, IdentityId, Page, Question, QuestionId, Survey, SurveyId,
    SurveySettings, SurveyStatus, TenantId,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSurvey {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: SurveySettings,
}

/// Partial survey update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurveyPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub settings: Option<SurveySettings>,
}

#[derive(Clone)]
pub struct SurveyService {
    deps: ServiceDeps,
}

impl SurveyService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn get(&self, id: SurveyId) -> Result<Survey, ServiceError> {
        self.deps.require::<Survey>(id).await
    }

    /// Questions of a survey in position order.
    pub async fn questions(&self, id: SurveyId) -> Vec<Question> {
        self.deps
            .loaders
            .questions_by_survey
            .load(id)
            .await
            .unwrap_or_default()
    }

    /// Creates a survey in `Draft`.
    pub async fn create(
        &self,
        tenant: TenantId,
        input: NewSurvey,
        created_by: Option<IdentityId>,
    ) -> Result<Survey, ServiceError> {
        let mut survey = Survey::new(tenant, required_text("title", &input.title)?);
        survey.description = input.description;
        survey.settings = input.settings;
        survey.created_by = created_by;
        let survey = self.deps.insert(survey).await?;
        tracing::info!(survey = %survey.id, tenant = %tenant, "survey created");
        Ok(survey)
    }

    pub async fn update(&self, id: SurveyId, patch: SurveyPatch) -> Result<Survey, ServiceError> {
        let mut survey = self.get(id).await?;
        if survey.is_archived() {
            return Err(ServiceError::conflict("archived surveys cannot be changed"));
        }
        if let Some(title) = patch.title {
            survey.title = required_text("title", &title)?;
        }
        if let Some(description) = patch.description {
            survey.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(settings) = patch.settings {
            survey.settings = settings;
        }
        survey.updated_at = Utc::now();
        self.deps.save(survey).await
    }

    /// Opens a draft or paused survey for responses.
    pub async fn publish(&self, id: SurveyId) -> Result<Survey, ServiceError> {
        let mut survey = self.get(id).await?;
        if !survey.status.can_publish() {
            return Err(ServiceError::conflict(format!(
                "a {} survey cannot be published",
                survey.status
            )));
        }
        if self.questions(id).await.is_empty() {
            return Err(ServiceError::validation(
                "a survey needs at least one question before it can be published",
            ));
        }
        let now = Utc::now();
        survey.status = SurveyStatus::Active;
        survey.published_at.get_or_insert(now);
        survey.updated_at = now;
        let survey = self.deps.save(survey).await?;
        tracing::info!(survey = %id, "survey published");
        Ok(survey)
    }

    pub async fn pause(&self, id: SurveyId) -> Result<Survey, ServiceError> {
        let mut survey = self.get(id).await?;
        if !survey.status.can_pause() {
            return Err(ServiceError::conflict(format!(
                "a {} survey cannot be paused",
                survey.status
            )));
        }
        survey.status = SurveyStatus::Paused;
        survey.updated_at = Utc::now();
        self.deps.save(survey).await
    }

    /// Archives a survey. Archived surveys are read-only.
    pub async fn archive(&self, id: SurveyId) -> Result<Survey, ServiceError> {
        let mut survey = self.get(id).await?;
        if survey.is_archived() {
            return Err(ServiceError::conflict("survey is already archived"));
        }
        let now = Utc::now();
        survey.status = SurveyStatus::Archived;
        survey.archived_at = Some(now);
        survey.updated_at = now;
        self.deps.save(survey).await
    }

    /// Copies a survey and its questions into a new draft.
    ///
    /// There is no transaction across the inserts: if a question copy
    /// fails, the copies made so far are deleted again.
    pub async fn duplicate(
        &self,
        id: SurveyId,
        created_by: Option<IdentityId>,
    ) -> Result<Survey, ServiceError> {
        let source = self.get(id).await?;
        let questions = self.questions(id).await;

        let mut copy = Survey::new(source.tenant_id, format!("{} (copy)", source.title));
        copy.description = source.description.clone();
        copy.settings = source.settings.clone();
        copy.created_by = created_by;
        let copy = self.deps.insert(copy).await?;

        let mut copied: Vec<QuestionId> = Vec::with_capacity(questions.len());
        for question in questions {
            let mut dup = question;
            dup.id = QuestionId::new();
            dup.survey_id = copy.id;
            match self.deps.insert(dup).await {
                Ok(q) => copied.push(q.id),
                Err(err) => {
                    tracing::warn!(source = %id, copy = %copy.id, error = %err, "question copy failed, rolling back");
                    self.compensate(copy.id, &copied).await;
                    return Err(err);
                }
            }
        }
        self.deps.loaders.questions_by_survey.clear(&copy.id);
        tracing::info!(source = %id, copy = %copy.id, questions = copied.len(), "survey duplicated");
        Ok(copy)
    }

    async fn compensate(&self, survey: SurveyId, questions: &[QuestionId]) {
        for question in questions.iter().rev() {
            if let Err(err) = self.deps.remove::<Question>(*question).await {
                tracing::error!(question = %question, error = %err, "compensation failed");
            }
        }
        if let Err(err) = self.deps.remove::<Survey>(survey).await {
            tracing::error!(survey = %survey, error = %err, "compensation failed");
        }
    }

    /// Deletes a survey that nobody has taken yet, along with its questions
    /// and analyses. Surveys with sessions must be archived instead.
    pub async fn delete(&self, id: SurveyId) -> Result<Survey, ServiceError> {
        let survey = self.get(id).await?;
        let sessions = self
            .deps
            .store
            .count(&Query::new(EntityKind::Session).filter(Filter::Survey(id)))
            .await?;
        if sessions > 0 {
            return Err(ServiceError::conflict(
                "survey has sessions; archive it instead",
            ));
        }

        let analyses: Vec<AnalysisResult> = self.deps.list(vec![Filter::Survey(id)], None).await?;
        for analysis in analyses {
            self.deps.remove::<AnalysisResult>(analysis.id).await?;
        }
        for question in self.questions(id).await {
            self.deps.remove::<Question>(question.id).await?;
        }
        self.deps.remove::<Survey>(id).await?;

        let loaders = &self.deps.loaders;
        loaders.questions_by_survey.clear(&id);
        loaders.survey_stats.clear(&id);
        tracing::info!(survey = %id, "survey deleted");
        Ok(survey)
    }

    pub async fn list(
        &self,
        tenant: TenantId,
        status: Option<SurveyStatus>,
        page: Page,
    ) -> Result<Vec<Survey>, ServiceError> {
        let mut filters = vec![Filter::Tenant(tenant)];
        filters.extend(status.map(Filter::SurveyStatus));
        self.deps.list(filters, Some(page)).await
    }
}
