//! Analysis results and survey statistics.

use super::{ServiceDeps, ServiceError};
use crate::loader::SurveyStats;
use crate::store::Filter;
use chrono::Utc;
use quorum_types::{
    AnalysisId, AnalysisResult, AnalysisTarget, Page, Response, Survey, SurveyId,
};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalysis {
    pub target: AnalysisTarget,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<f64>,
}

impl NewAnalysis {
    fn check(&self) -> Result<(), ServiceError> {
        if let Some((label, _)) = self
            .scores
            .iter()
            .find(|(_, s)| !(0.0..=1.0).contains(*s))
        {
            return Err(ServiceError::invalid_field(
                "scores",
                format!("score for '{label}' must be between 0 and 1"),
            ));
        }
        if self.sentiment.is_some_and(|s| !(-1.0..=1.0).contains(&s)) {
            return Err(ServiceError::invalid_field(
                "sentiment",
                "sentiment must be between -1 and 1",
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AnalysisService {
    deps: ServiceDeps,
}

impl AnalysisService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn get(&self, id: AnalysisId) -> Result<AnalysisResult, ServiceError> {
        self.deps.require::<AnalysisResult>(id).await
    }

    /// Stores an analysis for a response or a survey. The survey and tenant
    /// are taken from the target, never from the caller.
    pub async fn record(&self, input: NewAnalysis) -> Result<AnalysisResult, ServiceError> {
        input.check()?;
        let (survey_id, tenant_id) = match input.target {
            AnalysisTarget::Response(id) => {
                let response = self.deps.require::<Response>(id).await?;
                (response.survey_id, response.tenant_id)
            }
            AnalysisTarget::Survey(id) => {
                let survey = self.deps.require::<Survey>(id).await?;
                (survey.id, survey.tenant_id)
            }
        };
        let analysis = self
            .deps
            .insert(AnalysisResult {
                id: AnalysisId::new(),
                target: input.target,
                survey_id,
                tenant_id,
                scores: input.scores,
                insights: input.insights,
                sentiment: input.sentiment,
                created_at: Utc::now(),
            })
            .await?;
        self.deps.loaders.survey_stats.clear(&survey_id);
        Ok(analysis)
    }

    /// Aggregate figures for a survey.
    pub async fn stats(&self, survey: SurveyId) -> Result<SurveyStats, ServiceError> {
        self.deps.require::<Survey>(survey).await?;
        self.deps
            .loaders
            .survey_stats
            .load(survey)
            .await
            .ok_or_else(|| ServiceError::not_found::<Survey>(survey))
    }

    pub async fn list_for_survey(&self, survey: SurveyId, page: Page) -> Result<Vec<AnalysisResult>, ServiceError> {
        self.deps.list(vec![Filter::Survey(survey)], Some(page)).await
    }
}
