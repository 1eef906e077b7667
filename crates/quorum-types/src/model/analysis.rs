use super::{Entity, EntityKind};
use crate::{AnalysisId, ResponseId, SurveyId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What an analysis result describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AnalysisTarget {
    Response(ResponseId),
    Survey(SurveyId),
}

/// Classification output for a response or a whole survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: AnalysisId,
    pub target: AnalysisTarget,
    /// Survey the target belongs to (the survey itself for survey targets).
    pub survey_id: SurveyId,
    pub tenant_id: TenantId,
    /// Label → score in `[0, 1]`.
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub insights: Vec<String>,
    /// Sentiment in `[-1, 1]`.
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Entity for AnalysisResult {
    type Id = AnalysisId;
    const KIND: EntityKind = EntityKind::Analysis;

    fn id(&self) -> AnalysisId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}
