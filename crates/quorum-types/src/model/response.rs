use super::{Entity, EntityKind};
use crate::{QuestionId, ResponseId, SessionId, SurveyId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The content of one answer.
///
/// Tagged by `type` on the wire:
///
/// ```json
/// { "type": "choices", "values": ["red", "blue"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerPayload {
    Text {
        value: String,
    },
    Choice {
        value: String,
    },
    Choices {
        values: Vec<String>,
    },
    Rating {
        value: u8,
    },
    /// Reference to a recording held by blob storage.
    Voice {
        #[serde(rename = "blobRef")]
        blob_ref: String,
        #[serde(default, rename = "durationMs")]
        duration_ms: Option<u64>,
    },
}

impl AnswerPayload {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Choice { .. } => "choice",
            Self::Choices { .. } => "choices",
            Self::Rating { .. } => "rating",
            Self::Voice { .. } => "voice",
        }
    }
}

/// One answer to one question within one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: ResponseId,
    pub session_id: SessionId,
    pub question_id: QuestionId,
    /// Always equal to the session's survey.
    pub survey_id: SurveyId,
    pub tenant_id: TenantId,
    pub payload: AnswerPayload,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub edit_count: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Response {
    type Id = ResponseId;
    const KIND: EntityKind = EntityKind::Response;

    fn id(&self) -> ResponseId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}
