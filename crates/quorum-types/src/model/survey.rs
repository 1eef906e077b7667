use super::{Entity, EntityKind};
use crate::{IdentityId, SurveyId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Survey lifecycle.
///
/// ```text
/// Draft ──publish──► Active ◄──publish── Paused
///                      │                   ▲
///                      └──────pause────────┘
/// any ──archive──► Archived (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

impl SurveyStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Archived => "ARCHIVED",
        }
    }

    #[must_use]
    pub fn can_publish(self) -> bool {
        matches!(self, Self::Draft | Self::Paused)
    }

    #[must_use]
    pub fn can_pause(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Questions may only be edited while nobody can be answering them.
    #[must_use]
    pub fn questions_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Paused)
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurveySettings {
    pub allow_anonymous: bool,
    pub completion_message: Option<String>,
    /// Overrides the configured session inactivity timeout.
    pub session_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: SurveyId,
    pub tenant_id: TenantId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: SurveyStatus,
    #[serde(default)]
    pub settings: SurveySettings,
    #[serde(default)]
    pub created_by: Option<IdentityId>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Survey {
    /// Creates a draft survey.
    #[must_use]
    pub fn new(tenant_id: TenantId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SurveyId::new(),
            tenant_id,
            title: title.into(),
            description: None,
            status: SurveyStatus::Draft,
            settings: SurveySettings::default(),
            created_by: None,
            created_at: now,
            updated_at: now,
            published_at: None,
            archived_at: None,
        }
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.status == SurveyStatus::Archived
    }
}

impl Entity for Survey {
    type Id = SurveyId;
    const KIND: EntityKind = EntityKind::Survey;

    fn id(&self) -> SurveyId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_predicates() {
        assert!(SurveyStatus::Draft.can_publish());
        assert!(SurveyStatus::Paused.can_publish());
        assert!(!SurveyStatus::Active.can_publish());
        assert!(!SurveyStatus::Archived.can_publish());

        assert!(SurveyStatus::Active.can_pause());
        assert!(!SurveyStatus::Draft.can_pause());

        assert!(SurveyStatus::Draft.questions_editable());
        assert!(!SurveyStatus::Active.questions_editable());
        assert!(!SurveyStatus::Archived.questions_editable());
    }

    #[test]
    fn settings_default_on_missing_fields() {
        let json = serde_json::json!({
            "id": SurveyId::new(),
            "tenantId": TenantId::new(),
            "title": "Onboarding"
        });
        let survey: Survey = serde_json::from_value(json).unwrap();
        assert_eq!(survey.status, SurveyStatus::Draft);
        assert!(!survey.settings.allow_anonymous);
        assert!(survey.published_at.is_none());
    }
}
