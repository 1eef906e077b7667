//! Questions and answer validation.
//!
//! A question's [`QuestionKind`] decides which [`AnswerPayload`] variant it
//! accepts; its [`ValidationRules`] further constrain the payload. Both are
//! checked by [`Question::validate_answer`] before a response is stored.

use super::{AnswerPayload, Entity, EntityKind};
use crate::{QuestionId, SurveyId, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    Text,
    SingleChoice,
    MultiChoice,
    Rating,
    Voice,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::SingleChoice => "SINGLE_CHOICE",
            Self::MultiChoice => "MULTI_CHOICE",
            Self::Rating => "RATING",
            Self::Voice => "VOICE",
        }
    }

    #[must_use]
    pub fn uses_choices(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultiChoice)
    }
}

/// Constraints applied to answers.
///
/// Fields that do not apply to the question's kind are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRules {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Allowed options for choice questions.
    pub choices: Vec<String>,
    /// Inclusive upper bound of the rating scale (lower bound is 1).
    pub scale: Option<u8>,
}

impl ValidationRules {
    /// Checks the rules are self-consistent for `kind`.
    pub fn check(&self, kind: QuestionKind) -> Result<(), AnswerRejected> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(AnswerRejected::new("minLength exceeds maxLength"));
            }
        }
        if kind.uses_choices() {
            if self.choices.is_empty() {
                return Err(AnswerRejected::new("choice questions need at least one choice"));
            }
            let distinct: BTreeSet<&str> = self.choices.iter().map(String::as_str).collect();
            if distinct.len() != self.choices.len() {
                return Err(AnswerRejected::new("choices must be unique"));
            }
        }
        if kind == QuestionKind::Rating && matches!(self.scale, Some(0 | 1)) {
            return Err(AnswerRejected::new("rating scale must be at least 2"));
        }
        Ok(())
    }
}

/// Default rating scale when none is configured.
pub const DEFAULT_RATING_SCALE: u8 = 5;

/// An answer payload did not satisfy the question.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct AnswerRejected {
    pub reason: String,
}

impl AnswerRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub survey_id: SurveyId,
    /// Denormalised from the survey for tenant scoping.
    pub tenant_id: TenantId,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Zero-based ordering index within the survey.
    pub position: u32,
    #[serde(default)]
    pub rules: ValidationRules,
}

impl Question {
    #[must_use]
    pub fn new(
        survey_id: SurveyId,
        tenant_id: TenantId,
        kind: QuestionKind,
        prompt: impl Into<String>,
        position: u32,
    ) -> Self {
        Self {
            id: QuestionId::new(),
            survey_id,
            tenant_id,
            kind,
            prompt: prompt.into(),
            position,
            rules: ValidationRules::default(),
        }
    }

    /// Validates an answer against this question's kind and rules.
    ///
    /// # Errors
    ///
    /// Returns [`AnswerRejected`] describing the first violated constraint.
    pub fn validate_answer(&self, payload: &AnswerPayload) -> Result<(), AnswerRejected> {
        let rules = &self.rules;
        match (self.kind, payload) {
            (QuestionKind::Text, AnswerPayload::Text { value }) => {
                let len = value.trim().chars().count();
                if rules.required && len == 0 {
                    return Err(AnswerRejected::new("answer is required"));
                }
                if let Some(min) = rules.min_length {
                    if len < min {
                        return Err(AnswerRejected::new(format!(
                            "answer must be at least {min} characters"
                        )));
                    }
                }
                if let Some(max) = rules.max_length {
                    if len > max {
                        return Err(AnswerRejected::new(format!(
                            "answer must be at most {max} characters"
                        )));
                    }
                }
                Ok(())
            }
            (QuestionKind::SingleChoice, AnswerPayload::Choice { value }) => {
                self.check_choice(value)
            }
            (QuestionKind::MultiChoice, AnswerPayload::Choices { values }) => {
                if rules.required && values.is_empty() {
                    return Err(AnswerRejected::new("select at least one option"));
                }
                let distinct: BTreeSet<&str> = values.iter().map(String::as_str).collect();
                if distinct.len() != values.len() {
                    return Err(AnswerRejected::new("options must not repeat"));
                }
                values.iter().try_for_each(|v| self.check_choice(v))
            }
            (QuestionKind::Rating, AnswerPayload::Rating { value }) => {
                let scale = rules.scale.unwrap_or(DEFAULT_RATING_SCALE);
                if *value < 1 || *value > scale {
                    return Err(AnswerRejected::new(format!(
                        "rating must be between 1 and {scale}"
                    )));
                }
                Ok(())
            }
            (QuestionKind::Voice, AnswerPayload::Voice { blob_ref, .. }) => {
                if blob_ref.trim().is_empty() {
                    return Err(AnswerRejected::new("voice answer needs a recording reference"));
                }
                Ok(())
            }
            (kind, payload) => Err(AnswerRejected::new(format!(
                "{} answer does not fit a {} question",
                payload.kind_name(),
                kind.as_str()
            ))),
        }
    }

    fn check_choice(&self, value: &str) -> Result<(), AnswerRejected> {
        if self.rules.choices.iter().any(|c| c == value) {
            Ok(())
        } else {
            Err(AnswerRejected::new(format!("'{value}' is not one of the options")))
        }
    }
}

impl Entity for Question {
    type Id = QuestionId;
    const KIND: EntityKind = EntityKind::Question;

    fn id(&self) -> QuestionId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}
