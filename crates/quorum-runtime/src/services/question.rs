//! Question service.
//!
//! Questions can only change while their survey is `Draft` or `Paused`.

use super::{required_text, ServiceDeps, ServiceError};
use quorum_types::{Question, QuestionId, QuestionKind, Survey, SurveyId, ValidationRules};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub rules: ValidationRules,
}

/// Partial question update. The kind is fixed once created.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionPatch {
    pub prompt: Option<String>,
    pub rules: Option<ValidationRules>,
}

#[derive(Clone)]
pub struct QuestionService {
    deps: ServiceDeps,
}

impl QuestionService {
    pub fn new(deps: ServiceDeps) -> Self {
        Self { deps }
    }

    pub async fn get(&self, id: QuestionId) -> Result<Question, ServiceError> {
        self.deps.require::<Question>(id).await
    }

    async fn editable_survey(&self, id: SurveyId) -> Result<Survey, ServiceError> {
        let survey = self.deps.require::<Survey>(id).await?;
        if !survey.status.questions_editable() {
            return Err(ServiceError::conflict(format!(
                "questions of a {} survey cannot be changed",
                survey.status
            )));
        }
        Ok(survey)
    }

    async fn siblings(&self, survey: SurveyId) -> Vec<Question> {
        self.deps
            .loaders
            .questions_by_survey
            .load(survey)
            .await
            .unwrap_or_default()
    }

    fn check_rules(kind: QuestionKind, rules: &ValidationRules) -> Result<(), ServiceError> {
        rules
            .check(kind)
            .map_err(|err| ServiceError::invalid_field("rules", err.reason))
    }

    /// Appends a question to the end of a survey.
    pub async fn add(&self, survey_id: SurveyId, input: NewQuestion) -> Result<Question, ServiceError> {
        let survey = self.editable_survey(survey_id).await?;
        Self::check_rules(input.kind, &input.rules)?;
        let prompt = required_text("prompt", &input.prompt)?;

        let position = self
            .siblings(survey_id)
            .await
            .iter()
            .map(|q| q.position + 1)
            .max()
            .unwrap_or(0);
        let mut question = Question::new(survey.id, survey.tenant_id, input.kind, prompt, position);
        question.rules = input.rules;

        let question = self.deps.insert(question).await?;
        self.deps.loaders.questions_by_survey.clear(&survey_id);
        Ok(question)
    }

    pub async fn update(&self, id: QuestionId, patch: QuestionPatch) -> Result<Question, ServiceError> {
        let mut question = self.get(id).await?;
        self.editable_survey(question.survey_id).await?;
        if let Some(prompt) = patch.prompt {
            question.prompt = required_text("prompt", &prompt)?;
        }
        if let Some(rules) = patch.rules {
            Self::check_rules(question.kind, &rules)?;
            question.rules = rules;
        }
        let question = self.deps.save(question).await?;
        self.deps.loaders.questions_by_survey.clear(&question.survey_id);
        Ok(question)
    }

    /// Deletes an unanswered question and closes the gap in positions.
    pub async fn delete(&self, id: QuestionId) -> Result<Question, ServiceError> {
        let question = self.get(id).await?;
        let survey_id = question.survey_id;
        self.editable_survey(survey_id).await?;

        match self.deps.remove::<Question>(id).await {
            Ok(_) => {}
            Err(ServiceError::Validation { .. }) => {
                return Err(ServiceError::conflict("question already has answers"));
            }
            Err(err) => return Err(err),
        }

        for mut sibling in self.siblings(survey_id).await {
            if sibling.id != id && sibling.position > question.position {
                sibling.position -= 1;
                self.deps.save(sibling).await?;
            }
        }
        self.deps.loaders.questions_by_survey.clear(&survey_id);
        Ok(question)
    }

    /// Reorders a survey's questions. `order` must name every question of
    /// the survey exactly once.
    pub async fn reorder(&self, survey_id: SurveyId, order: &[QuestionId]) -> Result<Vec<Question>, ServiceError> {
        self.editable_survey(survey_id).await?;
        let current = self.siblings(survey_id).await;

        let wanted: HashSet<QuestionId> = order.iter().copied().collect();
        let existing: HashSet<QuestionId> = current.iter().map(|q| q.id).collect();
        if wanted.len() != order.len() || wanted != existing {
            return Err(ServiceError::invalid_field(
                "order",
                "order must list every question of the survey exactly once",
            ));
        }

        let mut reordered = Vec::with_capacity(current.len());
        for (position, id) in (0u32..).zip(order) {
            let Some(mut question) = current.iter().find(|q| q.id == *id).cloned() else {
                continue;
            };
            if question.position != position {
                question.position = position;
                question = self.deps.save(question).await?;
            }
            reordered.push(question);
        }
        self.deps.loaders.questions_by_survey.clear(&survey_id);
        Ok(reordered)
    }
}
