//! [`BatchFn`] implementations over a [`BackingStore`].
//!
//! Each fetcher issues exactly one store call per batch and maps the rows
//! back to the requested keys itself.

use super::BatchFn;
use crate::store::{self, BackingStore, Filter, StoreError, StoredEntity};
use async_trait::async_trait;
use quorum_types::{
    AnalysisResult, Credential, Question, Response, Session, SessionId, SessionStatus,
    SurveyId, TenantId,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

/// Primary-key fetch of any stored entity.
pub struct ById<E> {
    store: Arc<dyn BackingStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> ById<E> {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: StoredEntity> BatchFn<E::Id, E> for ById<E> {
    async fn load(&self, keys: &[E::Id]) -> Result<HashMap<E::Id, E>, StoreError> {
        let rows = store::fetch::<E>(self.store.as_ref(), keys).await?;
        Ok(rows.into_iter().map(|e| (e.id(), e)).collect())
    }
}

/// Groups `rows` under every requested key; keys with no rows get an empty
/// list rather than a miss.
fn group<K, E>(keys: &[K], rows: Vec<E>, key_of: impl Fn(&E) -> K) -> HashMap<K, Vec<E>>
where
    K: Copy + Eq + std::hash::Hash,
{
    let mut grouped: HashMap<K, Vec<E>> = keys.iter().map(|k| (*k, Vec::new())).collect();
    for row in rows {
        if let Some(list) = grouped.get_mut(&key_of(&row)) {
            list.push(row);
        }
    }
    grouped
}

fn any_of<K: Copy>(keys: &[K], filter: impl Fn(K) -> Filter) -> Filter {
    Filter::AnyOf(keys.iter().copied().map(filter).collect())
}

/// Questions of each survey, in position order.
pub struct QuestionsBySurvey(pub Arc<dyn BackingStore>);

#[async_trait]
impl BatchFn<SurveyId, Vec<Question>> for QuestionsBySurvey {
    async fn load(&self, keys: &[SurveyId]) -> Result<HashMap<SurveyId, Vec<Question>>, StoreError> {
        let rows: Vec<Question> =
            store::list(self.0.as_ref(), vec![any_of(keys, Filter::Survey)], None).await?;
        Ok(group(keys, rows, |q| q.survey_id))
    }
}

/// API credentials of each tenant.
pub struct CredentialsByTenant(pub Arc<dyn BackingStore>);

#[async_trait]
impl BatchFn<TenantId, Vec<Credential>> for CredentialsByTenant {
    async fn load(&self, keys: &[TenantId]) -> Result<HashMap<TenantId, Vec<Credential>>, StoreError> {
        let rows: Vec<Credential> =
            store::list(self.0.as_ref(), vec![any_of(keys, Filter::Tenant)], None).await?;
        Ok(group(keys, rows, |c| c.tenant_id))
    }
}

/// Answers recorded in each session.
pub struct ResponsesBySession(pub Arc<dyn BackingStore>);

#[async_trait]
impl BatchFn<SessionId, Vec<Response>> for ResponsesBySession {
    async fn load(&self, keys: &[SessionId]) -> Result<HashMap<SessionId, Vec<Response>>, StoreError> {
        let rows: Vec<Response> =
            store::list(self.0.as_ref(), vec![any_of(keys, Filter::Session)], None).await?;
        Ok(group(keys, rows, |r| r.session_id))
    }
}

/// Aggregate figures for one survey.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyStats {
    pub survey_id: SurveyId,
    pub sessions_total: u64,
    /// Session count per status name.
    pub sessions_by_status: BTreeMap<String, u64>,
    pub responses: u64,
    /// Completed sessions over all sessions, `0.0` when there are none.
    pub completion_rate: f64,
    /// Mean sentiment over analysis results that carry one.
    pub mean_sentiment: Option<f64>,
}

impl SurveyStats {
    fn compute(
        survey_id: SurveyId,
        sessions: &[Session],
        responses: usize,
        analyses: &[AnalysisResult],
    ) -> Self {
        let mut by_status = BTreeMap::new();
        for session in sessions {
            *by_status.entry(session.status.as_str().to_string()).or_insert(0) += 1;
        }
        let total = sessions.len() as u64;
        let completed = by_status
            .get(SessionStatus::Completed.as_str())
            .copied()
            .unwrap_or(0);
        let completion_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };

        let sentiments: Vec<f64> = analyses.iter().filter_map(|a| a.sentiment).collect();
        let mean_sentiment = (!sentiments.is_empty())
            .then(|| sentiments.iter().sum::<f64>() / sentiments.len() as f64);

        Self {
            survey_id,
            sessions_total: total,
            sessions_by_status: by_status,
            responses: responses as u64,
            completion_rate,
            mean_sentiment,
        }
    }
}

/// Stats for each survey: one query each for sessions, responses and
/// analyses, whatever the batch size.
pub struct SurveyStatsFetch(pub Arc<dyn BackingStore>);

#[async_trait]
impl BatchFn<SurveyId, SurveyStats> for SurveyStatsFetch {
    async fn load(&self, keys: &[SurveyId]) -> Result<HashMap<SurveyId, SurveyStats>, StoreError> {
        let store = self.0.as_ref();
        let by_survey = || vec![any_of(keys, Filter::Survey)];
        let sessions: Vec<Session> = store::list(store, by_survey(), None).await?;
        let responses: Vec<Response> = store::list(store, by_survey(), None).await?;
        let analyses: Vec<AnalysisResult> = store::list(store, by_survey(), None).await?;

        let sessions = group(keys, sessions, |s| s.survey_id);
        let responses = group(keys, responses, |r| r.survey_id);
        let analyses = group(keys, analyses, |a| a.survey_id);

        Ok(keys
            .iter()
            .map(|id| {
                let stats = SurveyStats::compute(
                    *id,
                    sessions.get(id).map_or(&[][..], Vec::as_slice),
                    responses.get(id).map_or(0, Vec::len),
                    analyses.get(id).map_or(&[][..], Vec::as_slice),
                );
                (*id, stats)
            })
            .collect())
    }
}
