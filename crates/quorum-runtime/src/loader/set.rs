//! The per-request loader set.

use super::fetchers::{
    ById, CredentialsByTenant, QuestionsBySurvey, ResponsesBySession, SurveyStats,
    SurveyStatsFetch,
};
use super::BatchLoader;
use crate::config::LoaderConfig;
use crate::store::{BackingStore, StoredEntity};
use quorum_types::{
    AnalysisId, AnalysisResult, Credential, CredentialId, Identity, IdentityId, Question,
    QuestionId, Response, ResponseId, Session, SessionId, Survey, SurveyId, Tenant, TenantId,
};
use std::sync::Arc;

/// One instance of every loader, created fresh for each request.
///
/// Never shared between requests: a cached value is only as fresh as the
/// request that loaded it.
pub struct Loaders {
    pub tenants: BatchLoader<TenantId, Tenant>,
    pub identities: BatchLoader<IdentityId, Identity>,
    pub surveys: BatchLoader<SurveyId, Survey>,
    pub questions: BatchLoader<QuestionId, Question>,
    pub sessions: BatchLoader<SessionId, Session>,
    pub responses: BatchLoader<ResponseId, Response>,
    pub credentials: BatchLoader<CredentialId, Credential>,
    pub analyses: BatchLoader<AnalysisId, AnalysisResult>,

    pub questions_by_survey: BatchLoader<SurveyId, Vec<Question>>,
    pub credentials_by_tenant: BatchLoader<TenantId, Vec<Credential>>,
    pub responses_by_session: BatchLoader<SessionId, Vec<Response>>,
    pub survey_stats: BatchLoader<SurveyId, SurveyStats>,
}

impl Loaders {
    pub fn new(store: Arc<dyn BackingStore>, config: &LoaderConfig) -> Self {
        let max = config.max_batch_size;
        let s = || Arc::clone(&store);
        Self {
            tenants: BatchLoader::new("tenants", ById::<Tenant>::new(s()), max),
            identities: BatchLoader::new("identities", ById::<Identity>::new(s()), max),
            surveys: BatchLoader::new("surveys", ById::<Survey>::new(s()), max),
            questions: BatchLoader::new("questions", ById::<Question>::new(s()), max),
            sessions: BatchLoader::new("sessions", ById::<Session>::new(s()), max),
            responses: BatchLoader::new("responses", ById::<Response>::new(s()), max),
            credentials: BatchLoader::new("credentials", ById::<Credential>::new(s()), max),
            analyses: BatchLoader::new("analyses", ById::<AnalysisResult>::new(s()), max),
            questions_by_survey: BatchLoader::new("questions_by_survey", QuestionsBySurvey(s()), max),
            credentials_by_tenant: BatchLoader::new(
                "credentials_by_tenant",
                CredentialsByTenant(s()),
                max,
            ),
            responses_by_session: BatchLoader::new(
                "responses_by_session",
                ResponsesBySession(s()),
                max,
            ),
            survey_stats: BatchLoader::new("survey_stats", SurveyStatsFetch(s()), max),
        }
    }

    /// The by-id loader of `E`.
    #[must_use]
    pub fn of<E: Cached>(&self) -> &BatchLoader<E::Id, E> {
        E::loader(self)
    }
}

/// Entities with a by-id loader in [`Loaders`].
pub trait Cached: StoredEntity {
    fn loader(loaders: &Loaders) -> &BatchLoader<Self::Id, Self>;
}

macro_rules! cached {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl Cached for $ty {
                fn loader(loaders: &Loaders) -> &BatchLoader<Self::Id, Self> {
                    &loaders.$field
                }
            }
        )*
    };
}

cached!(
    Tenant => tenants,
    Identity => identities,
    Survey => surveys,
    Question => questions,
    Session => sessions,
    Response => responses,
    Credential => credentials,
    AnalysisResult => analyses,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, InMemoryStore};
    use quorum_types::EntityKind;

    #[tokio::test]
    async fn fresh_loader_sets_fetch_independently() {
        let db = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        store::insert(db.as_ref(), tenant.clone()).await.unwrap();
        let config = LoaderConfig::default();

        let first = Loaders::new(db.clone(), &config);
        assert!(first.tenants.load(tenant.id).await.is_some());
        assert!(first.of::<Tenant>().load(tenant.id).await.is_some());

        let second = Loaders::new(db.clone(), &config);
        assert!(second.tenants.load(tenant.id).await.is_some());

        assert_eq!(db.stats().fetches(EntityKind::Tenant), 2);
    }
}
