//! Test utilities.
//!
//! [`Fixture`] seeds an [`InMemoryStore`] with two tenants, one identity
//! per role and an active three-question survey, and hands out request
//! contexts and orchestrators over it. [`ScriptedStore`] wraps any store to
//! record, reorder or fail `fetch_many` calls.

#![allow(clippy::expect_used)]

use crate::config::QuorumConfig;
use crate::context::{ContextBuilder, RequestContext, RequestMeta, StaticVerifier};
use crate::orchestrator::Orchestrator;
use crate::resolvers::standard_registry;
use crate::store::{self, BackingStore, InMemoryStore, Query, Record, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use quorum_types::{
    EntityKind, Identity, Question, QuestionKind, Role, Survey, SurveyStatus, Tenant,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// A seeded store plus one identity per role.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub config: QuorumConfig,
    pub tenant: Tenant,
    pub other_tenant: Tenant,
    pub admin: Identity,
    pub analyst: Identity,
    pub user: Identity,
    pub viewer: Identity,
    /// A `USER` of `other_tenant`.
    pub outsider: Identity,
    /// `SYSTEM_ADMIN` with no home tenant.
    pub system: Identity,
    /// Active, accepts anonymous respondents.
    pub survey: Survey,
    /// Text (required), single choice (red/green/blue), rating (1..=5).
    pub questions: Vec<Question>,
    pub draft: Survey,
}

impl Fixture {
    /// Seeds a fresh store. Rate limiting is off.
    pub async fn new() -> Self {
        let mut config = QuorumConfig::default();
        config.rate_limit.enabled = false;
        Self::with_config(config).await
    }

    pub async fn with_config(config: QuorumConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Tenant::new("Acme");
        let other_tenant = Tenant::new("Globex");
        let home = Some(tenant.id);

        let admin = Identity::new("admin@acme.io", Role::TenantAdmin, home);
        let analyst = Identity::new("analyst@acme.io", Role::Analyst, home);
        let user = Identity::new("user@acme.io", Role::User, home);
        let viewer = Identity::new("viewer@acme.io", Role::Viewer, home);
        let outsider = Identity::new("user@globex.io", Role::User, Some(other_tenant.id));
        let system = Identity::new("root@quorum.io", Role::SystemAdmin, None);

        let now = Utc::now();
        let mut survey = Survey::new(tenant.id, "Customer pulse");
        survey.status = SurveyStatus::Active;
        survey.published_at = Some(now);
        survey.settings.allow_anonymous = true;
        survey.created_by = Some(admin.id);

        let mut text = Question::new(survey.id, tenant.id, QuestionKind::Text, "How was it?", 0);
        text.rules.required = true;
        let mut choice = Question::new(
            survey.id,
            tenant.id,
            QuestionKind::SingleChoice,
            "Favourite colour?",
            1,
        );
        choice.rules.choices = vec!["red".into(), "green".into(), "blue".into()];
        let mut rating = Question::new(survey.id, tenant.id, QuestionKind::Rating, "Score us", 2);
        rating.rules.scale = Some(5);
        let questions = vec![text, choice, rating];

        let draft = Survey::new(tenant.id, "Roadmap input");

        let db: &dyn BackingStore = store.as_ref();
        for t in [&tenant, &other_tenant] {
            store::insert(db, t.clone()).await.expect("seed tenant");
        }
        for i in [&admin, &analyst, &user, &viewer, &outsider, &system] {
            store::insert(db, i.clone()).await.expect("seed identity");
        }
        for s in [&survey, &draft] {
            store::insert(db, s.clone()).await.expect("seed survey");
        }
        for q in &questions {
            store::insert(db, q.clone()).await.expect("seed question");
        }
        store.reset_stats();

        Self {
            store,
            config,
            tenant,
            other_tenant,
            admin,
            analyst,
            user,
            viewer,
            outsider,
            system,
            survey,
            questions,
            draft,
        }
    }

    /// Session token the fixture verifier accepts for `identity`.
    #[must_use]
    pub fn token(identity: &Identity) -> String {
        format!("session-{}", identity.id.uuid())
    }

    fn verifier(&self) -> StaticVerifier {
        [&self.admin, &self.analyst, &self.user, &self.viewer, &self.outsider, &self.system]
            .into_iter()
            .fold(StaticVerifier::new(), |v, i| v.with_token(Self::token(i), i.id))
    }

    /// Request metadata authenticated as `identity`, or anonymous.
    #[must_use]
    pub fn meta(identity: Option<&Identity>) -> RequestMeta {
        match identity {
            Some(i) => RequestMeta::new().with_bearer(Self::token(i)),
            None => RequestMeta::new(),
        }
    }

    /// Context builder over `store`, which usually wraps `self.store`.
    pub fn contexts_over(&self, store: Arc<dyn BackingStore>) -> ContextBuilder {
        let matrix = self.config.role_matrix().expect("fixture role matrix");
        ContextBuilder::new(
            store,
            Arc::new(matrix),
            Arc::new(self.verifier()),
            Arc::new(self.config.clone()),
        )
    }

    pub fn contexts(&self) -> ContextBuilder {
        self.contexts_over(self.store.clone())
    }

    /// A request context for `identity`.
    pub async fn context(&self, identity: Option<&Identity>) -> RequestContext {
        self.contexts().build(Self::meta(identity)).await
    }

    pub fn orchestrator_over(&self, store: Arc<dyn BackingStore>) -> Orchestrator {
        let registry = standard_registry().expect("standard registry");
        Orchestrator::new(registry, self.contexts_over(store))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_over(self.store.clone())
    }
}

/// Store wrapper that records, reorders or fails `fetch_many` calls.
pub struct ScriptedStore {
    inner: Arc<dyn BackingStore>,
    reverse: bool,
    poisoned: Mutex<HashSet<Uuid>>,
    calls: Mutex<Vec<(EntityKind, Vec<Uuid>)>>,
}

impl ScriptedStore {
    pub fn new(inner: Arc<dyn BackingStore>) -> Self {
        Self {
            inner,
            reverse: false,
            poisoned: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns fetched rows in reverse order.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Any fetch that asks for `id` fails.
    pub fn poison(&self, id: Uuid) {
        self.poisoned.lock().insert(id);
    }

    /// Every `fetch_many` call so far, in order.
    pub fn calls(&self) -> Vec<(EntityKind, Vec<Uuid>)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, kind: EntityKind) -> Vec<Vec<Uuid>> {
        self.calls
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, ids)| ids.clone())
            .collect()
    }
}

#[async_trait]
impl BackingStore for ScriptedStore {
    async fn fetch_many(&self, kind: EntityKind, ids: &[Uuid]) -> Result<Vec<Record>, StoreError> {
        self.calls.lock().push((kind, ids.to_vec()));
        let poisoned = {
            let poisoned = self.poisoned.lock();
            ids.iter().any(|id| poisoned.contains(id))
        };
        if poisoned {
            return Err(StoreError::Unavailable("scripted failure".into()));
        }
        let mut rows = self.inner.fetch_many(kind, ids).await?;
        if self.reverse {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn insert(&self, record: Record) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn update(&self, record: Record) -> Result<(), StoreError> {
        self.inner.update(record).await
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete(kind, id).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.inner.query(query).await
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        self.inner.count(query).await
    }
}
