//! Backing store abstraction.
//!
//! The [`BackingStore`] trait is the only path to persisted data. It is
//! deliberately narrow: batched fetch by id, insert, update, delete, and
//! filtered listing. Everything above it (loaders, services) works in terms
//! of typed entities; the store works in terms of [`Record`]s keyed by
//! `(EntityKind, Uuid)`.
//!
//! # Ordering
//!
//! [`BackingStore::fetch_many`] returns rows in arbitrary order and omits
//! missing ids. Callers must map results back to keys themselves; the batch
//! loader does this by building a key → value map.
//!
//! # Constraints
//!
//! Implementations enforce:
//!
//! | Constraint | Fault |
//! |------------|-------|
//! | `identity.email` (case-insensitive) | [`StoreError::UniqueViolation`] |
//! | `tenant.name` (case-insensitive) | [`StoreError::UniqueViolation`] |
//! | `credential.key_hash` | [`StoreError::UniqueViolation`] |
//! | references to parent rows on write | [`StoreError::ForeignKeyViolation`] |
//! | deleting a row that is still referenced | [`StoreError::ForeignKeyViolation`] |
//!
//! # Example
//!
//! ```
//! use quorum_runtime::store::{self, InMemoryStore};
//! use quorum_types::{Survey, Tenant};
//!
//! # tokio_test_block(async {
//! let db = InMemoryStore::new();
//! let tenant = Tenant::new("Acme");
//! store::insert(&db, tenant.clone()).await.unwrap();
//!
//! let survey = Survey::new(tenant.id, "Onboarding");
//! store::insert(&db, survey.clone()).await.unwrap();
//!
//! let loaded: Option<Survey> = store::get(&db, survey.id).await.unwrap();
//! assert_eq!(loaded.map(|s| s.title), Some("Onboarding".to_string()));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod error;
mod memory;
mod snapshot;

pub use error::StoreError;
pub use memory::{InMemoryStore, StoreStats};
pub use snapshot::Snapshot;

use async_trait::async_trait;
use quorum_types::{
    AnalysisResult, AnalysisTarget, Credential, Entity, EntityKey, EntityKind, IdentityId,
    Identity, Page, Question, QuestionId, Response, Session, SessionId, SessionStatus, Survey,
    SurveyId, SurveyStatus, Tenant, TenantId,
};
use uuid::Uuid;

/// One persisted row.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Tenant(Tenant),
    Identity(Identity),
    Survey(Survey),
    Question(Question),
    Session(Session),
    Response(Response),
    Credential(Credential),
    Analysis(AnalysisResult),
}

/// A parent row a record points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub kind: EntityKind,
    pub id: Uuid,
    pub constraint: &'static str,
}

impl Reference {
    fn new(kind: EntityKind, id: Uuid, constraint: &'static str) -> Self {
        Self {
            kind,
            id,
            constraint,
        }
    }
}

impl Record {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Tenant(_) => EntityKind::Tenant,
            Self::Identity(_) => EntityKind::Identity,
            Self::Survey(_) => EntityKind::Survey,
            Self::Question(_) => EntityKind::Question,
            Self::Session(_) => EntityKind::Session,
            Self::Response(_) => EntityKind::Response,
            Self::Credential(_) => EntityKind::Credential,
            Self::Analysis(_) => EntityKind::Analysis,
        }
    }

    /// Primary key.
    #[must_use]
    pub fn key(&self) -> Uuid {
        match self {
            Self::Tenant(e) => e.id.as_uuid(),
            Self::Identity(e) => e.id.as_uuid(),
            Self::Survey(e) => e.id.as_uuid(),
            Self::Question(e) => e.id.as_uuid(),
            Self::Session(e) => e.id.as_uuid(),
            Self::Response(e) => e.id.as_uuid(),
            Self::Credential(e) => e.id.as_uuid(),
            Self::Analysis(e) => e.id.as_uuid(),
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            Self::Tenant(e) => e.tenant_id(),
            Self::Identity(e) => e.tenant_id(),
            Self::Survey(e) => e.tenant_id(),
            Self::Question(e) => e.tenant_id(),
            Self::Session(e) => e.tenant_id(),
            Self::Response(e) => e.tenant_id(),
            Self::Credential(e) => e.tenant_id(),
            Self::Analysis(e) => e.tenant_id(),
        }
    }

    /// Parent rows that must exist while this record exists.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        use EntityKind as K;
        match self {
            Self::Tenant(_) => Vec::new(),
            Self::Identity(e) => e
                .tenant_id
                .map(|t| Reference::new(K::Tenant, t.as_uuid(), "identity.tenant_id"))
                .into_iter()
                .collect(),
            Self::Survey(e) => vec![Reference::new(
                K::Tenant,
                e.tenant_id.as_uuid(),
                "survey.tenant_id",
            )],
            Self::Question(e) => vec![Reference::new(
                K::Survey,
                e.survey_id.as_uuid(),
                "question.survey_id",
            )],
            Self::Session(e) => vec![Reference::new(
                K::Survey,
                e.survey_id.as_uuid(),
                "session.survey_id",
            )],
            Self::Response(e) => vec![
                Reference::new(K::Session, e.session_id.as_uuid(), "response.session_id"),
                Reference::new(K::Question, e.question_id.as_uuid(), "response.question_id"),
            ],
            Self::Credential(e) => vec![
                Reference::new(K::Tenant, e.tenant_id.as_uuid(), "credential.tenant_id"),
                Reference::new(K::Identity, e.owner_id.as_uuid(), "credential.owner_id"),
            ],
            Self::Analysis(e) => {
                let mut refs = vec![Reference::new(
                    K::Survey,
                    e.survey_id.as_uuid(),
                    "analysis.survey_id",
                )];
                if let AnalysisTarget::Response(id) = e.target {
                    refs.push(Reference::new(K::Response, id.as_uuid(), "analysis.response_id"));
                }
                refs
            }
        }
    }

    /// Values that must be unique within this record's table, keyed by
    /// constraint name.
    #[must_use]
    pub fn unique_keys(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Tenant(e) => vec![("tenant.name", e.name.to_lowercase())],
            Self::Identity(e) => vec![("identity.email", e.email.to_lowercase())],
            Self::Credential(e) => vec![("credential.key_hash", e.key_hash.clone())],
            _ => Vec::new(),
        }
    }

    /// Listing order: questions by position, everything else by creation.
    #[must_use]
    pub fn sort_key(&self) -> i64 {
        match self {
            Self::Tenant(e) => e.created_at.timestamp_micros(),
            Self::Identity(e) => e.created_at.timestamp_micros(),
            Self::Survey(e) => e.created_at.timestamp_micros(),
            Self::Question(e) => i64::from(e.position),
            Self::Session(e) => e.created_at.timestamp_micros(),
            Self::Response(e) => e.created_at.timestamp_micros(),
            Self::Credential(e) => e.created_at.timestamp_micros(),
            Self::Analysis(e) => e.created_at.timestamp_micros(),
        }
    }

    /// Returns `true` if this record satisfies `filter`.
    ///
    /// A filter that does not apply to the record's kind never matches.
    #[must_use]
    pub fn matches(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Tenant(t) => self.tenant_id() == Some(*t),
            Filter::Survey(s) => match self {
                Self::Survey(e) => e.id == *s,
                Self::Question(e) => e.survey_id == *s,
                Self::Session(e) => e.survey_id == *s,
                Self::Response(e) => e.survey_id == *s,
                Self::Analysis(e) => e.survey_id == *s,
                _ => false,
            },
            Filter::Session(s) => matches!(self, Self::Response(e) if e.session_id == *s),
            Filter::Question(q) => matches!(self, Self::Response(e) if e.question_id == *q),
            Filter::Owner(o) => match self {
                Self::Credential(e) => e.owner_id == *o,
                Self::Session(e) => e.identity_id == Some(*o),
                Self::Survey(e) => e.created_by == Some(*o),
                _ => false,
            },
            Filter::SurveyStatus(status) => matches!(self, Self::Survey(e) if e.status == *status),
            Filter::SessionStatus(status) => {
                matches!(self, Self::Session(e) if e.status == *status)
            }
            Filter::Email(email) => {
                matches!(self, Self::Identity(e) if e.email.eq_ignore_ascii_case(email))
            }
            Filter::KeyHash(hash) => matches!(self, Self::Credential(e) if e.key_hash == *hash),
            Filter::AnyOf(any) => any.iter().any(|f| self.matches(f)),
        }
    }
}

/// Row predicate for [`Query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Tenant(TenantId),
    Survey(SurveyId),
    Session(SessionId),
    Question(QuestionId),
    /// Credential owner, session respondent or survey author.
    Owner(IdentityId),
    SurveyStatus(SurveyStatus),
    SessionStatus(SessionStatus),
    /// Case-insensitive email match.
    Email(String),
    KeyHash(String),
    AnyOf(Vec<Filter>),
}

/// Filtered listing of one table. All filters must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: EntityKind,
    pub filters: Vec<Filter>,
    pub page: Option<Page>,
}

impl Query {
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            page: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record.kind() == self.kind && self.filters.iter().all(|f| record.matches(f))
    }
}

/// Persistence backend.
///
/// Implementations must be thread-safe; one instance is shared by every
/// request.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Fetches the rows with the given ids.
    ///
    /// Missing ids are omitted; the order of the result is unspecified.
    async fn fetch_many(&self, kind: EntityKind, ids: &[Uuid]) -> Result<Vec<Record>, StoreError>;

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// Unique and foreign key violations.
    async fn insert(&self, record: Record) -> Result<(), StoreError>;

    /// Replaces an existing row.
    ///
    /// # Errors
    ///
    /// [`StoreError::Missing`] if the row does not exist, plus constraint
    /// violations.
    async fn update(&self, record: Record) -> Result<(), StoreError>;

    /// Deletes a row. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// [`StoreError::ForeignKeyViolation`] if other rows still reference it.
    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, StoreError>;

    /// Lists rows matching `query` in listing order.
    async fn query(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Counts rows matching `query`, ignoring its page.
    async fn count(&self, query: &Query) -> Result<u64, StoreError>;
}

/// Conversion between typed entities and [`Record`]s.
pub trait StoredEntity: Entity {
    fn into_record(self) -> Record;

    /// Returns `None` if the record belongs to another table.
    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! stored_entity {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl StoredEntity for $ty {
                fn into_record(self) -> Record {
                    Record::$variant(self)
                }

                fn from_record(record: Record) -> Option<Self> {
                    match record {
                        Record::$variant(e) => Some(e),
                        _ => None,
                    }
                }
            }
        )*
    };
}

stored_entity!(
    Tenant => Tenant,
    Identity => Identity,
    Survey => Survey,
    Question => Question,
    Session => Session,
    Response => Response,
    Credential => Credential,
    AnalysisResult => Analysis,
);

/// Fetches typed entities by id. Missing ids are omitted.
pub async fn fetch<E: StoredEntity>(
    store: &dyn BackingStore,
    ids: &[E::Id],
) -> Result<Vec<E>, StoreError> {
    let keys: Vec<Uuid> = ids.iter().map(EntityKey::as_uuid).collect();
    let rows = store.fetch_many(E::KIND, &keys).await?;
    Ok(rows.into_iter().filter_map(E::from_record).collect())
}

/// Fetches one typed entity.
pub async fn get<E: StoredEntity>(
    store: &dyn BackingStore,
    id: E::Id,
) -> Result<Option<E>, StoreError> {
    Ok(fetch::<E>(store, &[id]).await?.into_iter().next())
}

/// Lists typed entities.
pub async fn list<E: StoredEntity>(
    store: &dyn BackingStore,
    filters: Vec<Filter>,
    page: Option<Page>,
) -> Result<Vec<E>, StoreError> {
    let query = Query {
        kind: E::KIND,
        filters,
        page,
    };
    let rows = store.query(&query).await?;
    Ok(rows.into_iter().filter_map(E::from_record).collect())
}

pub async fn insert<E: StoredEntity>(store: &dyn BackingStore, entity: E) -> Result<(), StoreError> {
    store.insert(entity.into_record()).await
}

pub async fn update<E: StoredEntity>(store: &dyn BackingStore, entity: E) -> Result<(), StoreError> {
    store.update(entity.into_record()).await
}

pub async fn delete<E: StoredEntity>(
    store: &dyn BackingStore,
    id: E::Id,
) -> Result<bool, StoreError> {
    store.delete(E::KIND, id.as_uuid()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{QuestionKind, Role};

    #[test]
    fn records_report_parent_references() {
        let tenant = Tenant::new("Acme");
        let survey = Survey::new(tenant.id, "Pulse");
        let question = Question::new(survey.id, tenant.id, QuestionKind::Text, "Why?", 0);

        let refs = question.clone().into_record().references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, EntityKind::Survey);
        assert_eq!(refs[0].id, survey.id.as_uuid());

        let system = Identity::new("root@example.com", Role::SystemAdmin, None);
        assert!(system.into_record().references().is_empty());
    }

    #[test]
    fn filters_only_apply_to_their_kinds() {
        let tenant = Tenant::new("Acme");
        let survey = Survey::new(tenant.id, "Pulse");
        let record = survey.clone().into_record();

        assert!(record.matches(&Filter::Tenant(tenant.id)));
        assert!(record.matches(&Filter::Survey(survey.id)));
        assert!(record.matches(&Filter::SurveyStatus(SurveyStatus::Draft)));
        assert!(!record.matches(&Filter::Session(SessionId::new())));
        assert!(!record.matches(&Filter::Email("a@b.c".into())));
        assert!(record.matches(&Filter::AnyOf(vec![
            Filter::SurveyStatus(SurveyStatus::Active),
            Filter::SurveyStatus(SurveyStatus::Draft),
        ])));
    }

    #[test]
    fn email_filter_ignores_case() {
        let identity = Identity::new("Ana@Example.com", Role::User, None);
        assert!(identity
            .into_record()
            .matches(&Filter::Email("ana@example.COM".into())));
    }

    #[test]
    fn record_round_trips_through_typed_entity() {
        let tenant = Tenant::new("Acme");
        let record = tenant.clone().into_record();
        assert_eq!(record.kind(), EntityKind::Tenant);
        assert_eq!(Tenant::from_record(record.clone()), Some(tenant));
        assert_eq!(Survey::from_record(record), None);
    }
}
