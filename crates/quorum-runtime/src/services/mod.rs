//! Domain services.
//!
//! One service per entity. Services own the business rules (lifecycle
//! transitions, validation, duplicate detection) and keep the request's
//! loaders coherent with the store. They never consult the authorization
//! gate; resolvers do that before calling in.
//!
//! # Cache Coherence
//!
//! Every mutation, after the store accepts it:
//!
//! 1. primes (create, update) or clears (delete) the entity's own loader key
//! 2. clears the aggregate loaders the entity feeds
//!    (questions-by-survey, responses-by-session, credentials-by-tenant,
//!    survey stats)
//!
//! so a later read in the same request never sees the pre-mutation value,
//! and a create followed by a read costs no extra store round trip.

mod analysis;
mod credential;
mod error;
mod identity;
mod question;
mod response;
mod session;
mod survey;
mod tenant;

pub use analysis::{AnalysisService, NewAnalysis};
pub use credential::{hash_key, AuthenticatedKey, CredentialService, IssuedCredential, NewCredential};
pub use error::ServiceError;
pub use identity::{IdentityPatch, IdentityService, NewIdentity};
pub use question::{NewQuestion, QuestionPatch, QuestionService};
pub use response::ResponseService;
pub use session::SessionService;
pub use survey::{NewSurvey, SurveyPatch, SurveyService};
pub use tenant::{TenantPatch, TenantService};

use crate::config::QuorumConfig;
use crate::loader::{Cached, Loaders};
use crate::store::{self, BackingStore, Filter};
use quorum_types::{EntityKey, Page, PageArgs};
use std::sync::Arc;

/// Shared handles every service works through.
#[derive(Clone)]
pub struct ServiceDeps {
    pub store: Arc<dyn BackingStore>,
    pub loaders: Arc<Loaders>,
    pub config: Arc<QuorumConfig>,
}

impl ServiceDeps {
    pub fn new(store: Arc<dyn BackingStore>, loaders: Arc<Loaders>, config: Arc<QuorumConfig>) -> Self {
        Self {
            store,
            loaders,
            config,
        }
    }

    /// Loads an entity through its request loader.
    pub async fn find<E: Cached>(&self, id: E::Id) -> Option<E> {
        self.loaders.of::<E>().load(id).await
    }

    /// Loads an entity or fails with `NotFound`.
    pub async fn require<E: Cached>(&self, id: E::Id) -> Result<E, ServiceError> {
        self.find::<E>(id)
            .await
            .ok_or_else(|| ServiceError::not_found::<E>(id))
    }

    /// Inserts and primes the loader.
    pub async fn insert<E: Cached>(&self, entity: E) -> Result<E, ServiceError> {
        store::insert(self.store.as_ref(), entity.clone()).await?;
        self.loaders.of::<E>().prime(entity.id(), entity.clone());
        Ok(entity)
    }

    /// Updates and primes the loader.
    pub async fn save<E: Cached>(&self, entity: E) -> Result<E, ServiceError> {
        store::update(self.store.as_ref(), entity.clone()).await?;
        self.loaders.of::<E>().prime(entity.id(), entity.clone());
        Ok(entity)
    }

    /// Deletes and clears the loader key. Returns `false` if nothing was
    /// deleted.
    pub async fn remove<E: Cached>(&self, id: E::Id) -> Result<bool, ServiceError> {
        let removed = store::delete::<E>(self.store.as_ref(), id).await?;
        self.loaders.of::<E>().clear(&id);
        tracing::debug!(kind = %E::KIND, id = %id.as_uuid(), removed, "entity deleted");
        Ok(removed)
    }

    /// Lists entities straight from the store and warms their loader.
    pub async fn list<E: Cached>(
        &self,
        filters: Vec<Filter>,
        page: Option<Page>,
    ) -> Result<Vec<E>, ServiceError> {
        let rows: Vec<E> = store::list(self.store.as_ref(), filters, page).await?;
        let loader = self.loaders.of::<E>();
        for row in &rows {
            loader.prime(row.id(), row.clone());
        }
        Ok(rows)
    }

    /// Normalises pagination arguments against configured bounds.
    #[must_use]
    pub fn page(&self, args: PageArgs) -> Page {
        self.config.pagination.page(args)
    }
}

/// Every service, bound to one request's loaders.
#[derive(Clone)]
pub struct Services {
    pub tenants: TenantService,
    pub identities: IdentityService,
    pub surveys: SurveyService,
    pub questions: QuestionService,
    pub sessions: SessionService,
    pub responses: ResponseService,
    pub credentials: CredentialService,
    pub analyses: AnalysisService,
}

impl Services {
    pub fn new(deps: ServiceDeps) -> Self {
        Self {
            tenants: TenantService::new(deps.clone()),
            identities: IdentityService::new(deps.clone()),
            surveys: SurveyService::new(deps.clone()),
            questions: QuestionService::new(deps.clone()),
            sessions: SessionService::new(deps.clone()),
            responses: ResponseService::new(deps.clone()),
            credentials: CredentialService::new(deps.clone()),
            analyses: AnalysisService::new(deps),
        }
    }
}

/// Trims `value` and rejects it if empty.
fn required_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid_field(field, format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
