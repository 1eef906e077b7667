//! Operation resolvers, one module per entity.
//!
//! Each module exposes `register`, which adds its queries and mutations to
//! an [`OperationRegistry`]. [`standard_registry`] registers them all.
//!
//! # Operations
//!
//! | Module | Queries | Mutations |
//! |--------|---------|-----------|
//! | tenant | `tenant`, `tenants` | `createTenant`, `updateTenant`, `deleteTenant` |
//! | identity | `me`, `identity`, `identities` | `createIdentity`, `updateIdentity`, `deleteIdentity`, `grantPermission`, `revokePermission` |
//! | survey | `survey`, `surveys` | `createSurvey`, `updateSurvey`, `duplicateSurvey`, `publishSurvey`, `pauseSurvey`, `archiveSurvey`, `deleteSurvey` |
//! | question | `question` | `addQuestion`, `updateQuestion`, `deleteQuestion`, `reorderQuestions` |
//! | session | `session`, `sessions` | `startSession`, `abandonSession`, `expireSessions` |
//! | response | `responses` | `submitResponse`, `editResponse` |
//! | credential | `credentials` | `issueCredential`, `revokeCredential` |
//! | analysis | `analysis`, `analyses`, `surveyStats` | `recordAnalysis` |
//!
//! # Includes
//!
//! Entity reads accept `include: [..]` naming nested fields. Nested fields
//! resolve through the request's loaders and inherit the parent's
//! authorization, except where a field has its own guard (for example
//! `Survey.stats` needs `analytics:read`). A field that fails renders as
//! `null` with an error whose path ends in the field name; its siblings and
//! parent are unaffected.

mod analysis;
mod credential;
mod identity;
mod question;
mod response;
mod session;
mod survey;
mod tenant;

use crate::context::RequestContext;
use crate::loader::Cached;
use crate::orchestrator::{to_value, OperationError, OperationRegistry, Outcome, RegistryError};
use crate::services::ServiceError;
use quorum_auth::AccessDenied;
use quorum_event::{MutationEvent, MutationKind};
use quorum_types::{Entity, Page, PageArgs};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;

/// Builds a registry holding every operation.
///
/// # Errors
///
/// [`RegistryError::Duplicate`] if two modules claim the same name.
pub fn standard_registry() -> Result<OperationRegistry, RegistryError> {
    let mut registry = OperationRegistry::new();
    tenant::register(&mut registry)?;
    identity::register(&mut registry)?;
    survey::register(&mut registry)?;
    question::register(&mut registry)?;
    session::register(&mut registry)?;
    response::register(&mut registry)?;
    credential::register(&mut registry)?;
    analysis::register(&mut registry)?;
    tracing::debug!(operations = registry.len(), "operation registry built");
    Ok(registry)
}

/// `{ "id": .., "include": [..] }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ByIdArgs<I> {
    pub id: I,
    #[serde(default)]
    pub include: Vec<String>,
}

/// `{ "limit": .., "offset": .. }`, flattened into list arguments.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl Paging {
    pub fn page(&self, ctx: &RequestContext) -> Page {
        ctx.page(PageArgs {
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// Applies the caller's tenant scope to an entity it read. An entity of
/// another tenant is reported exactly as if it did not exist.
pub(crate) fn visible<E: Entity>(ctx: &RequestContext, entity: E) -> Result<E, OperationError> {
    match ctx.gate.require_entity_scope(&entity) {
        Ok(()) => Ok(entity),
        Err(AccessDenied::TenantMismatch { .. } | AccessDenied::MissingPermission { .. }) => {
            Err(ServiceError::not_found::<E>(entity.id()).into())
        }
        Err(other) => Err(other.into()),
    }
}

/// Loads an entity through the request loaders and tenant-scopes it.
pub(crate) async fn load_visible<E: Cached>(ctx: &RequestContext, id: E::Id) -> Result<E, OperationError> {
    let entity = ctx
        .loaders
        .of::<E>()
        .load(id)
        .await
        .ok_or_else(|| ServiceError::not_found::<E>(id))?;
    visible(ctx, entity)
}

/// Event for a mutation of `entity`.
pub(crate) fn event<E: Entity>(kind: MutationKind, entity: &E) -> MutationEvent {
    MutationEvent::for_entity(kind, entity)
}

/// Rejects include names `entity` does not support.
pub(crate) fn check_includes(entity: &str, include: &[String], supported: &[&str]) -> Result<(), OperationError> {
    match include.iter().find(|name| !supported.contains(&name.as_str())) {
        Some(unknown) => Err(OperationError::invalid(
            "include",
            format!("{entity} has no field '{unknown}'"),
        )),
        None => Ok(()),
    }
}

/// A serialized entity plus the failures of its nested fields.
pub(crate) struct Expanded {
    pub data: Value,
    pub errors: Vec<(Vec<String>, OperationError)>,
}

impl Expanded {
    pub fn new<T: serde::Serialize>(value: &T) -> Result<Self, OperationError> {
        Ok(Self {
            data: to_value(value)?,
            errors: Vec::new(),
        })
    }

    /// Sets a nested field, or `null` plus an error if it failed.
    pub fn attach(&mut self, field: &str, result: Result<Value, OperationError>) {
        let value = result.unwrap_or_else(|err| {
            self.errors.push((vec![field.to_string()], err));
            Value::Null
        });
        if let Value::Object(map) = &mut self.data {
            map.insert(field.to_string(), value);
        }
    }

    pub fn into_outcome(self) -> Outcome {
        Outcome::from_value(self.data).with_field_errors(self.errors)
    }
}

/// Expands every item concurrently so their nested loads share batches.
pub(crate) async fn expand_all<T, F, Fut>(items: Vec<T>, expand: F) -> Result<Outcome, OperationError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<Expanded, OperationError>>,
{
    let expanded = futures::future::join_all(items.into_iter().map(expand)).await;
    let mut data = Vec::with_capacity(expanded.len());
    let mut errors = Vec::new();
    for (index, item) in expanded.into_iter().enumerate() {
        let item = item?;
        for (mut path, err) in item.errors {
            path.insert(0, index.to_string());
            errors.push((path, err));
        }
        data.push(item.data);
    }
    Ok(Outcome::from_value(Value::Array(data)).with_field_errors(errors))
}
