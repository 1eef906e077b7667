//! Resolver orchestrator.
//!
//! Turns an [`OperationBatch`] into a [`BatchResponse`]:
//!
//! ```text
//! OperationBatch
//!     │
//!     ▼
//! ContextBuilder::prepare  (token → gate; one loader set for the batch)
//!     │
//!     ▼
//! rate limiter ──(empty bucket)──► RATE_LIMITED for every operation
//!     │
//!     ▼
//! ContextBuilder::record_activity  (last_seen_at)
//!     │
//!     ├──────────────┬──────────────┐   operations run concurrently
//!     ▼              ▼              ▼
//!  Access::check  (gate, before arguments are looked at)
//!     ▼
//!  Handler::call  (parse typed args → services / loaders)
//!     ▼
//!  publish events (mutations, best-effort)
//!     │
//!     ▼
//! { data: {alias: value | null}, errors: [ApiError] }
//! ```
//!
//! A failing operation never fails its siblings. Operations of one batch
//! share their loaders, so sibling reads of the same entities coalesce into
//! single store fetches.

mod error;
mod handler;
mod rate_limit;
mod registry;
mod request;

pub use error::{ApiError, ErrorKind, OperationError, RegistryError};
pub use handler::{handler, parse_args, FnHandler, Handler, Outcome};
pub use rate_limit::RateLimiter;
pub use registry::{Access, OperationDef, OperationKind, OperationRegistry};
pub use request::{BatchResponse, OperationBatch, OperationCall};

pub(crate) use handler::to_value;

use crate::bus::{NotificationBus, Subscription};
use crate::context::{ContextBuilder, RequestContext, RequestMeta};
use quorum_event::{BusError, SubscriptionFilter};
use quorum_types::{ErrorCode, Permission, RequestId};
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

/// Executes operation batches against the registered operations.
pub struct Orchestrator {
    registry: Arc<OperationRegistry>,
    contexts: ContextBuilder,
    limiter: Option<RateLimiter>,
    bus: Option<Arc<dyn NotificationBus>>,
}

impl Orchestrator {
    /// Creates an orchestrator. Rate limiting follows the context
    /// builder's configuration.
    pub fn new(registry: OperationRegistry, contexts: ContextBuilder) -> Self {
        let rate_limit = &contexts.config().rate_limit;
        let limiter = rate_limit.enabled.then(|| RateLimiter::new(rate_limit.clone()));
        Self {
            registry: Arc::new(registry),
            contexts,
            limiter,
            bus: None,
        }
    }

    /// Publishes mutation events on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<dyn NotificationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Runs every operation of `batch` and assembles the response.
    pub async fn execute(&self, meta: RequestMeta, batch: OperationBatch) -> BatchResponse {
        let span = tracing::info_span!(
            "batch",
            request = %meta.request_id,
            operations = batch.operations.len()
        );
        self.execute_batch(meta, batch).instrument(span).await
    }

    async fn execute_batch(&self, meta: RequestMeta, batch: OperationBatch) -> BatchResponse {
        let request = meta.request_id;
        if let Some(key) = batch.duplicate_key() {
            let err = OperationError::invalid("alias", format!("'{key}' is used by more than one operation"));
            return BatchResponse {
                errors: vec![ApiError::render(&err, request, Vec::new())],
                ..BatchResponse::default()
            };
        }

        let ctx = self.contexts.prepare(meta).await;
        if let Some(limiter) = &self.limiter {
            let cost = u32::try_from(batch.operations.len()).unwrap_or(u32::MAX);
            if !limiter.try_acquire(&ctx.rate_key(), cost) {
                return Self::reject_all(&batch, &OperationError::RateLimited, request);
            }
        }
        self.contexts.record_activity(&ctx).await;

        let ctx = Arc::new(ctx);
        let runs = batch
            .operations
            .into_iter()
            .map(|call| self.run(Arc::clone(&ctx), call));
        let results = futures::future::join_all(runs).await;

        let mut response = BatchResponse::default();
        for (key, result) in results {
            match result {
                Ok(outcome) => {
                    for (mut path, err) in outcome.field_errors {
                        path.insert(0, key.clone());
                        response.errors.push(ApiError::render(&err, request, path));
                    }
                    response.data.insert(key, outcome.data);
                }
                Err(err) => {
                    response.errors.push(ApiError::render(&err, request, vec![key.clone()]));
                    response.data.insert(key, Value::Null);
                }
            }
        }
        response
    }

    fn reject_all(batch: &OperationBatch, err: &OperationError, request: RequestId) -> BatchResponse {
        let mut response = BatchResponse::default();
        for call in &batch.operations {
            response.data.insert(call.key().to_string(), Value::Null);
            response
                .errors
                .push(ApiError::render(err, request, vec![call.key().to_string()]));
        }
        response
    }

    async fn run(
        &self,
        ctx: Arc<RequestContext>,
        call: OperationCall,
    ) -> (String, Result<Outcome, OperationError>) {
        let key = call.key().to_string();
        let result = self.dispatch(&ctx, call).await;
        (key, result)
    }

    async fn dispatch(&self, ctx: &Arc<RequestContext>, call: OperationCall) -> Result<Outcome, OperationError> {
        let Some(def) = self.registry.get(&call.name) else {
            return Err(OperationError::UnknownOperation(call.name));
        };
        def.access.check(&ctx.gate)?;

        let outcome = def.handler.call(Arc::clone(ctx), call.args).await?;
        tracing::debug!(
            request = %ctx.request_id,
            operation = %def.name,
            kind = ?def.kind,
            events = outcome.events.len(),
            "operation completed"
        );
        if def.kind == OperationKind::Mutation {
            self.publish(ctx, &outcome).await;
        }
        Ok(outcome)
    }

    /// Publishes the outcome's events. The mutation already happened, so a
    /// delivery failure is only logged.
    async fn publish(&self, ctx: &RequestContext, outcome: &Outcome) {
        let Some(bus) = &self.bus else {
            return;
        };
        for event in &outcome.events {
            let event = event.clone().with_actor(ctx.gate.identity_id());
            let topic = event.topic.clone();
            if let Err(err) = bus.publish(event).await {
                tracing::warn!(
                    request = %ctx.request_id,
                    topic = %topic,
                    code = err.code(),
                    error = %err,
                    "event publish failed"
                );
            }
        }
    }

    /// Opens a notification subscription for the bearer of `meta`.
    ///
    /// Callers without `tenant:cross` always get their filter pinned to
    /// their own tenant; asking for another tenant is refused.
    ///
    /// # Errors
    ///
    /// Unauthenticated callers, a missing bus, or a filter naming a foreign
    /// tenant.
    pub async fn subscribe(
        &self,
        meta: RequestMeta,
        mut filter: SubscriptionFilter,
    ) -> Result<Subscription, ApiError> {
        let request = meta.request_id;
        let ctx = self.contexts.build(meta).await;
        let render = |err: OperationError| ApiError::render(&err, request, vec!["subscribe".into()]);

        ctx.gate.require_authenticated().map_err(|e| render(e.into()))?;
        if !ctx.gate.has_permission(Permission::CrossTenant) {
            let home = ctx.gate.tenant_id();
            match (filter.tenant, home) {
                (Some(requested), Some(home)) if requested != home => {
                    return Err(render(bus_error(BusError::InvalidFilter(
                        "filter names a tenant outside the caller's scope".into(),
                    ))));
                }
                (_, Some(home)) => filter.tenant = Some(home),
                (_, None) => {
                    return Err(render(
                        quorum_auth::AccessDenied::MissingPermission {
                            permission: Permission::CrossTenant,
                        }
                        .into(),
                    ))
                }
            }
        }

        let Some(bus) = &self.bus else {
            return Err(render(bus_error(BusError::Closed)));
        };
        bus.subscribe(filter).map_err(|err| render(bus_error(err)))
    }
}

fn bus_error(err: BusError) -> OperationError {
    use crate::services::ServiceError;
    match err {
        BusError::InvalidFilter(message) => OperationError::invalid("filter", message),
        other => OperationError::Service(ServiceError::Internal(other.to_string())),
    }
}
