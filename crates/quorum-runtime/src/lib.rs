//! Quorum Runtime - request orchestration and data access.
//!
//! This crate turns a batch of named operations into store reads and
//! writes for one caller, under that caller's tenant and permissions.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Model Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  quorum-types : IDs, entities, roles, ErrorCode             │
//! │  quorum-auth  : RoleMatrix, AuthorizationGate               │
//! │  quorum-event : MutationEvent, Topic, SubscriptionFilter    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  orchestrator/ : batches, registry, rate limit, rendering   │
//! │  resolvers/    : one module of operations per entity        │
//! │  services/     : validation and state transitions           │
//! │  loader/       : per-request batching and caching           │
//! │  store/        : BackingStore trait, in-memory store        │
//! │  bus/          : NotificationBus, local and bridged         │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! │  (quorum-cli)                                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! ```text
//! RequestMeta + OperationBatch
//!     │
//!     ▼
//! Orchestrator::execute
//!     ├── ContextBuilder       (token → AuthorizationGate, fresh Loaders)
//!     ├── RateLimiter          (per resolved caller; cost = operations in the batch)
//!     └── per operation, concurrently:
//!           Access::check → Handler::call → services → loaders → store
//!                                         └─► NotificationBus (mutations)
//!     │
//!     ▼
//! BatchResponse { data, errors }
//! ```
//!
//! # Modules
//!
//! ## [`orchestrator`]
//!
//! - [`Orchestrator`](orchestrator::Orchestrator): executes batches
//! - [`OperationRegistry`](orchestrator::OperationRegistry): name → handler
//! - [`ApiError`](orchestrator::ApiError): the rendered error shape
//!
//! ## [`loader`]
//!
//! - [`BatchLoader`](loader::BatchLoader): coalesces concurrent loads
//! - [`Loaders`](loader::Loaders): one loader per entity, per request
//!
//! ## [`store`]
//!
//! - [`BackingStore`](store::BackingStore): persistence seam
//! - [`InMemoryStore`](store::InMemoryStore): reference backend
//! - [`Snapshot`](store::Snapshot): seed data
//!
//! ## [`bus`]
//!
//! - [`NotificationBus`](bus::NotificationBus): publish/subscribe seam
//! - [`LocalBus`](bus::LocalBus), [`BridgedBus`](bus::BridgedBus)
//!
//! ## [`config`]
//!
//! - [`QuorumConfig`](config::QuorumConfig), [`ConfigLoader`](config::ConfigLoader)

pub mod bus;
pub mod config;
pub mod context;
pub mod loader;
pub mod orchestrator;
pub mod resolvers;
pub mod services;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use context::{ContextBuilder, IdentityVerifier, RequestContext, RequestMeta, StaticVerifier};
pub use orchestrator::{BatchResponse, OperationBatch, OperationCall, Orchestrator};
pub use resolvers::standard_registry;
