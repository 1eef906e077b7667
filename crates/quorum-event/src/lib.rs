//! Event types for Quorum.
//!
//! This crate defines what the realtime notification bus carries: the
//! [`Topic`] an event is published under, the [`MutationEvent`] itself, and
//! the [`SubscriptionFilter`] predicate subscribers register. The bus
//! implementations live in `quorum-runtime`.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  quorum-types   : IDs, model, Role, ErrorCode               │
//! │  quorum-auth    : RoleMatrix, AuthorizationGate             │
//! │  quorum-event   : Topic, MutationEvent, filters  ◄── HERE   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Event Flow
//!
//! ```text
//! Service mutation (create survey)
//!     │ Outcome { data, events: [MutationEvent] }
//!     ▼
//! ┌─────────────────┐
//! │  Orchestrator   │  publishes after the operation succeeds
//! └─────────────────┘
//!     │
//!     ▼
//! ┌─────────────────┐
//! │ NotificationBus │  fan-out, at-most-once
//! └─────────────────┘
//!     │ filter.matches(event)
//!     ├──────────────┬──────────────┐
//!     ▼              ▼              ▼
//!  Dashboard     Webhook relay   Analytics
//! ```
//!
//! # Permission Model
//!
//! Events carry no permission logic. Tenant isolation is enforced when a
//! subscription is opened: tenant-scoped callers always get a filter pinned
//! to their tenant.
//!
//! # Error Handling
//!
//! ```
//! use quorum_event::BusError;
//! use quorum_types::ErrorCode;
//!
//! let err = BusError::Transport("broker unreachable".into());
//! assert_eq!(err.code(), "BUS_TRANSPORT");
//! assert!(err.is_recoverable());
//! ```

mod error;
mod event;
mod filter;
mod topic;

pub use error::BusError;
pub use event::{MutationEvent, MutationKind};
pub use filter::SubscriptionFilter;
pub use topic::Topic;
