//! Batched, request-scoped entity loading.
//!
//! Resolvers that run concurrently within one request ask for entities one
//! key at a time. [`BatchLoader`] turns those scattered requests into one
//! store call per entity type:
//!
//! ```text
//! resolve Survey.tenant ──┐
//! resolve Survey.tenant ──┼──► loaders.tenants ──► fetch_many(tenant, [t1, t2])
//! resolve Survey.tenant ──┘        (one batch)
//! ```
//!
//! # Modules
//!
//! - [`BatchLoader`]: coalescing, caching loader over a [`BatchFn`]
//! - [`fetchers`]: store-backed fetch strategies (by id, by relation, stats)
//! - [`Loaders`]: the set created for each request

mod batch;
pub mod fetchers;
mod set;

pub use batch::{BatchFn, BatchLoader};
pub use fetchers::SurveyStats;
pub use set::{Cached, Loaders};
