//! Authorization primitives for Quorum.
//!
//! This crate turns a resolved [`Identity`](quorum_types::Identity) into
//! allow/deny decisions. It sits next to `quorum-event` in the dependency
//! graph and performs no I/O.
//!
//! # Permission Model
//!
//! ```text
//! Effective Permission = RoleMatrix(role) ∪ ExplicitGrants ∩ CredentialScope
//! ```
//!
//! | Layer | Type | Controls |
//! |-------|------|----------|
//! | [`RoleMatrix`] | Immutable config | What each tier may do |
//! | Explicit grants | `Identity::grants` | Per-identity additions |
//! | [`CredentialScope`] | Struct | Upper bound for API-key callers |
//! | [`AuthorizationGate`] | Struct | Evaluates all of the above per request |
//!
//! # Crate Architecture
//!
//! ```text
//! quorum-types  (IDs, Role, Permission, Identity)
//!     ↑              ↑
//! quorum-event   quorum-auth  ◄── THIS CRATE
//!     ↑              ↑
//!     quorum-runtime (ContextBuilder binds a gate per request)
//! ```
//!
//! # Design Principles
//!
//! - **Injected, not ambient**: the matrix is passed to every gate as
//!   `Arc<RoleMatrix>`; there is no global permission table
//! - **Pure checks**: gate methods depend only on identity and scope
//! - **Deny wins**: a credential scope can only remove permissions

pub mod error;
pub mod gate;
pub mod matrix;
pub mod scope;

pub use error::{AccessDenied, DenialKind};
pub use gate::AuthorizationGate;
pub use matrix::{MatrixError, RoleMatrix};
pub use scope::CredentialScope;
