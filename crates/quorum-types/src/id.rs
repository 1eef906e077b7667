//! Identifier types for Quorum.
//!
//! Every persisted entity is keyed by a UUID-based newtype. The newtypes
//! keep a survey id from being passed where a session id is expected, and
//! all of them share the same shape:
//!
//! - `new()` generates a random UUID v4
//! - `uuid()` exposes the inner value (the backing store keys on it)
//! - `Display` renders `<prefix>:<uuid>` for logs
//! - serde (de)serializes as the bare UUID string

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use uuid::Uuid;

/// Common behaviour of entity identifiers.
///
/// The backing store keys every table on a bare UUID; this trait converts
/// between the typed id and that key.
pub trait EntityKey:
    Copy + Eq + Hash + Ord + Debug + Display + Send + Sync + 'static
{
    fn as_uuid(&self) -> Uuid;
    fn from_uuid(uuid: Uuid) -> Self;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new identifier with a random UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the inner UUID.
            #[must_use]
            pub fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl EntityKey for $name {
            fn as_uuid(&self) -> Uuid {
                self.0
            }

            fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            /// Accepts both the bare UUID and the prefixed display form.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                Uuid::parse_str(raw).map(Self)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`Tenant`](crate::Tenant), the isolation boundary.
    TenantId,
    "tenant"
);

entity_id!(
    /// Identifier of an [`Identity`](crate::Identity) (an authenticated caller).
    IdentityId,
    "identity"
);

entity_id!(
    /// Identifier of a [`Survey`](crate::Survey).
    SurveyId,
    "survey"
);

entity_id!(
    /// Identifier of a [`Question`](crate::Question).
    QuestionId,
    "question"
);

entity_id!(
    /// Identifier of a survey-taking [`Session`](crate::Session).
    SessionId,
    "session"
);

entity_id!(
    /// Identifier of a [`Response`](crate::Response) (one answer to one question).
    ResponseId,
    "response"
);

entity_id!(
    /// Identifier of an API [`Credential`](crate::Credential).
    CredentialId,
    "credential"
);

entity_id!(
    /// Identifier of an [`AnalysisResult`](crate::AnalysisResult).
    AnalysisId,
    "analysis"
);

entity_id!(
    /// Identifier of one inbound request.
    ///
    /// Used for log correlation only; it is never persisted.
    RequestId,
    "req"
);

entity_id!(
    /// Identifier of a mutation event published on the notification bus.
    EventId,
    "evt"
);

entity_id!(
    /// Identifier of a notification bus subscriber.
    SubscriberId,
    "sub"
);

// Tests are in lib.rs as integration tests for public API
