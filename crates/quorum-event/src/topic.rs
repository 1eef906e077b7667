//! Event topics for subscription-based routing.
//!
//! Subscribers name the topics they care about and the bus delivers only
//! events published under those topics.
//!
//! # Built-in Topics
//!
//! One topic per entity kind (`tenant`, `survey`, `session`, ...), plus
//! `Extension` for events raised by collaborators outside the data layer.
//!
//! # Subscription Flow
//!
//! ```text
//! SubscriptionFilter::topics([Survey, Session])
//!     │
//!     ▼
//! NotificationBus::subscribe(filter)
//!     │
//!     ▼
//! MutationEvent { topic: Session, kind: Updated, .. }
//!     │
//!     ▼ (delivered only to matching subscribers)
//! Subscription::recv()
//! ```
//!
//! # Extension Topics
//!
//! ```
//! use quorum_event::Topic;
//!
//! let custom = Topic::extension("exports", "pdf-ready");
//! assert_eq!(custom.to_string(), "exports:pdf-ready");
//! ```

use quorum_types::EntityKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Tenant,
    Identity,
    Survey,
    Question,
    Session,
    Response,
    Credential,
    Analysis,

    /// Topic raised outside the data layer.
    Extension {
        namespace: String,
        kind: String,
    },
}

impl Topic {
    #[must_use]
    pub fn extension(namespace: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::Extension {
            namespace: namespace.into(),
            kind: kind.into(),
        }
    }

    /// The topic events about `kind` are published under.
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Tenant => Self::Tenant,
            EntityKind::Identity => Self::Identity,
            EntityKind::Survey => Self::Survey,
            EntityKind::Question => Self::Question,
            EntityKind::Session => Self::Session,
            EntityKind::Response => Self::Response,
            EntityKind::Credential => Self::Credential,
            EntityKind::Analysis => Self::Analysis,
        }
    }

    #[must_use]
    pub fn is_extension(&self) -> bool {
        matches!(self, Self::Extension { .. })
    }

    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Tenant => "tenant".to_string(),
            Self::Identity => "identity".to_string(),
            Self::Survey => "survey".to_string(),
            Self::Question => "question".to_string(),
            Self::Session => "session".to_string(),
            Self::Response => "response".to_string(),
            Self::Credential => "credential".to_string(),
            Self::Analysis => "analysis".to_string(),
            Self::Extension { namespace, kind } => format!("{namespace}:{kind}"),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
