//! Domain model.
//!
//! Plain data types for every persisted entity. They carry no I/O and no
//! permission logic; state-transition rules that are intrinsic to the data
//! (session lifecycle, survey lifecycle, answer validation, credential
//! revocation) live next to the types so every layer agrees on them.
//!
//! # Tenant Scoping
//!
//! Every entity reports the tenant it belongs to through
//! [`Entity::tenant_id`]. Entities without a tenant (system identities)
//! return `None`.

mod analysis;
mod credential;
mod identity;
mod question;
mod response;
mod session;
mod survey;
mod tenant;

pub use analysis::{AnalysisResult, AnalysisTarget};
pub use credential::{Credential, API_KEY_PREFIX};
pub use identity::Identity;
pub use question::{AnswerRejected, Question, QuestionKind, ValidationRules, DEFAULT_RATING_SCALE};
pub use response::{AnswerPayload, Response};
pub use session::{IllegalTransition, Session, SessionStatus};
pub use survey::{Survey, SurveySettings, SurveyStatus};
pub use tenant::Tenant;

use crate::{EntityKey, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity types known to the data layer.
///
/// Doubles as the table name in the backing store and as the `kind` in
/// not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tenant,
    Identity,
    Survey,
    Question,
    Session,
    Response,
    Credential,
    Analysis,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Identity => "identity",
            Self::Survey => "survey",
            Self::Question => "question",
            Self::Session => "session",
            Self::Response => "response",
            Self::Credential => "credential",
            Self::Analysis => "analysis",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by all persisted entities.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Typed identifier of this entity.
    type Id: EntityKey;

    const KIND: EntityKind;

    fn id(&self) -> Self::Id;

    /// Tenant this entity is scoped to, if any.
    fn tenant_id(&self) -> Option<TenantId>;
}
