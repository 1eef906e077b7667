//! Core types for Quorum.
//!
//! This crate provides the identifiers, domain model and shared conventions
//! of the Quorum survey data-access core. It performs no I/O.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                              │
//! │  (No I/O, no async, pure data and rules)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  quorum-types   : IDs, model, Role, ErrorCode  ◄── HERE      │
//! │  quorum-auth    : RoleMatrix, AuthorizationGate             │
//! │  quorum-event   : Topic, MutationEvent, filters             │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Runtime Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  quorum-runtime : store, loader, services, orchestrator, bus │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  quorum-cli     : Command-line runner                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identifier Design
//!
//! Every entity is keyed by a UUID newtype ([`TenantId`], [`SurveyId`], ...).
//! All of them implement [`EntityKey`], which the backing store and the
//! batch loaders use to key their tables and caches.
//!
//! # Tenant Scoping
//!
//! Most entities belong to a [`Tenant`]. [`Entity::tenant_id`] exposes that
//! reference uniformly so the authorization layer can scope any entity
//! without knowing its concrete type.
//!
//! # Example
//!
//! ```
//! use quorum_types::{Role, Survey, SurveyStatus, TenantId};
//!
//! let survey = Survey::new(TenantId::new(), "Onboarding");
//! assert_eq!(survey.status, SurveyStatus::Draft);
//! assert!(Role::Analyst.at_least(Role::User));
//! ```

mod error;
mod id;
mod model;
mod page;
mod role;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{
    AnalysisId, CredentialId, EntityKey, EventId, IdentityId, QuestionId, RequestId, ResponseId,
    SessionId, SubscriberId, SurveyId, TenantId,
};
pub use model::{
    AnalysisResult, AnalysisTarget, AnswerPayload, AnswerRejected, Credential, Entity,
    EntityKind, Identity, IllegalTransition, Question, QuestionKind, Response, Session,
    SessionStatus, Survey, SurveySettings, SurveyStatus, Tenant, ValidationRules,
    API_KEY_PREFIX, DEFAULT_RATING_SCALE,
};
pub use page::{Page, PageArgs, DEFAULT_LIMIT, MAX_LIMIT};
pub use role::{Permission, PermissionSet, Role, UnknownName};

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn ids_are_random() {
        assert_ne!(SurveyId::new(), SurveyId::new());
        assert_ne!(TenantId::new().uuid(), TenantId::new().uuid());
    }

    #[test]
    fn id_display_has_prefix() {
        let uuid = Uuid::new_v4();
        let id = TenantId::from(uuid);
        assert_eq!(id.to_string(), format!("tenant:{uuid}"));
        assert_eq!(RequestId::from(uuid).to_string(), format!("req:{uuid}"));
    }

    #[test]
    fn id_parses_bare_and_prefixed() {
        let id = SessionId::new();
        let bare: SessionId = id.uuid().to_string().parse().unwrap();
        let prefixed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(bare, id);
        assert_eq!(prefixed, id);
        assert!("session:not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let id = QuestionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.uuid()));
        let back: QuestionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn entity_key_roundtrip() {
        let uuid = Uuid::new_v4();
        let id = CredentialId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn entity_tenant_scoping() {
        let tenant = Tenant::new("acme");
        assert_eq!(tenant.tenant_id(), Some(tenant.id));

        let survey = Survey::new(tenant.id, "Pulse");
        assert_eq!(Entity::tenant_id(&survey), Some(tenant.id));
        assert_eq!(Survey::KIND, EntityKind::Survey);

        let root = Identity::new("root@example.com", Role::SystemAdmin, None);
        assert_eq!(Entity::tenant_id(&root), None);
    }

    #[test]
    fn entity_kind_names() {
        assert_eq!(EntityKind::Analysis.to_string(), "analysis");
        let json = serde_json::to_string(&EntityKind::Credential).unwrap();
        assert_eq!(json, "\"credential\"");
    }

    #[test]
    fn identity_grants() {
        let id = Identity::new("a@example.com", Role::User, Some(TenantId::new()))
            .with_grant(Permission::AnalyticsRead);
        assert!(id.has_grant(Permission::AnalyticsRead));
        assert!(!id.has_grant(Permission::CrossTenant));
        assert!(id.active);
    }
}
