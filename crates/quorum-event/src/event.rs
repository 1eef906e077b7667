//! Mutation events.

use crate::Topic;
use chrono::{DateTime, Utc};
use quorum_types::{Entity, EntityKey, EventId, IdentityId, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
    /// A lifecycle status changed (survey published, session completed, ...).
    StatusChanged,
    Revoked,
}

/// Notification that a service mutated an entity.
///
/// Events are fire-and-forget: the bus delivers them at most once and keeps
/// no history.
///
/// # Example
///
/// ```
/// use quorum_event::{MutationEvent, MutationKind, Topic};
/// use quorum_types::{Survey, TenantId};
///
/// let survey = Survey::new(TenantId::new(), "Pulse");
/// let event = MutationEvent::for_entity(MutationKind::Created, &survey);
/// assert_eq!(event.topic, Topic::Survey);
/// assert_eq!(event.tenant_id, Some(survey.tenant_id));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    pub id: EventId,
    pub topic: Topic,
    pub kind: MutationKind,
    pub entity_id: Uuid,
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub actor: Option<IdentityId>,
    #[serde(default)]
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl MutationEvent {
    #[must_use]
    pub fn new(topic: Topic, kind: MutationKind, entity_id: Uuid, tenant_id: Option<TenantId>) -> Self {
        Self {
            id: EventId::new(),
            topic,
            kind,
            entity_id,
            tenant_id,
            actor: None,
            payload: Value::Null,
            occurred_at: Utc::now(),
        }
    }

    /// Builds an event about `entity` with its topic, id and tenant.
    #[must_use]
    pub fn for_entity<E: Entity>(kind: MutationKind, entity: &E) -> Self {
        Self::new(
            Topic::for_kind(E::KIND),
            kind,
            entity.id().as_uuid(),
            entity.tenant_id(),
        )
    }

    #[must_use]
    pub fn with_actor(mut self, actor: Option<IdentityId>) -> Self {
        self.actor = actor;
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_types::{Session, SurveyId};

    #[test]
    fn entity_event_fields() {
        let tenant = TenantId::new();
        let session = Session::new(SurveyId::new(), tenant, None, 3);
        let actor = IdentityId::new();
        let event = MutationEvent::for_entity(MutationKind::StatusChanged, &session)
            .with_actor(Some(actor))
            .with_payload(serde_json::json!({"status": "COMPLETED"}));

        assert_eq!(event.topic, Topic::Session);
        assert_eq!(event.entity_id, session.id.uuid());
        assert_eq!(event.tenant_id, Some(tenant));
        assert_eq!(event.actor, Some(actor));
        assert_eq!(event.payload["status"], "COMPLETED");
    }

    #[test]
    fn event_wire_format() {
        let event = MutationEvent::new(Topic::Tenant, MutationKind::Deleted, Uuid::new_v4(), None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "DELETED");
        assert_eq!(json["topic"], "tenant");
        assert!(json.get("occurredAt").is_some());
    }
}
