//! Subscriber filter predicates.

use crate::{MutationEvent, MutationKind, Topic};
use quorum_types::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Predicate a subscriber registers with the bus.
///
/// Every populated field must match; an empty filter matches everything.
/// Tenant-scoped subscribers set [`tenant`](Self::tenant) so they never see
/// another tenant's events.
///
/// # Example
///
/// ```
/// use quorum_event::{MutationEvent, MutationKind, SubscriptionFilter, Topic};
/// use quorum_types::TenantId;
/// use uuid::Uuid;
///
/// let tenant = TenantId::new();
/// let filter = SubscriptionFilter::new()
///     .topic(Topic::Survey)
///     .tenant(tenant);
///
/// let hit = MutationEvent::new(Topic::Survey, MutationKind::Created, Uuid::new_v4(), Some(tenant));
/// let miss = MutationEvent::new(Topic::Survey, MutationKind::Created, Uuid::new_v4(), Some(TenantId::new()));
/// assert!(filter.matches(&hit));
/// assert!(!filter.matches(&miss));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionFilter {
    pub topics: HashSet<Topic>,
    pub kinds: HashSet<MutationKind>,
    pub tenant: Option<TenantId>,
    pub entity_id: Option<Uuid>,
}

impl SubscriptionFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn topic(mut self, topic: Topic) -> Self {
        self.topics.insert(topic);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: MutationKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    #[must_use]
    pub fn tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }

    #[must_use]
    pub fn entity(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    #[must_use]
    pub fn matches(&self, event: &MutationEvent) -> bool {
        (self.topics.is_empty() || self.topics.contains(&event.topic))
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && self.tenant.is_none_or(|t| event.tenant_id == Some(t))
            && self.entity_id.is_none_or(|id| event.entity_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(topic: Topic, kind: MutationKind, tenant: Option<TenantId>) -> MutationEvent {
        MutationEvent::new(topic, kind, Uuid::new_v4(), tenant)
    }

    #[test]
    fn empty_filter_matches_all() {
        let f = SubscriptionFilter::new();
        assert!(f.matches(&event(Topic::Survey, MutationKind::Created, None)));
        assert!(f.matches(&event(Topic::extension("a", "b"), MutationKind::Deleted, Some(TenantId::new()))));
    }

    #[test]
    fn topic_and_kind_conjunction() {
        let f = SubscriptionFilter::new()
            .topic(Topic::Session)
            .kind(MutationKind::StatusChanged);
        assert!(f.matches(&event(Topic::Session, MutationKind::StatusChanged, None)));
        assert!(!f.matches(&event(Topic::Session, MutationKind::Created, None)));
        assert!(!f.matches(&event(Topic::Survey, MutationKind::StatusChanged, None)));
    }

    #[test]
    fn tenant_filter_excludes_tenantless_events() {
        let t = TenantId::new();
        let f = SubscriptionFilter::new().tenant(t);
        assert!(f.matches(&event(Topic::Survey, MutationKind::Updated, Some(t))));
        assert!(!f.matches(&event(Topic::Identity, MutationKind::Updated, None)));
    }

    #[test]
    fn entity_filter() {
        let id = Uuid::new_v4();
        let f = SubscriptionFilter::new().entity(id);
        let mut e = event(Topic::Survey, MutationKind::Updated, None);
        assert!(!f.matches(&e));
        e.entity_id = id;
        assert!(f.matches(&e));
    }
}
