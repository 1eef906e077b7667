//! In-process backing store.
//!
//! Tables live in a `parking_lot::RwLock`ed map. Constraint checks run
//! under the write lock, so a write either applies completely or not at
//! all. Every call is counted in [`StoreStats`], which tests use to verify
//! batching.

use super::{BackingStore, Query, Record, StoreError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use quorum_types::EntityKind;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Call counters of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// `fetch_many` calls per table.
    pub fetch_calls: BTreeMap<EntityKind, u64>,
    /// Ids requested through `fetch_many`, per table.
    pub keys_fetched: BTreeMap<EntityKind, u64>,
    /// `query` and `count` calls per table.
    pub queries: BTreeMap<EntityKind, u64>,
    /// Successful inserts, updates and deletes.
    pub writes: u64,
}

impl StoreStats {
    #[must_use]
    pub fn fetches(&self, kind: EntityKind) -> u64 {
        self.fetch_calls.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_fetches(&self) -> u64 {
        self.fetch_calls.values().sum()
    }

    #[must_use]
    pub fn queries(&self, kind: EntityKind) -> u64 {
        self.queries.get(&kind).copied().unwrap_or(0)
    }

    /// Fetches plus queries across all tables.
    #[must_use]
    pub fn round_trips(&self) -> u64 {
        self.total_fetches() + self.queries.values().sum::<u64>()
    }
}

#[derive(Debug)]
struct Row {
    seq: u64,
    record: Record,
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<EntityKind, HashMap<Uuid, Row>>,
    next_seq: u64,
}

impl Tables {
    fn exists(&self, kind: EntityKind, id: Uuid) -> bool {
        self.rows.get(&kind).is_some_and(|t| t.contains_key(&id))
    }

    fn check_constraints(&self, record: &Record) -> Result<(), StoreError> {
        for reference in record.references() {
            if !self.exists(reference.kind, reference.id) {
                return Err(StoreError::foreign_key(reference.constraint));
            }
        }

        let unique = record.unique_keys();
        if unique.is_empty() {
            return Ok(());
        }
        let key = record.key();
        if let Some(table) = self.rows.get(&record.kind()) {
            for (id, row) in table {
                if *id == key {
                    continue;
                }
                let other = row.record.unique_keys();
                if let Some((constraint, _)) = unique.iter().find(|u| other.contains(u)) {
                    return Err(StoreError::unique(*constraint));
                }
            }
        }
        Ok(())
    }

    /// First constraint of a row that still points at `(kind, id)`.
    fn referenced_by(&self, kind: EntityKind, id: Uuid) -> Option<&'static str> {
        self.rows.values().flat_map(HashMap::values).find_map(|row| {
            row.record
                .references()
                .into_iter()
                .find(|r| r.kind == kind && r.id == id)
                .map(|r| r.constraint)
        })
    }
}

/// Thread-safe in-memory [`BackingStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    stats: Mutex<StoreStats>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the call counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = StoreStats::default();
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables.read().rows.get(&kind).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.read().rows.values().all(HashMap::is_empty)
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn fetch_many(&self, kind: EntityKind, ids: &[Uuid]) -> Result<Vec<Record>, StoreError> {
        {
            let mut stats = self.stats.lock();
            *stats.fetch_calls.entry(kind).or_default() += 1;
            *stats.keys_fetched.entry(kind).or_default() += ids.len() as u64;
        }
        let tables = self.tables.read();
        let Some(table) = tables.rows.get(&kind) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| table.get(id).map(|row| row.record.clone()))
            .collect())
    }

    async fn insert(&self, record: Record) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let kind = record.kind();
        let key = record.key();
        if tables.exists(kind, key) {
            return Err(StoreError::unique(format!("{kind}.id")));
        }
        tables.check_constraints(&record)?;
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables
            .rows
            .entry(kind)
            .or_default()
            .insert(key, Row { seq, record });
        self.stats.lock().writes += 1;
        tracing::trace!(%kind, %key, "row inserted");
        Ok(())
    }

    async fn update(&self, record: Record) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let kind = record.kind();
        let key = record.key();
        if !tables.exists(kind, key) {
            return Err(StoreError::Missing { kind, id: key });
        }
        tables.check_constraints(&record)?;
        if let Some(row) = tables.rows.get_mut(&kind).and_then(|t| t.get_mut(&key)) {
            row.record = record;
        }
        self.stats.lock().writes += 1;
        tracing::trace!(%kind, %key, "row updated");
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        if !tables.exists(kind, id) {
            return Ok(false);
        }
        if let Some(constraint) = tables.referenced_by(kind, id) {
            return Err(StoreError::foreign_key(constraint));
        }
        let removed = tables
            .rows
            .get_mut(&kind)
            .and_then(|t| t.remove(&id))
            .is_some();
        self.stats.lock().writes += 1;
        tracing::trace!(%kind, %id, "row deleted");
        Ok(removed)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        *self.stats.lock().queries.entry(query.kind).or_default() += 1;
        let tables = self.tables.read();
        let Some(table) = tables.rows.get(&query.kind) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&Row> = table.values().filter(|row| query.matches(&row.record)).collect();
        rows.sort_by_key(|row| (row.record.sort_key(), row.seq));
        let records = rows.into_iter().map(|row| row.record.clone());
        Ok(match query.page {
            Some(page) => page.apply(records.collect()),
            None => records.collect(),
        })
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        *self.stats.lock().queries.entry(query.kind).or_default() += 1;
        let tables = self.tables.read();
        Ok(tables.rows.get(&query.kind).map_or(0, |table| {
            table.values().filter(|row| query.matches(&row.record)).count() as u64
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, Filter};
    use quorum_types::{
        EntityKey, Identity, Page, PageArgs, Question, QuestionKind, Role, Survey, Tenant,
    };

    async fn seeded() -> (InMemoryStore, Tenant, Survey) {
        let db = InMemoryStore::new();
        let tenant = Tenant::new("Acme");
        let survey = Survey::new(tenant.id, "Pulse");
        store::insert(&db, tenant.clone()).await.unwrap();
        store::insert(&db, survey.clone()).await.unwrap();
        (db, tenant, survey)
    }

    #[tokio::test]
    async fn fetch_many_omits_missing_ids() {
        let (db, _, survey) = seeded().await;
        let rows = db
            .fetch_many(EntityKind::Survey, &[uuid::Uuid::new_v4(), survey.id.as_uuid()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key(), survey.id.as_uuid());

        let stats = db.stats();
        assert_eq!(stats.fetches(EntityKind::Survey), 1);
        assert_eq!(stats.keys_fetched[&EntityKind::Survey], 2);
    }

    #[tokio::test]
    async fn unique_email_is_case_insensitive() {
        let (db, tenant, _) = seeded().await;
        let first = Identity::new("ana@example.com", Role::User, Some(tenant.id));
        store::insert(&db, first).await.unwrap();

        let dup = Identity::new("ANA@example.com", Role::Viewer, Some(tenant.id));
        let err = store::insert(&db, dup).await.unwrap_err();
        assert_eq!(err, StoreError::unique("identity.email"));
    }

    #[tokio::test]
    async fn insert_requires_parent() {
        let db = InMemoryStore::new();
        let orphan = Survey::new(quorum_types::TenantId::new(), "Orphan");
        let err = store::insert(&db, orphan).await.unwrap_err();
        assert_eq!(err, StoreError::foreign_key("survey.tenant_id"));
        assert!(db.is_empty());
    }

    #[tokio::test]
    async fn delete_is_restricted_while_referenced() {
        let (db, tenant, survey) = seeded().await;
        let err = store::delete::<Tenant>(&db, tenant.id).await.unwrap_err();
        assert_eq!(err, StoreError::foreign_key("survey.tenant_id"));

        assert!(store::delete::<Survey>(&db, survey.id).await.unwrap());
        assert!(!store::delete::<Survey>(&db, survey.id).await.unwrap());
        assert!(store::delete::<Tenant>(&db, tenant.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_missing_row_fails() {
        let (db, tenant, _) = seeded().await;
        let ghost = Survey::new(tenant.id, "Ghost");
        let err = store::update(&db, ghost.clone()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Missing {
                kind: EntityKind::Survey,
                id: ghost.id.as_uuid()
            }
        );
    }

    #[tokio::test]
    async fn questions_list_by_position_and_page() {
        let (db, tenant, survey) = seeded().await;
        for (prompt, position) in [("c", 2), ("a", 0), ("b", 1)] {
            let q = Question::new(survey.id, tenant.id, QuestionKind::Text, prompt, position);
            store::insert(&db, q).await.unwrap();
        }

        let all: Vec<Question> = store::list(&db, vec![Filter::Survey(survey.id)], None)
            .await
            .unwrap();
        let prompts: Vec<&str> = all.iter().map(|q| q.prompt.as_str()).collect();
        assert_eq!(prompts, ["a", "b", "c"]);

        let page = Page::from_args(PageArgs {
            limit: Some(2),
            offset: Some(2),
        });
        let tail: Vec<Question> = store::list(&db, vec![Filter::Survey(survey.id)], Some(page))
            .await
            .unwrap();
        assert_eq!(tail.len(), 1);

        let past_end = Page::from_args(PageArgs {
            limit: None,
            offset: Some(10),
        });
        let empty: Vec<Question> =
            store::list(&db, vec![Filter::Survey(survey.id)], Some(past_end))
                .await
                .unwrap();
        assert!(empty.is_empty());

        let count = db
            .count(&Query::new(EntityKind::Question).filter(Filter::Survey(survey.id)))
            .await
            .unwrap();
        assert_eq!(count, 3);
    }
}
