//! Serialized store contents.

use super::{BackingStore, Record, StoreError, StoredEntity};
use quorum_types::{
    AnalysisResult, Credential, Identity, Question, Response, Session, Survey, Tenant,
};
use serde::{Deserialize, Serialize};

/// Every table of a store as plain JSON-friendly lists.
///
/// Used to seed a store from a fixture file. Tables may be omitted.
///
/// ```json
/// {
///   "tenants": [{ "id": "…", "name": "Acme" }],
///   "identities": [{ "id": "…", "email": "ana@acme.io", "role": "USER", "tenantId": "…" }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub tenants: Vec<Tenant>,
    pub identities: Vec<Identity>,
    pub surveys: Vec<Survey>,
    pub questions: Vec<Question>,
    pub sessions: Vec<Session>,
    pub responses: Vec<Response>,
    pub credentials: Vec<Credential>,
    pub analyses: Vec<AnalysisResult>,
}

impl Snapshot {
    /// Records in parent-before-child order.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        fn records<E: StoredEntity>(items: Vec<E>) -> impl Iterator<Item = Record> {
            items.into_iter().map(StoredEntity::into_record)
        }

        records(self.tenants)
            .chain(records(self.identities))
            .chain(records(self.surveys))
            .chain(records(self.questions))
            .chain(records(self.sessions))
            .chain(records(self.responses))
            .chain(records(self.credentials))
            .chain(records(self.analyses))
            .collect()
    }

    /// Inserts every record into `store`.
    ///
    /// # Errors
    ///
    /// The first constraint violation; records before it stay inserted.
    pub async fn load_into(self, store: &dyn BackingStore) -> Result<usize, StoreError> {
        let records = self.into_records();
        let total = records.len();
        for record in records {
            store.insert(record).await?;
        }
        tracing::debug!(records = total, "snapshot loaded");
        Ok(total)
    }
}
