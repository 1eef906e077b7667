//! Batch request and response shapes.
//!
//! ```json
//! {
//!   "operations": [
//!     { "alias": "pulse", "name": "survey", "args": { "id": "…", "include": ["questions"] } },
//!     { "name": "me" }
//!   ]
//! }
//! ```
//!
//! produces
//!
//! ```json
//! { "data": { "pulse": { … }, "me": { … } }, "errors": [] }
//! ```

use super::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One operation of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCall {
    /// Key of the result in `data`; defaults to the operation name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl OperationCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            alias: None,
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationBatch {
    pub operations: Vec<OperationCall>,
}

impl OperationBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(call: OperationCall) -> Self {
        Self {
            operations: vec![call],
        }
    }

    #[must_use]
    pub fn with(mut self, call: OperationCall) -> Self {
        self.operations.push(call);
        self
    }

    /// First key used by more than one operation.
    #[must_use]
    pub fn duplicate_key(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.operations
            .iter()
            .map(OperationCall::key)
            .find(|key| !seen.insert(*key))
    }
}

/// Response to a batch. Failed operations have `null` data and at least one
/// entry in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub data: Map<String, Value>,
    pub errors: Vec<ApiError>,
}

impl BatchResponse {
    /// Result of `key`, `None` if absent or `null`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    /// Errors whose path starts with `key`.
    pub fn errors_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ApiError> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.path.first().map(String::as_str) == Some(key))
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_default_to_name() {
        let batch = OperationBatch::new()
            .with(OperationCall::new("survey", Value::Null))
            .with(OperationCall::new("survey", Value::Null).alias("other"));
        assert_eq!(batch.duplicate_key(), None);

        let batch = batch.with(OperationCall::new("me", Value::Null).alias("survey"));
        assert_eq!(batch.duplicate_key(), Some("survey"));
    }

    #[test]
    fn batch_wire_format() {
        let batch: OperationBatch = serde_json::from_value(serde_json::json!({
            "operations": [
                {"alias": "a", "name": "survey", "args": {"id": "x"}},
                {"name": "me"}
            ]
        }))
        .unwrap();
        assert_eq!(batch.operations.len(), 2);
        assert_eq!(batch.operations[0].key(), "a");
        assert_eq!(batch.operations[1].args, Value::Null);
    }
}
