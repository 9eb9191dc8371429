use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use relseed_core::{Record, record_to_json};

use crate::error::StoreError;
use crate::gateway::StoreGateway;

/// In-memory record store.
///
/// Enforces the subset of store behavior the seeder reacts to: per-entity
/// write permission, unique fields and required fields. List failures can be
/// simulated per entity.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rules: StoreRules,
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreRules {
    forbidden: BTreeSet<String>,
    unique: BTreeMap<String, BTreeSet<String>>,
    required: BTreeMap<String, BTreeSet<String>>,
    failing_lists: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<String, Vec<Map<String, Value>>>,
    next_id: u64,
    create_calls: u64,
    patch_calls: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write to `entity` with [`StoreError::Forbidden`].
    pub fn with_forbidden(mut self, entity: &str) -> Self {
        self.rules.forbidden.insert(entity.to_string());
        self
    }

    pub fn with_unique(mut self, entity: &str, field: &str) -> Self {
        self.rules
            .unique
            .entry(entity.to_string())
            .or_default()
            .insert(field.to_string());
        self
    }

    pub fn with_required(mut self, entity: &str, field: &str) -> Self {
        self.rules
            .required
            .entry(entity.to_string())
            .or_default()
            .insert(field.to_string());
        self
    }

    /// Make `list_ids` for `entity` fail with a transport error.
    pub fn with_list_failure(mut self, entity: &str) -> Self {
        self.rules.failing_lists.insert(entity.to_string());
        self
    }

    /// Snapshot of the stored records of an entity, `id` included.
    pub fn records(&self, entity: &str) -> Vec<Value> {
        self.lock()
            .records
            .get(entity)
            .map(|records| records.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// One stored record by id.
    pub fn record(&self, entity: &str, id: &str) -> Option<Value> {
        self.lock()
            .records
            .get(entity)?
            .iter()
            .find(|record| record.get("id").and_then(Value::as_str) == Some(id))
            .cloned()
            .map(Value::Object)
    }

    /// Number of `create` calls received, successful or not.
    pub fn create_calls(&self) -> u64 {
        self.lock().create_calls
    }

    pub fn patch_calls(&self) -> u64 {
        self.lock().patch_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_writable(&self, entity: &str) -> Result<(), StoreError> {
        if self.rules.forbidden.contains(entity) {
            return Err(StoreError::Forbidden(format!(
                "writes to '{entity}' are not allowed"
            )));
        }
        Ok(())
    }

    fn check_required(&self, entity: &str, body: &Map<String, Value>) -> Result<(), StoreError> {
        let missing: Vec<String> = self
            .rules
            .required
            .get(entity)
            .into_iter()
            .flatten()
            .filter(|field| body.get(field.as_str()).is_none_or(is_blank))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::ValidationFailed {
                fields: missing,
                message: "Cannot be blank.".to_string(),
            })
        }
    }

    fn check_unique(
        &self,
        state: &StoreState,
        entity: &str,
        body: &Map<String, Value>,
        skip_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let Some(unique) = self.rules.unique.get(entity) else {
            return Ok(());
        };
        let existing = state.records.get(entity).map(Vec::as_slice).unwrap_or(&[]);

        let conflicting: Vec<String> = unique
            .iter()
            .filter(|field| {
                body.get(field.as_str())
                    .filter(|value| !is_blank(value))
                    .is_some_and(|value| {
                        existing.iter().any(|record| {
                            record.get("id").and_then(Value::as_str) != skip_id
                                && record.get(field.as_str()) == Some(value)
                        })
                    })
            })
            .cloned()
            .collect();

        if conflicting.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Conflict {
                fields: conflicting,
            })
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn into_object(fields: &Record) -> Map<String, Value> {
    match record_to_json(fields) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl StoreGateway for InMemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, entity: &str, fields: &Record) -> Result<String, StoreError> {
        let mut state = self.lock();
        state.create_calls += 1;
        self.check_writable(entity)?;

        let mut body = into_object(fields);
        self.check_required(entity, &body)?;
        self.check_unique(&state, entity, &body, None)?;

        state.next_id += 1;
        let id = format!("{entity}_{:06}", state.next_id);
        body.insert("id".to_string(), Value::String(id.clone()));
        state.records.entry(entity.to_string()).or_default().push(body);
        Ok(id)
    }

    async fn patch(&self, entity: &str, id: &str, fields: &Record) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.patch_calls += 1;
        self.check_writable(entity)?;

        let changes = into_object(fields);
        self.check_unique(&state, entity, &changes, Some(id))?;

        let record = state
            .records
            .get_mut(entity)
            .and_then(|records| {
                records
                    .iter_mut()
                    .find(|record| record.get("id").and_then(Value::as_str) == Some(id))
            })
            .ok_or_else(|| StoreError::RequestFailed {
                status: 404,
                message: format!("record '{entity}/{id}' not found"),
            })?;

        for (key, value) in changes {
            record.insert(key, value);
        }
        Ok(())
    }

    async fn list_ids(&self, entity: &str, page_size: usize) -> Result<Vec<String>, StoreError> {
        if self.rules.failing_lists.contains(entity) {
            return Err(StoreError::Transport(format!(
                "simulated list failure for '{entity}'"
            )));
        }
        Ok(self
            .lock()
            .records
            .get(entity)
            .into_iter()
            .flatten()
            .filter_map(|record| record.get("id").and_then(Value::as_str))
            .take(page_size)
            .map(str::to_string)
            .collect())
    }

    async fn count(&self, entity: &str) -> Result<u64, StoreError> {
        Ok(self
            .lock()
            .records
            .get(entity)
            .map(|records| records.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use relseed_core::FieldValue;

    use super::*;

    fn named(name: &str) -> Record {
        let mut record = Record::new();
        record.insert("name".to_string(), FieldValue::Text(name.to_string()));
        record
    }

    #[tokio::test]
    async fn creates_and_lists_records() {
        let store = InMemoryStore::new();
        let first = store.create("regions", &named("North")).await.expect("create");
        let second = store.create("regions", &named("South")).await.expect("create");

        assert_ne!(first, second);
        assert_eq!(
            store.list_ids("regions", 10).await.expect("list"),
            vec![first.clone(), second]
        );
        assert_eq!(store.list_ids("regions", 1).await.expect("list"), vec![first]);
        assert_eq!(store.count("regions").await.expect("count"), 2);
        assert_eq!(store.count("dealers").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn enforces_rules() {
        let store = InMemoryStore::new()
            .with_forbidden("users")
            .with_unique("regions", "name")
            .with_required("dealers", "tin")
            .with_list_failure("orders");

        assert!(matches!(
            store.create("users", &named("x")).await,
            Err(StoreError::Forbidden(_))
        ));

        store.create("regions", &named("North")).await.expect("create");
        assert_eq!(
            store.create("regions", &named("North")).await,
            Err(StoreError::Conflict {
                fields: vec!["name".to_string()]
            })
        );

        let err = store
            .create("dealers", &named("Acme"))
            .await
            .expect_err("tin is required");
        assert!(err.touches_field("tin"));

        assert!(matches!(
            store.list_ids("orders", 10).await,
            Err(StoreError::Transport(_))
        ));
        assert_eq!(store.create_calls(), 4);
    }

    #[tokio::test]
    async fn patch_merges_fields() {
        let store = InMemoryStore::new();
        let id = store.create("dealers", &named("Acme")).await.expect("create");

        let mut changes = Record::new();
        changes.insert("region".to_string(), FieldValue::Ref("regions_000009".to_string()));
        store.patch("dealers", &id, &changes).await.expect("patch");

        let record = store.record("dealers", &id).expect("record");
        assert_eq!(record["name"], "Acme");
        assert_eq!(record["region"], "regions_000009");

        assert!(matches!(
            store.patch("dealers", "missing", &changes).await,
            Err(StoreError::RequestFailed { status: 404, .. })
        ));
    }
}
