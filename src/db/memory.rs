//! In-memory store
//!
//! Mirrors the DynamoDB semantics the repositories rely on: items keyed by
//! `(pk, id)`, sparse secondary indexes, sort-ordered queries with a limit
//! and an exclusive start key. Data lives only as long as the store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::store::{
    ItemKey, KeyValueStore, QueryOutput, QueryRequest, Record, StoreError, UpdateSpec,
    WriteOperation, ID_ATTR, PARTITION_KEY_ATTR,
};

/// Thread-safe in-process [`KeyValueStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    items: Arc<RwLock<BTreeMap<ItemKey, Record>>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of items currently stored
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Raw stored record, bypassing any mapping
    pub async fn raw(&self, key: &ItemKey) -> Option<Record> {
        self.items.read().await.get(key).cloned()
    }

    /// Insert a record directly without counting a call
    pub async fn seed(&self, record: Record) {
        if let Some(key) = ItemKey::from_record(&record) {
            self.items.write().await.insert(key, record);
        }
    }

    fn count_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn attr_str<'a>(record: &'a Record, attr: &str) -> Option<&'a str> {
    record.get(attr).and_then(Value::as_str)
}

/// Ordering position of an item inside the queried table or index
fn position(record: &Record, sort_attr: &str) -> Option<(String, String, String)> {
    Some((
        attr_str(record, sort_attr)?.to_string(),
        attr_str(record, PARTITION_KEY_ATTR)?.to_string(),
        attr_str(record, ID_ATTR)?.to_string(),
    ))
}

/// Key the store hands back as the last evaluated key for `record`
fn evaluated_key(record: &Record, request: &QueryRequest) -> Record {
    let mut attrs = vec![PARTITION_KEY_ATTR, ID_ATTR];
    if let Some(index) = &request.index {
        attrs.push(index.partition_attr.as_str());
        attrs.push(index.sort_attr.as_str());
    }

    attrs
        .into_iter()
        .filter_map(|attr| record.get(attr).map(|v| (attr.to_string(), v.clone())))
        .collect()
}

fn missing_key(record: &Record) -> StoreError {
    StoreError::Conversion(format!(
        "record is missing its primary key: {}",
        Value::Object(record.clone())
    ))
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Record>, StoreError> {
        self.count_call();
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn put_item(&self, record: Record) -> Result<(), StoreError> {
        self.count_call();
        let key = ItemKey::from_record(&record).ok_or_else(|| missing_key(&record))?;
        self.items.write().await.insert(key, record);
        Ok(())
    }

    async fn update_item(&self, key: &ItemKey, spec: &UpdateSpec) -> Result<(), StoreError> {
        self.count_call();
        if spec.is_empty() {
            return Ok(());
        }
        let assignments = spec.assignments()?;

        let mut items = self.items.write().await;
        let item = items.entry(key.clone()).or_insert_with(|| key.to_record());
        for (attr, value) in assignments {
            item.insert(attr, value);
        }
        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<bool, StoreError> {
        self.count_call();
        self.items.write().await.remove(key);
        Ok(true)
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, StoreError> {
        self.count_call();
        let items = self.items.read().await;

        let condition = &request.key_condition;
        let sort_attr = request
            .index
            .as_ref()
            .map(|index| index.sort_attr.as_str())
            .unwrap_or(ID_ATTR);

        let mut matching: Vec<((String, String, String), &Record)> = items
            .values()
            .filter(|record| {
                attr_str(record, &condition.partition_attr) == Some(condition.partition_value.as_str())
            })
            .filter(|record| match &condition.sort {
                Some((attr, predicate)) => {
                    attr_str(record, attr).is_some_and(|value| predicate.matches(value))
                }
                None => true,
            })
            .filter_map(|record| position(record, sort_attr).map(|pos| (pos, record)))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        let start = request
            .exclusive_start_key
            .as_ref()
            .and_then(|key| position(key, sort_attr));
        let remaining: Vec<&Record> = matching
            .into_iter()
            .filter(|(pos, _)| start.as_ref().map_or(true, |start| pos > start))
            .map(|(_, record)| record)
            .collect();

        let limit = request
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        let page: Vec<Record> = remaining.iter().take(limit).map(|r| (*r).clone()).collect();

        let last_evaluated_key = if remaining.len() > page.len() {
            page.last().map(|record| evaluated_key(record, &request))
        } else {
            None
        };

        Ok(QueryOutput {
            count: page.len(),
            scanned_count: page.len(),
            items: page,
            last_evaluated_key,
        })
    }

    async fn batch_get_items(&self, keys: Vec<ItemKey>) -> Result<Vec<Record>, StoreError> {
        self.count_call();
        let items = self.items.read().await;
        Ok(keys.iter().filter_map(|key| items.get(key).cloned()).collect())
    }

    async fn batch_write_items(&self, operations: Vec<WriteOperation>) -> Result<(), StoreError> {
        self.count_call();
        let mut items = self.items.write().await;
        for operation in operations {
            match operation {
                WriteOperation::Put(record) => {
                    let key = ItemKey::from_record(&record).ok_or_else(|| missing_key(&record))?;
                    items.insert(key, record);
                }
                WriteOperation::Delete(key) => {
                    items.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::index_query::{KeyCondition, SecondaryIndex, SortPredicate};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn table_query(pk: &str, limit: Option<i32>, start: Option<Record>) -> QueryRequest {
        QueryRequest {
            index: None,
            key_condition: KeyCondition::partition(PARTITION_KEY_ATTR, pk),
            limit,
            exclusive_start_key: start,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryStore::new();
        let key = ItemKey::new("flight", "1");

        store
            .put_item(record(json!({"pk": "flight", "id": "1", "code": "AB123"})))
            .await
            .unwrap();
        assert_eq!(store.get_item(&key).await.unwrap().unwrap()["code"], "AB123");

        assert!(store.delete_item(&key).await.unwrap());
        assert!(store.get_item(&key).await.unwrap().is_none());
        assert_eq!(store.call_count(), 4);
    }

    #[tokio::test]
    async fn test_put_requires_primary_key() {
        let store = InMemoryStore::new();
        let result = store.put_item(record(json!({"code": "AB123"}))).await;
        assert!(matches!(result, Err(StoreError::Conversion(_))));
    }

    #[tokio::test]
    async fn test_query_pages_by_id() {
        let store = InMemoryStore::new();
        for id in ["c", "a", "b"] {
            store.seed(record(json!({"pk": "flight", "id": id}))).await;
        }
        store.seed(record(json!({"pk": "other", "id": "z"}))).await;

        let first = store.query(table_query("flight", Some(2), None)).await.unwrap();
        let ids: Vec<_> = first.items.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("b")]);
        let last = first.last_evaluated_key.unwrap();
        assert_eq!(last, record(json!({"pk": "flight", "id": "b"})));

        let second = store
            .query(table_query("flight", Some(2), Some(last)))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0]["id"], "c");
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_index_query_skips_items_without_index_keys() {
        let store = InMemoryStore::new();
        store
            .seed(record(json!({"pk": "flight", "id": "1", "gsi2pk": "flight#Awaiting", "gsi2sk": "2024-01-02"})))
            .await;
        store.seed(record(json!({"pk": "flight", "id": "2"}))).await;

        let index = SecondaryIndex::numbered(2);
        let output = store
            .query(QueryRequest {
                key_condition: KeyCondition::partition(&index.partition_attr, "flight#Awaiting")
                    .with_sort(&index.sort_attr, SortPredicate::AtMost("2024-01-05".to_string())),
                index: Some(index),
                limit: Some(1),
                exclusive_start_key: None,
            })
            .await
            .unwrap();

        assert_eq!(output.count, 1);
        assert_eq!(output.items[0]["id"], "1");
        assert!(output.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_update_applies_set_clause() {
        let store = InMemoryStore::new();
        let key = ItemKey::new("flight", "1");
        store
            .seed(record(json!({"pk": "flight", "id": "1", "code": "AB123", "airline": "X"})))
            .await;

        let spec = UpdateSpec::set_all(&record(json!({"code": "CD456"})));
        store.update_item(&key, &spec).await.unwrap();

        let stored = store.raw(&key).await.unwrap();
        assert_eq!(stored["code"], "CD456");
        assert_eq!(stored["airline"], "X");
    }

    #[tokio::test]
    async fn test_batch_write_puts_and_deletes() {
        let store = InMemoryStore::new();
        store.seed(record(json!({"pk": "flight", "id": "old"}))).await;

        store
            .batch_write_items(vec![
                WriteOperation::Put(record(json!({"pk": "flight", "id": "new"}))),
                WriteOperation::Delete(ItemKey::new("flight", "old")),
            ])
            .await
            .unwrap();

        let found = store
            .batch_get_items(vec![ItemKey::new("flight", "new"), ItemKey::new("flight", "old")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.len().await, 1);
    }
}
