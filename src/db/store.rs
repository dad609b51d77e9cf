//! Key-value store contract
//!
//! The repository layer talks to storage only through [`KeyValueStore`].
//! Records travel as JSON objects; each backend converts them to its own
//! wire representation.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::db::index_query::{KeyCondition, SecondaryIndex};

/// Store-native record shape (one item, attribute name -> value)
pub type Record = Map<String, Value>;

/// Attribute holding the partition key of every item
pub const PARTITION_KEY_ATTR: &str = "pk";

/// Attribute holding the identifier (sort key) of every item
pub const ID_ATTR: &str = "id";

/// Primary key of a stored item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub pk: String,
    pub id: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            id: id.into(),
        }
    }

    /// Key as a record (`{"pk": .., "id": ..}`)
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(PARTITION_KEY_ATTR.to_string(), Value::String(self.pk.clone()));
        record.insert(ID_ATTR.to_string(), Value::String(self.id.clone()));
        record
    }

    /// Extract the primary key from a full record
    pub fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            pk: record.get(PARTITION_KEY_ATTR)?.as_str()?.to_string(),
            id: record.get(ID_ATTR)?.as_str()?.to_string(),
        })
    }
}

/// Full-replace update description.
///
/// `set_expression` is a `SET #field = :field, ...` clause; names and values
/// are the placeholder mappings it references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec {
    pub set_expression: String,
    pub attribute_names: std::collections::HashMap<String, String>,
    pub attribute_values: Record,
}

impl UpdateSpec {
    /// Build a spec assigning every attribute of `record` except the primary key.
    ///
    /// Fields are emitted in name order so the expression is deterministic.
    pub fn set_all(record: &Record) -> Self {
        let mut fields: Vec<&String> = record
            .keys()
            .filter(|k| k.as_str() != PARTITION_KEY_ATTR && k.as_str() != ID_ATTR)
            .collect();
        fields.sort();

        let mut assignments = Vec::with_capacity(fields.len());
        let mut attribute_names = std::collections::HashMap::new();
        let mut attribute_values = Record::new();

        for field in fields {
            assignments.push(format!("#{field} = :{field}"));
            attribute_names.insert(format!("#{field}"), field.clone());
            attribute_values.insert(
                format!(":{field}"),
                record.get(field).cloned().unwrap_or(Value::Null),
            );
        }

        Self {
            set_expression: format!("SET {}", assignments.join(", ")),
            attribute_names,
            attribute_values,
        }
    }

    /// True when the spec assigns nothing. DynamoDB rejects such an update,
    /// so callers skip the store call instead.
    pub fn is_empty(&self) -> bool {
        self.attribute_names.is_empty() && self.attribute_values.is_empty()
    }

    /// Resolve the `SET` clause into `(attribute, value)` assignments.
    ///
    /// Only plain `#name = :value` assignments are understood.
    pub fn assignments(&self) -> Result<Vec<(String, Value)>, StoreError> {
        let clause = self
            .set_expression
            .trim()
            .strip_prefix("SET")
            .ok_or_else(|| StoreError::UnsupportedExpression(self.set_expression.clone()))?;

        clause
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (name, value) = part
                    .split_once('=')
                    .ok_or_else(|| StoreError::UnsupportedExpression(part.to_string()))?;
                let name = name.trim();
                let value = value.trim();
                let attribute = if name.starts_with('#') {
                    self.attribute_names
                        .get(name)
                        .cloned()
                        .ok_or_else(|| StoreError::UnsupportedExpression(part.to_string()))?
                } else {
                    name.to_string()
                };
                let value = self
                    .attribute_values
                    .get(value)
                    .cloned()
                    .ok_or_else(|| StoreError::UnsupportedExpression(part.to_string()))?;
                Ok((attribute, value))
            })
            .collect()
    }
}

/// Query against the table (no index) or one of its secondary indexes
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub index: Option<SecondaryIndex>,
    pub key_condition: KeyCondition,
    pub limit: Option<i32>,
    pub exclusive_start_key: Option<Record>,
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub items: Vec<Record>,
    pub last_evaluated_key: Option<Record>,
    pub count: usize,
    pub scanned_count: usize,
}

/// A single entry of a batched write
#[derive(Debug, Clone)]
pub enum WriteOperation {
    Put(Record),
    Delete(ItemKey),
}

/// Storage backend used by the repositories
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Record>, StoreError>;

    async fn put_item(&self, record: Record) -> Result<(), StoreError>;

    async fn update_item(&self, key: &ItemKey, spec: &UpdateSpec) -> Result<(), StoreError>;

    /// Returns whether the store acknowledged the delete
    async fn delete_item(&self, key: &ItemKey) -> Result<bool, StoreError>;

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, StoreError>;

    /// At most 100 keys per call
    async fn batch_get_items(&self, keys: Vec<ItemKey>) -> Result<Vec<Record>, StoreError>;

    /// At most 25 operations per call
    async fn batch_write_items(&self, operations: Vec<WriteOperation>) -> Result<(), StoreError>;

    async fn health_check(&self) -> bool {
        true
    }
}

/// Errors reported by a storage backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("{0} item(s) were left unprocessed by the store")]
    Unprocessed(usize),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_set_all_skips_primary_key() {
        let spec = UpdateSpec::set_all(&record(json!({
            "pk": "flight",
            "id": "f-1",
            "code": "NL4850UK",
            "airline": "X",
        })));

        assert_eq!(spec.set_expression, "SET #airline = :airline, #code = :code");
        assert_eq!(spec.attribute_names.get("#code").unwrap(), "code");
        assert_eq!(spec.attribute_values.get(":airline").unwrap(), "X");
        assert!(!spec.attribute_names.contains_key("#pk"));
        assert!(!spec.attribute_names.contains_key("#id"));
    }

    #[test]
    fn test_assignments_resolve_placeholders() {
        let spec = UpdateSpec::set_all(&record(json!({"code": "AB123", "state": null})));
        let assignments = spec.assignments().unwrap();

        assert_eq!(
            assignments,
            vec![
                ("code".to_string(), json!("AB123")),
                ("state".to_string(), Value::Null),
            ]
        );
    }

    #[test]
    fn test_assignments_reject_non_set_clause() {
        let spec = UpdateSpec {
            set_expression: "REMOVE #code".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            spec.assignments(),
            Err(StoreError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_item_key_record_round_trip() {
        let key = ItemKey::new("flight", "f-1");
        assert_eq!(ItemKey::from_record(&key.to_record()), Some(key));
    }
}
