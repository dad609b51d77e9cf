//! Generic entity repository
//!
//! CRUD, forward-only pagination, secondary-index queries and chunked batch
//! operations for any [`Entity`] kept under a fixed partition key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::batch::{self, BatchReport, BATCH_GET_LIMIT, BATCH_WRITE_LIMIT};
use crate::db::index_query::{KeyCondition, SecondaryIndex, SecondaryIndexQuery, SortPredicate};
use crate::db::models::{Entity, PagedResult};
use crate::db::pagination;
use crate::db::repositories::RepositoryError;
use crate::db::store::{
    ItemKey, KeyValueStore, QueryRequest, Record, UpdateSpec, WriteOperation, ID_ATTR,
    PARTITION_KEY_ATTR,
};

/// Page size used when the caller gives none
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Conversion between an entity and its stored record.
///
/// Both hooks have defaults; implementors override the ones whose stored
/// shape differs from the entity's serde shape.
pub trait RecordMapper<T: Entity>: Send + Sync {
    /// Record to persist for `entity`. The repository stamps `pk` and `id`.
    fn to_storage_record(&self, entity: &T) -> Result<Record, RepositoryError> {
        serialize_entity(entity)
    }

    /// Entity for a stored record
    fn from_storage_record(&self, record: Record) -> Result<T, RepositoryError> {
        deserialize_entity(record)
    }
}

/// Mapper that stores entities exactly as they serialize
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<T: Entity> RecordMapper<T> for PassThrough {}

/// Serialize an entity into a record
pub fn serialize_entity<T: Serialize>(entity: &T) -> Result<Record, RepositoryError> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(RepositoryError::Serialization(format!(
            "entity must serialize to an object, got {}",
            other
        ))),
        Err(e) => Err(RepositoryError::Serialization(e.to_string())),
    }
}

/// Deserialize a stored record after dropping the storage-only keys
pub fn deserialize_entity<T: DeserializeOwned>(mut record: Record) -> Result<T, RepositoryError> {
    strip_storage_keys(&mut record);
    serde_json::from_value(Value::Object(record))
        .map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Remove `pk` and every `gsiNpk` / `gsiNsk` attribute
pub fn strip_storage_keys(record: &mut Record) {
    record.retain(|name, _| name != PARTITION_KEY_ATTR && !is_index_key(name));
}

fn is_index_key(name: &str) -> bool {
    name.strip_prefix("gsi")
        .and_then(|rest| rest.strip_suffix("pk").or_else(|| rest.strip_suffix("sk")))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn page_limit(count: usize) -> i32 {
    i32::try_from(count.max(1)).unwrap_or(i32::MAX)
}

/// Repository for one entity type under one partition
pub struct EntityRepository<T, M = PassThrough> {
    store: Arc<dyn KeyValueStore>,
    pk: String,
    mapper: M,
    _entity: PhantomData<fn() -> T>,
}

impl<T, M: Clone> Clone for EntityRepository<T, M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            pk: self.pk.clone(),
            mapper: self.mapper.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> EntityRepository<T, PassThrough> {
    /// Create a repository storing entities as they serialize
    pub fn new(store: Arc<dyn KeyValueStore>, pk: impl Into<String>) -> Self {
        Self::with_mapper(store, pk, PassThrough)
    }
}

impl<T: Entity, M: RecordMapper<T>> EntityRepository<T, M> {
    /// Create a repository with custom record mapping
    pub fn with_mapper(store: Arc<dyn KeyValueStore>, pk: impl Into<String>, mapper: M) -> Self {
        Self {
            store,
            pk: pk.into(),
            mapper,
            _entity: PhantomData,
        }
    }

    /// Partition key every entity of this repository is stored under
    pub fn pk(&self) -> &str {
        &self.pk
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    fn key(&self, id: &str) -> ItemKey {
        ItemKey::new(&self.pk, id)
    }

    fn to_record(&self, entity: &T) -> Result<Record, RepositoryError> {
        let mut record = self.mapper.to_storage_record(entity)?;
        record.insert(PARTITION_KEY_ATTR.to_string(), Value::String(self.pk.clone()));
        record.insert(ID_ATTR.to_string(), Value::String(entity.id().to_string()));
        Ok(record)
    }

    fn partition_query(&self, limit: Option<i32>, start: Option<Record>) -> QueryRequest {
        QueryRequest {
            index: None,
            key_condition: KeyCondition::partition(PARTITION_KEY_ATTR, &self.pk),
            limit,
            exclusive_start_key: start,
        }
    }

    /// Get an entity by id
    pub async fn get(&self, id: &str) -> Result<Option<T>, RepositoryError> {
        self.store
            .get_item(&self.key(id))
            .await?
            .map(|record| self.mapper.from_storage_record(record))
            .transpose()
    }

    /// Get every entity of the partition.
    ///
    /// Follows continuation keys page after page until the store reports no
    /// more; the number of pages is unbounded.
    pub async fn get_all(&self) -> Result<Vec<T>, RepositoryError> {
        let mut entities = Vec::new();
        let mut start = None;

        loop {
            let output = self.store.query(self.partition_query(None, start)).await?;
            for record in output.items {
                entities.push(self.mapper.from_storage_record(record)?);
            }

            match output.last_evaluated_key {
                Some(key) => start = Some(key),
                None => break,
            }
        }

        Ok(entities)
    }

    /// Get one page of the partition
    pub async fn get_paged(
        &self,
        count: Option<usize>,
        token: Option<&str>,
    ) -> Result<PagedResult<T>, RepositoryError> {
        let limit = page_limit(count.unwrap_or(DEFAULT_PAGE_SIZE));
        let start = pagination::decode(token)?;

        let output = self.store.query(self.partition_query(Some(limit), start)).await?;
        let next_token = pagination::encode(output.last_evaluated_key.as_ref())?;
        let items = output
            .items
            .into_iter()
            .map(|record| self.mapper.from_storage_record(record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PagedResult {
            count: items.len(),
            items,
            next_token,
        })
    }

    /// Store a new entity.
    ///
    /// The id is `id` when given, else the entity's own id, else a fresh
    /// UUID. Writes unconditionally.
    pub async fn create(&self, mut entity: T, id: Option<String>) -> Result<T, RepositoryError> {
        let id = id
            .filter(|id| !id.is_empty())
            .or_else(|| Some(entity.id().to_string()).filter(|id| !id.is_empty()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        entity.set_id(id);

        self.store.put_item(self.to_record(&entity)?).await?;

        tracing::debug!(pk = %self.pk, id = %entity.id(), "Created entity");

        Ok(entity)
    }

    /// Replace every field of an existing entity.
    ///
    /// Reads first and fails with `NotFound` without writing when the entity
    /// is missing. The read and the write are separate calls, so a concurrent
    /// writer in between is overwritten. An entity with nothing but its keys
    /// has nothing to assign and is not written.
    pub async fn update(
        &self,
        id: &str,
        entity: T,
        spec: Option<UpdateSpec>,
    ) -> Result<T, RepositoryError> {
        let key = self.key(id);
        if self.store.get_item(&key).await?.is_none() {
            return Err(RepositoryError::NotFound(id.to_string()));
        }

        let spec = match spec {
            Some(spec) => spec,
            None => UpdateSpec::set_all(&self.mapper.to_storage_record(&entity)?),
        };
        if spec.is_empty() {
            tracing::debug!(pk = %self.pk, id = %id, "Nothing to update");
            return Ok(entity);
        }
        self.store.update_item(&key, &spec).await?;

        tracing::debug!(pk = %self.pk, id = %id, "Updated entity");

        Ok(entity)
    }

    /// Delete an entity; true when the store acknowledged it
    pub async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        Ok(self.store.delete_item(&self.key(id)).await?)
    }

    /// Get many entities by id. Ids that do not exist are skipped.
    pub async fn batch_get(&self, ids: &[String]) -> Result<Vec<T>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<ItemKey> = ids.iter().map(|id| self.key(id)).collect();
        let store = &self.store;
        let pages = batch::dispatch(batch::chunk(&keys, BATCH_GET_LIMIT), |chunk| async move {
            store.batch_get_items(chunk).await
        })
        .await?;

        pages
            .into_iter()
            .flatten()
            .map(|record| self.mapper.from_storage_record(record))
            .collect()
    }

    /// Put many entities; entities without an id get a fresh UUID.
    ///
    /// Returns the number of entities written. Fails if any chunk fails.
    pub async fn batch_write(&self, entities: Vec<T>) -> Result<usize, RepositoryError> {
        if entities.is_empty() {
            return Ok(0);
        }

        let operations = self.put_operations(entities)?;
        let total = operations.len();
        self.dispatch_writes(operations).await?;

        Ok(total)
    }

    /// Delete many entities by id. Fails if any chunk fails.
    pub async fn batch_delete(&self, ids: &[String]) -> Result<usize, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.dispatch_writes(self.delete_operations(ids)).await?;

        Ok(ids.len())
    }

    /// Like [`batch_write`](Self::batch_write) but reports every chunk
    /// instead of failing on the first one.
    pub async fn batch_write_report(&self, entities: Vec<T>) -> Result<BatchReport, RepositoryError> {
        let operations = self.put_operations(entities)?;
        Ok(self.report_writes(operations).await)
    }

    /// Like [`batch_delete`](Self::batch_delete) but reports every chunk
    pub async fn batch_delete_report(&self, ids: &[String]) -> BatchReport {
        self.report_writes(self.delete_operations(ids)).await
    }

    /// Query a secondary index
    pub async fn get_by_index(
        &self,
        index: &SecondaryIndex,
        partition_value: &str,
        sort: Option<SortPredicate>,
        count: Option<usize>,
        token: Option<String>,
    ) -> Result<PagedResult<T>, RepositoryError> {
        SecondaryIndexQuery::new(index.clone(), partition_value)
            .with_sort(sort)
            .with_limit(count.map(page_limit))
            .with_continuation(token)
            .execute(self.store.as_ref(), |record| {
                self.mapper.from_storage_record(record)
            })
            .await
    }

    fn put_operations(&self, entities: Vec<T>) -> Result<Vec<WriteOperation>, RepositoryError> {
        entities
            .into_iter()
            .map(|mut entity| {
                if entity.id().is_empty() {
                    entity.set_id(Uuid::new_v4().to_string());
                }
                self.to_record(&entity).map(WriteOperation::Put)
            })
            .collect()
    }

    fn delete_operations(&self, ids: &[String]) -> Vec<WriteOperation> {
        ids.iter()
            .map(|id| WriteOperation::Delete(self.key(id)))
            .collect()
    }

    async fn dispatch_writes(&self, operations: Vec<WriteOperation>) -> Result<(), RepositoryError> {
        let store = &self.store;
        batch::dispatch(batch::chunk(&operations, BATCH_WRITE_LIMIT), |chunk| async move {
            store.batch_write_items(chunk).await
        })
        .await?;
        Ok(())
    }

    async fn report_writes(&self, operations: Vec<WriteOperation>) -> BatchReport {
        let store = &self.store;
        let outcomes =
            batch::dispatch_with_outcomes(batch::chunk(&operations, BATCH_WRITE_LIMIT), |chunk| async move {
                store.batch_write_items(chunk).await
            })
            .await;
        BatchReport { outcomes }
    }
}
