//! Passenger repository
//!
//! Passengers live under the `passenger` partition. Each record also carries
//! the first index key pair (`id` by birthday).

use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

use crate::db::index_query::SecondaryIndex;
use crate::db::models::Passenger;
use crate::db::repositories::entity::{deserialize_entity, serialize_entity, EntityRepository, RecordMapper};
use crate::db::repositories::RepositoryError;
use crate::db::store::{KeyValueStore, Record};
use crate::utils::date::{from_iso, to_iso};

/// Partition key of every passenger
pub const PASSENGER_PARTITION: &str = "passenger";

/// Maps passengers to records with an ISO birthday and index keys
#[derive(Debug, Clone)]
pub struct PassengerRecordMapper {
    index: SecondaryIndex,
}

impl Default for PassengerRecordMapper {
    fn default() -> Self {
        Self {
            index: SecondaryIndex::numbered(1),
        }
    }
}

impl RecordMapper<Passenger> for PassengerRecordMapper {
    fn to_storage_record(&self, passenger: &Passenger) -> Result<Record, RepositoryError> {
        let mut record = serialize_entity(passenger)?;
        let birthday = Value::String(to_iso(&passenger.birthday));

        record.insert("birthday".to_string(), birthday.clone());
        record.insert(
            self.index.partition_attr.clone(),
            Value::String(passenger.id.clone()),
        );
        record.insert(self.index.sort_attr.clone(), birthday);

        Ok(record)
    }

    fn from_storage_record(&self, mut record: Record) -> Result<Passenger, RepositoryError> {
        if let Some(Value::String(text)) = record.get("birthday") {
            let birthday = from_iso(text).ok_or_else(|| {
                RepositoryError::Serialization(format!("invalid passenger birthday: {}", text))
            })?;
            record.insert("birthday".to_string(), Value::String(to_iso(&birthday)));
        }

        deserialize_entity(record)
    }
}

/// Repository for passengers; generic operations through `Deref`
#[derive(Clone)]
pub struct PassengerRepository {
    base: EntityRepository<Passenger, PassengerRecordMapper>,
}

impl PassengerRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            base: EntityRepository::with_mapper(
                store,
                PASSENGER_PARTITION,
                PassengerRecordMapper::default(),
            ),
        }
    }
}

impl Deref for PassengerRepository {
    type Target = EntityRepository<Passenger, PassengerRecordMapper>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
