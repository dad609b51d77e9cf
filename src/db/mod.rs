//! Database module
//!
//! The key-value store contract, its DynamoDB and in-memory backends, and the
//! repositories built on top of them.

pub mod batch;
pub mod conversions;
pub mod dynamodb;
pub mod index_query;
pub mod memory;
pub mod models;
pub mod pagination;
pub mod repositories;
pub mod store;

pub use dynamodb::DynamoDbStore;
pub use index_query::{KeyCondition, SecondaryIndex, SecondaryIndexQuery, SortPredicate};
pub use memory::InMemoryStore;
pub use models::{Entity, Flight, FlightInput, FlightState, PagedResult, Passenger, PassengerInput};
pub use repositories::{EntityRepository, FlightRepository, PassengerRepository, RepositoryError};
pub use store::{ItemKey, KeyValueStore, Record, StoreError, UpdateSpec};
