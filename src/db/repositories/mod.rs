//! Repository pattern implementations
//!
//! A generic entity repository over the key-value store, and the flight and
//! passenger specializations built on it.

pub mod entity;
pub mod flight;
pub mod passenger;

pub use entity::{EntityRepository, PassThrough, RecordMapper};
pub use flight::{FlightFilters, FlightIndexes, FlightRecordMapper, FlightRepository};
pub use passenger::{PassengerRecordMapper, PassengerRepository};

use crate::db::store::StoreError;

/// Errors that can occur during repository operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    StoreOperation(#[from] StoreError),

    #[error("Invalid continuation token: {0}")]
    InvalidToken(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
