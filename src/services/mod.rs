//! Services module
//!
//! Contains business logic and external service integrations.

pub mod flight;
pub mod message_queue;
pub mod notification;
pub mod passenger;

pub use flight::{FlightService, ValidatedResponse};
pub use message_queue::{
    CheckInFlightMessage, CheckInPassengerMessage, MessageQueue, MessageQueueError, SqsMessageQueue,
};
pub use notification::NotificationService;
pub use passenger::PassengerService;

use crate::db::repositories::RepositoryError;

/// Errors surfaced by the application services
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    MessageQueue(#[from] MessageQueueError),
}
