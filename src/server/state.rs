//! Application state container
//!
//! This module defines the shared application state that is passed
//! to all request handlers via Axum's state extraction.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{build_aws_config, AwsConfigBuilder, Settings, StoreBackend};
use crate::db::{DynamoDbStore, InMemoryStore, KeyValueStore};
use crate::db::repositories::{FlightIndexes, FlightRepository, PassengerRepository};
use crate::services::{
    FlightService, MessageQueue, NotificationService, PassengerService, SqsMessageQueue,
};

/// Shared application state
///
/// Cheap to clone; every service shares the same store handle.
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Backing key-value store
    pub store: Arc<dyn KeyValueStore>,

    pub flight_service: FlightService,

    pub passenger_service: PassengerService,

    pub notifications: NotificationService,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Create the application state from settings.
    ///
    /// Builds the AWS clients once and wires the store and queue into the
    /// services. With the memory backend no DynamoDB client is created.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        tracing::debug!(
            region = %settings.aws_region,
            backend = %settings.store_backend,
            dynamodb_endpoint = ?settings.dynamodb_endpoint_url,
            sqs_endpoint = ?settings.sqs_endpoint_url,
            "Initializing AWS SDK clients"
        );

        let sdk_config = build_aws_config(&settings).await;
        let builder = AwsConfigBuilder::new(&settings);

        let store: Arc<dyn KeyValueStore> = match settings.store_backend {
            StoreBackend::Dynamodb => {
                tracing::debug!(table = %settings.table_name, "Creating DynamoDB store");
                let client = builder.build_dynamodb_client(&sdk_config);
                Arc::new(DynamoDbStore::new(client, settings.table_name.clone()))
            }
            StoreBackend::Memory => {
                tracing::info!("Using the in-memory store, data is lost on exit");
                Arc::new(InMemoryStore::new())
            }
        };

        let queue: Arc<dyn MessageQueue> = Arc::new(SqsMessageQueue::new(
            builder.build_sqs_client(&sdk_config),
            settings.check_in_flight_queue_url.clone(),
            settings.check_in_passenger_queue_url.clone(),
        ));

        let state = Self::with_components(settings, store, queue);

        tracing::info!("Application state initialized successfully");

        Ok(state)
    }

    /// Assemble the state around an existing store and queue
    pub fn with_components(
        settings: Settings,
        store: Arc<dyn KeyValueStore>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        let indexes = FlightIndexes::named(settings.gsi1_name.clone(), settings.gsi2_name.clone());
        let flights = FlightRepository::new(store.clone(), indexes);
        let passengers = PassengerRepository::new(store.clone());

        Self {
            settings: Arc::new(settings),
            store,
            flight_service: FlightService::new(flights.clone()),
            passenger_service: PassengerService::new(passengers.clone()),
            notifications: NotificationService::new(flights, passengers, queue),
            start_time: Instant::now(),
        }
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
