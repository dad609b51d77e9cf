//! Check-in notifications
//!
//! Opens check-in for flights whose window has started by queueing one
//! message per flight, and moves a single flight into the `CheckIn` state.
//! Passengers of a checked-in flight are notified through a second queue.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;

use crate::db::models::FlightState;
use crate::db::repositories::{FlightRepository, PassengerRepository};
use crate::services::message_queue::{
    CheckInFlightMessage, CheckInPassengerMessage, MessageQueue, MessageQueueError,
};
use crate::services::ServiceError;

/// Service driving the check-in workflow
#[derive(Clone)]
pub struct NotificationService {
    flights: FlightRepository,
    passengers: PassengerRepository,
    queue: Arc<dyn MessageQueue>,
}

impl NotificationService {
    pub fn new(
        flights: FlightRepository,
        passengers: PassengerRepository,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            flights,
            passengers,
            queue,
        }
    }

    /// Queue a check-in message for every flight due at `as_of`.
    ///
    /// Messages are sent concurrently. Returns how many the queue accepted;
    /// individual send failures are logged and not counted. A missing queue
    /// configuration fails the whole run.
    pub async fn start_check_in(&self, as_of: DateTime<Utc>) -> Result<usize, ServiceError> {
        let flights = self.flights.get_flights_to_check_in(as_of).await?;

        let messages: Vec<CheckInFlightMessage> = flights
            .into_iter()
            .map(|flight| CheckInFlightMessage { flight_id: flight.id })
            .collect();

        let results = join_all(
            messages
                .iter()
                .map(|message| self.queue.send_check_in_flight_message(message)),
        )
        .await;

        let mut sent = 0;
        for (message, result) in messages.iter().zip(results) {
            match result {
                Ok(true) => sent += 1,
                Ok(false) => {
                    tracing::warn!(flight_id = %message.flight_id, "Check-in message was not accepted");
                }
                Err(e @ MessageQueueError::ConfigMissing(_)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(flight_id = %message.flight_id, error = %e, "Failed to send check-in message");
                }
            }
        }

        tracing::info!(
            due = messages.len(),
            sent = sent,
            "Check-in started"
        );

        Ok(sent)
    }

    /// Move a flight into the `CheckIn` state.
    ///
    /// Returns `false` when the flight does not exist.
    pub async fn check_in_flight(&self, flight_id: &str) -> Result<bool, ServiceError> {
        let Some(mut flight) = self.flights.get(flight_id).await? else {
            tracing::warn!(flight_id = %flight_id, "The flight is not available for check-in");
            return Ok(false);
        };

        flight.state = FlightState::CheckIn;
        self.flights.update(flight_id, flight, None).await?;

        tracing::info!(flight_id = %flight_id, "Flight checked in");

        Ok(true)
    }

    /// Queue one passenger message per id for a flight.
    ///
    /// Returns how many the queue accepted, 0 when the flight does not
    /// exist. Failures are handled as in [`start_check_in`](Self::start_check_in).
    pub async fn queue_passenger_check_in(
        &self,
        flight_id: &str,
        passenger_ids: &[String],
    ) -> Result<usize, ServiceError> {
        if self.flights.get(flight_id).await?.is_none() {
            tracing::warn!(flight_id = %flight_id, "The flight is not available for check-in");
            return Ok(0);
        }

        let messages: Vec<CheckInPassengerMessage> = passenger_ids
            .iter()
            .map(|passenger_id| CheckInPassengerMessage {
                flight_id: flight_id.to_string(),
                passenger_id: passenger_id.clone(),
            })
            .collect();

        let results = join_all(
            messages
                .iter()
                .map(|message| self.queue.send_check_in_passenger_message(message)),
        )
        .await;

        let mut sent = 0;
        for (message, result) in messages.iter().zip(results) {
            match result {
                Ok(true) => sent += 1,
                Ok(false) => {
                    tracing::warn!(passenger_id = %message.passenger_id, "Passenger message was not accepted");
                }
                Err(e @ MessageQueueError::ConfigMissing(_)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(passenger_id = %message.passenger_id, error = %e, "Failed to send passenger message");
                }
            }
        }

        tracing::info!(flight_id = %flight_id, due = messages.len(), sent = sent, "Passenger check-in queued");

        Ok(sent)
    }

    /// Notify a passenger that check-in is open for a flight.
    ///
    /// Returns `false` when either the flight or the passenger is unknown.
    pub async fn check_in_passenger(
        &self,
        flight_id: &str,
        passenger_id: &str,
    ) -> Result<bool, ServiceError> {
        let Some(flight) = self.flights.get(flight_id).await? else {
            tracing::warn!(flight_id = %flight_id, "The flight is not available for check-in");
            return Ok(false);
        };
        let Some(passenger) = self.passengers.get(passenger_id).await? else {
            tracing::warn!(passenger_id = %passenger_id, "Unknown passenger");
            return Ok(false);
        };

        // TODO: deliver the notification by email once a mail sender is configured
        tracing::info!(
            flight_id = %flight.id,
            flight_code = %flight.code,
            passenger_id = %passenger.id,
            email = %passenger.email,
            "The passenger was notified for the flight"
        );

        Ok(true)
    }
}
