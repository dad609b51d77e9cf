//! Check-in endpoints
//!
//! `POST /check-in/start` is what the scheduler calls; it queues a message for
//! every flight whose check-in window has opened. `POST /check-in/flights/{id}`
//! is the queue consumer's entry point for a single flight. The passenger
//! routes queue and consume the per-passenger notifications the same way.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::state::AppState;
use crate::utils::from_iso;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckInQuery {
    /// Reference time, defaults to now
    pub as_of: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCheckInResponse {
    pub sent: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInFlightResponse {
    pub checked_in: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePassengersRequest {
    pub passenger_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckInPassengerResponse {
    pub notified: bool,
}

/// POST /check-in/start
pub async fn start_check_in(
    State(state): State<AppState>,
    Query(query): Query<StartCheckInQuery>,
) -> Result<Json<StartCheckInResponse>, ApiError> {
    let as_of = match query.as_of.as_deref() {
        Some(value) => from_iso(value).ok_or_else(|| {
            ApiError::InvalidRequest("The asOf query parameter must be a valid date.".to_string())
        })?,
        None => Utc::now(),
    };

    let sent = state.notifications.start_check_in(as_of).await?;

    tracing::info!(
        as_of = %as_of,
        sent = sent,
        "A total of {} message(s) were sent to start check-in",
        sent
    );

    Ok(Json(StartCheckInResponse { sent }))
}

/// POST /check-in/flights/{id}
pub async fn check_in_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CheckInFlightResponse>, ApiError> {
    let checked_in = state.notifications.check_in_flight(&id).await?;

    Ok(Json(CheckInFlightResponse { checked_in }))
}

/// POST /check-in/flights/{id}/passengers
pub async fn queue_passengers(
    State(state): State<AppState>,
    Path(flight_id): Path<String>,
    payload: Result<Json<QueuePassengersRequest>, JsonRejection>,
) -> Result<Json<StartCheckInResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;

    let sent = state
        .notifications
        .queue_passenger_check_in(&flight_id, &request.passenger_ids)
        .await?;

    Ok(Json(StartCheckInResponse { sent }))
}

/// POST /check-in/flights/{flight_id}/passengers/{passenger_id}
pub async fn check_in_passenger(
    State(state): State<AppState>,
    Path((flight_id, passenger_id)): Path<(String, String)>,
) -> Result<Json<CheckInPassengerResponse>, ApiError> {
    let notified = state
        .notifications
        .check_in_passenger(&flight_id, &passenger_id)
        .await?;

    if notified {
        tracing::info!(
            flight_id = %flight_id,
            passenger_id = %passenger_id,
            "The passenger {} was notified for the flight {}",
            passenger_id,
            flight_id
        );
    }

    Ok(Json(CheckInPassengerResponse { notified }))
}
