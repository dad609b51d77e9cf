//! Passenger endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::db::models::{Passenger, PassengerInput};
use crate::db::repositories::RepositoryError;
use crate::error::ApiError;
use crate::server::state::AppState;
use crate::services::{ServiceError, ValidatedResponse};

fn body(payload: Result<Json<PassengerInput>, JsonRejection>) -> Result<PassengerInput, ApiError> {
    payload
        .map(|Json(input)| input)
        .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
}

fn model(response: ValidatedResponse<Passenger>) -> Result<Passenger, ApiError> {
    match response.model {
        Some(passenger) if response.errors.is_empty() => Ok(passenger),
        _ => Err(ApiError::Validation(response.errors)),
    }
}

fn missing(id: &str) -> ApiError {
    ApiError::NotFound(format!("There is not a passenger for the id '{}'.", id))
}

/// POST /passengers
pub async fn create_passenger(
    State(state): State<AppState>,
    payload: Result<Json<PassengerInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let passenger = model(state.passenger_service.create(body(payload)?).await?)?;

    let location = format!("passenger/{}", passenger.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(passenger)))
}

/// GET /passengers/{id}
pub async fn get_passenger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Passenger>, ApiError> {
    let response = state.passenger_service.get(&id).await?;

    response.model.map(Json).ok_or_else(|| missing(&id))
}

/// PUT /passengers/{id}
pub async fn update_passenger(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PassengerInput>, JsonRejection>,
) -> Result<Json<Passenger>, ApiError> {
    let input = body(payload)?;

    match state.passenger_service.update(&id, input).await {
        Ok(response) => model(response).map(Json),
        Err(ServiceError::Repository(RepositoryError::NotFound(_))) => Err(missing(&id)),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /passengers/{id}
pub async fn delete_passenger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.passenger_service.delete(&id).await?;

    tracing::info!(id = %id, deleted = deleted, "Passenger deleted");

    Ok(StatusCode::NO_CONTENT)
}
