//! Flight endpoints
//!
//! CRUD over `/flights` plus the route listing used by the booking front end.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::db::models::{Flight, FlightInput, PagedResult};
use crate::db::repositories::entity::DEFAULT_PAGE_SIZE;
use crate::db::repositories::{FlightFilters, RepositoryError};
use crate::error::ApiError;
use crate::server::state::AppState;
use crate::services::{ServiceError, ValidatedResponse};
use crate::utils::from_iso;

/// Query string accepted by `GET /flights`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFlightsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub count: Option<String>,
    pub next_token: Option<String>,
}

impl ListFlightsQuery {
    /// Check the required parameters and turn them into repository filters
    pub fn into_filters(self) -> Result<(FlightFilters, Option<usize>, Option<String>), ApiError> {
        let start_date = required_date(self.start_date, "startDate")?;
        let end_date = required_date(self.end_date, "endDate")?;
        let from = required(self.from, "The from airport query parameter is required.")?;
        let to = required(self.to, "The to airport query parameter is required.")?;

        let count = match self.count {
            Some(count) => count
                .parse::<usize>()
                .ok()
                .filter(|count| *count > 0)
                .ok_or_else(|| {
                    ApiError::InvalidRequest(
                        "The count query parameter must be a positive number.".to_string(),
                    )
                })?,
            None => DEFAULT_PAGE_SIZE,
        };

        let filters = FlightFilters {
            start_date: Some(start_date),
            end_date: Some(end_date),
            from: Some(from),
            to: Some(to),
        };

        Ok((filters, Some(count), self.next_token.filter(|t| !t.is_empty())))
    }
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest(message.to_string()))
}

fn required_date(value: Option<String>, name: &str) -> Result<chrono::DateTime<chrono::Utc>, ApiError> {
    let value = required(value, &format!("The {} query parameter is required.", name))?;
    from_iso(&value).ok_or_else(|| {
        ApiError::InvalidRequest(format!("The {} query parameter must be a valid date.", name))
    })
}

fn body(payload: Result<Json<FlightInput>, JsonRejection>) -> Result<FlightInput, ApiError> {
    payload
        .map(|Json(input)| input)
        .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
}

fn model(response: ValidatedResponse<Flight>) -> Result<Flight, ApiError> {
    match response.model {
        Some(flight) if response.errors.is_empty() => Ok(flight),
        _ => Err(ApiError::Validation(response.errors)),
    }
}

fn missing(id: &str) -> ApiError {
    ApiError::NotFound(format!("There is not a flight for the id '{}'.", id))
}

/// POST /flights
pub async fn create_flight(
    State(state): State<AppState>,
    payload: Result<Json<FlightInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = body(payload)?;
    let flight = model(state.flight_service.create(input).await?)?;

    let location = format!("flight/{}", flight.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(flight)))
}

/// GET /flights
pub async fn list_flights(
    State(state): State<AppState>,
    Query(query): Query<ListFlightsQuery>,
) -> Result<Json<PagedResult<Flight>>, ApiError> {
    let (filters, count, token) = query.into_filters()?;

    tracing::debug!(
        from = ?filters.from,
        to = ?filters.to,
        count = ?count,
        has_token = token.is_some(),
        "Listing flights"
    );

    let page = state.flight_service.get_paged(&filters, count, token).await?;

    Ok(Json(page))
}

/// GET /flights/{id}
pub async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Flight>, ApiError> {
    let response = state.flight_service.get(&id).await?;

    response.model.map(Json).ok_or_else(|| missing(&id))
}

/// PUT /flights/{id}
pub async fn update_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<FlightInput>, JsonRejection>,
) -> Result<Json<Flight>, ApiError> {
    let input = body(payload)?;

    match state.flight_service.update(&id, input).await {
        Ok(response) => model(response).map(Json),
        Err(ServiceError::Repository(RepositoryError::NotFound(_))) => Err(missing(&id)),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /flights/{id}
pub async fn delete_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.flight_service.delete(&id).await?;

    tracing::info!(id = %id, deleted = deleted, "Flight deleted");

    Ok(StatusCode::NO_CONTENT)
}
