//! Flight service
//!
//! Validates caller input and drives the flight repository. Validation
//! problems come back as data in a [`ValidatedResponse`]; only storage
//! failures are errors.

use serde::Serialize;
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::db::models::{Flight, FlightInput, PagedResult};
use crate::db::repositories::{FlightFilters, FlightRepository};
use crate::services::ServiceError;

/// Result of an operation that validates its input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedResponse<T> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<T>,
}

impl<T> ValidatedResponse<T> {
    pub fn ok(model: T) -> Self {
        Self {
            errors: Vec::new(),
            model: Some(model),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            errors,
            model: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Human-readable messages for every violation, ordered by field name
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut messages = Vec::new();
    for (field, field_errors) in fields {
        for error in field_errors.iter() {
            messages.push(describe(&field, error));
        }
    }
    messages
}

fn describe(field: &str, error: &ValidationError) -> String {
    match &*error.code {
        "required" => format!("\"{field}\" is required"),
        "length" => {
            let len = error
                .params
                .get("value")
                .and_then(Value::as_str)
                .map(|v| v.chars().count() as u64);
            let min = error.params.get("min").and_then(Value::as_u64);
            let max = error.params.get("max").and_then(Value::as_u64);

            match (len, min, max) {
                (Some(len), Some(min), _) if len < min => {
                    format!("\"{field}\" length must be at least {min} characters long")
                }
                (_, _, Some(max)) => {
                    format!("\"{field}\" length must be less than or equal to {max} characters long")
                }
                _ => format!("\"{field}\" length is invalid"),
            }
        }
        "date" => format!("\"{field}\" must be a valid date"),
        "email" => format!("\"{field}\" must be a valid email"),
        "alphanum" => format!("\"{field}\" must only contain alpha-numeric characters"),
        code => format!("\"{field}\" is invalid ({code})"),
    }
}

fn validate(input: &FlightInput) -> Option<Vec<String>> {
    input.validate().err().map(|errors| validation_messages(&errors))
}

/// Application service for flights
#[derive(Clone)]
pub struct FlightService {
    repository: FlightRepository,
}

impl FlightService {
    pub fn new(repository: FlightRepository) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &FlightRepository {
        &self.repository
    }

    /// Get a flight by id
    pub async fn get(&self, id: &str) -> Result<ValidatedResponse<Flight>, ServiceError> {
        match self.repository.get(id).await? {
            Some(flight) => Ok(ValidatedResponse::ok(flight)),
            None => Ok(ValidatedResponse::invalid(vec![format!(
                "There is not a flight for the id '{}'.",
                id
            )])),
        }
    }

    /// List flights on a route through the route index
    pub async fn get_paged(
        &self,
        filters: &FlightFilters,
        count: Option<usize>,
        token: Option<String>,
    ) -> Result<PagedResult<Flight>, ServiceError> {
        Ok(self
            .repository
            .get_paged_by_filters(filters, count, token)
            .await?)
    }

    /// Validate and store a new flight
    pub async fn create(&self, input: FlightInput) -> Result<ValidatedResponse<Flight>, ServiceError> {
        if let Some(errors) = validate(&input) {
            return Ok(ValidatedResponse::invalid(errors));
        }

        let Some(flight) = input.into_flight(String::new()) else {
            return Ok(ValidatedResponse::invalid(vec!["Invalid flight".to_string()]));
        };

        let created = self.repository.create(flight, None).await?;

        tracing::info!(id = %created.id, code = %created.code, "Flight created");

        Ok(ValidatedResponse::ok(created))
    }

    /// Validate and replace an existing flight.
    ///
    /// Fails with `NotFound` when there is no flight with `id`.
    pub async fn update(
        &self,
        id: &str,
        input: FlightInput,
    ) -> Result<ValidatedResponse<Flight>, ServiceError> {
        if let Some(errors) = validate(&input) {
            return Ok(ValidatedResponse::invalid(errors));
        }

        let Some(flight) = input.into_flight(id) else {
            return Ok(ValidatedResponse::invalid(vec!["Invalid flight".to_string()]));
        };

        let updated = self.repository.update(id, flight, None).await?;

        Ok(ValidatedResponse::ok(updated))
    }

    /// Delete a flight
    pub async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self.repository.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use crate::db::models::FlightState;
    use crate::db::repositories::{FlightIndexes, RepositoryError};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn service() -> (InMemoryStore, FlightService) {
        let store = InMemoryStore::new();
        let repository = FlightRepository::new(Arc::new(store.clone()), FlightIndexes::default());
        (store, FlightService::new(repository))
    }

    fn input() -> FlightInput {
        FlightInput {
            code: Some("NL4850UK".to_string()),
            from: Some("Amsterdam".to_string()),
            to: Some("London".to_string()),
            date: Some("2024-06-01T10:00:00Z".to_string()),
            airline: Some("KLM".to_string()),
            state: None,
        }
    }

    #[tokio::test]
    async fn test_create_without_code_is_rejected() {
        let (store, service) = service();
        let mut payload = input();
        payload.code = None;

        let result = service.create(payload).await.unwrap();

        assert_eq!(result.errors, vec!["\"code\" is required".to_string()]);
        assert!(result.model.is_none());
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_with_short_code_is_rejected() {
        let (_, service) = service();
        let mut payload = input();
        payload.code = Some("NL".to_string());

        let result = service.create(payload).await.unwrap();

        assert_eq!(
            result.errors[0],
            "\"code\" length must be at least 3 characters long"
        );
    }

    #[tokio::test]
    async fn test_errors_are_ordered_by_field() {
        let (_, service) = service();
        let payload = FlightInput {
            code: Some("ABCDEFGHIJKL".to_string()),
            date: Some("2024-03-120".to_string()),
            ..Default::default()
        };

        let result = service.create(payload).await.unwrap();

        assert_eq!(
            result.errors,
            vec![
                "\"airline\" is required".to_string(),
                "\"code\" length must be less than or equal to 10 characters long".to_string(),
                "\"date\" must be a valid date".to_string(),
                "\"from\" is required".to_string(),
                "\"to\" is required".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, service) = service();

        let created = service.create(input()).await.unwrap();
        assert!(created.is_valid());
        let flight = created.model.unwrap();
        assert!(!flight.id.is_empty());
        assert_eq!(flight.state, FlightState::Awaiting);
        assert_eq!(flight.date, Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());

        let fetched = service.get(&flight.id).await.unwrap();
        assert_eq!(fetched.model, Some(flight));
    }

    #[tokio::test]
    async fn test_get_missing_reports_error() {
        let (_, service) = service();
        let result = service.get("missing-id").await.unwrap();

        assert_eq!(
            result.errors[0],
            "There is not a flight for the id 'missing-id'."
        );
        assert!(result.model.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (_, service) = service();
        let result = service.update("ghost", input()).await;

        assert!(matches!(
            result,
            Err(ServiceError::Repository(RepositoryError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_replaces_flight() {
        let (_, service) = service();
        let flight = service.create(input()).await.unwrap().model.unwrap();

        let mut change = input();
        change.state = Some(FlightState::Delayed);
        change.airline = Some("Transavia".to_string());
        let updated = service.update(&flight.id, change).await.unwrap().model.unwrap();
        assert_eq!(updated.id, flight.id);

        let stored = service.get(&flight.id).await.unwrap().model.unwrap();
        assert_eq!(stored.state, FlightState::Delayed);
        assert_eq!(stored.airline, "Transavia");
    }

    #[tokio::test]
    async fn test_get_paged_lists_route() {
        let (_, service) = service();
        service.create(input()).await.unwrap();
        let mut other = input();
        other.to = Some("Paris".to_string());
        service.create(other).await.unwrap();

        let filters = FlightFilters {
            start_date: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()),
            from: Some("Amsterdam".to_string()),
            to: Some("London".to_string()),
        };
        let page = service.get_paged(&filters, Some(10), None).await.unwrap();

        assert_eq!(page.count, 1);
        assert_eq!(page.items[0].to, "London");
    }

    #[tokio::test]
    async fn test_delete() {
        let (_, service) = service();
        let flight = service.create(input()).await.unwrap().model.unwrap();

        assert!(service.delete(&flight.id).await.unwrap());
        assert!(!service.get(&flight.id).await.unwrap().is_valid());
    }
}
