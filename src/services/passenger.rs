//! Passenger service

use validator::Validate;

use crate::db::models::{Passenger, PassengerInput};
use crate::db::repositories::PassengerRepository;
use crate::services::flight::{validation_messages, ValidatedResponse};
use crate::services::ServiceError;

fn validate(input: &PassengerInput) -> Option<Vec<String>> {
    input.validate().err().map(|errors| validation_messages(&errors))
}

/// Application service for passengers
#[derive(Clone)]
pub struct PassengerService {
    repository: PassengerRepository,
}

impl PassengerService {
    pub fn new(repository: PassengerRepository) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &PassengerRepository {
        &self.repository
    }

    /// Get a passenger by id
    pub async fn get(&self, id: &str) -> Result<ValidatedResponse<Passenger>, ServiceError> {
        match self.repository.get(id).await? {
            Some(passenger) => Ok(ValidatedResponse::ok(passenger)),
            None => Ok(ValidatedResponse::invalid(vec![format!(
                "There is not a passenger for the id '{}'.",
                id
            )])),
        }
    }

    /// Validate and store a new passenger
    pub async fn create(
        &self,
        input: PassengerInput,
    ) -> Result<ValidatedResponse<Passenger>, ServiceError> {
        if let Some(errors) = validate(&input) {
            return Ok(ValidatedResponse::invalid(errors));
        }

        let Some(passenger) = input.into_passenger(String::new()) else {
            return Ok(ValidatedResponse::invalid(vec!["Invalid passenger".to_string()]));
        };

        let created = self.repository.create(passenger, None).await?;

        tracing::info!(id = %created.id, "Passenger created");

        Ok(ValidatedResponse::ok(created))
    }

    /// Validate and replace an existing passenger.
    ///
    /// Fails with `NotFound` when there is no passenger with `id`.
    pub async fn update(
        &self,
        id: &str,
        input: PassengerInput,
    ) -> Result<ValidatedResponse<Passenger>, ServiceError> {
        if let Some(errors) = validate(&input) {
            return Ok(ValidatedResponse::invalid(errors));
        }

        let Some(passenger) = input.into_passenger(id) else {
            return Ok(ValidatedResponse::invalid(vec!["Invalid passenger".to_string()]));
        };

        Ok(ValidatedResponse::ok(
            self.repository.update(id, passenger, None).await?,
        ))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self.repository.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use crate::db::repositories::RepositoryError;
    use std::sync::Arc;

    fn service() -> (InMemoryStore, PassengerService) {
        let store = InMemoryStore::new();
        let repository = PassengerRepository::new(Arc::new(store.clone()));
        (store, PassengerService::new(repository))
    }

    fn input() -> PassengerInput {
        PassengerInput {
            name: Some("Alice".to_string()),
            email: Some("alice@example.com".to_string()),
            birthday: Some("1990-04-12".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, service) = service();

        let passenger = service.create(input()).await.unwrap().model.unwrap();
        assert!(!passenger.id.is_empty());

        let fetched = service.get(&passenger.id).await.unwrap();
        assert_eq!(fetched.model, Some(passenger));
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_without_store_calls() {
        let (store, service) = service();
        let payload = PassengerInput {
            name: Some("Al".to_string()),
            email: Some("nope".to_string()),
            birthday: None,
        };

        let result = service.create(payload).await.unwrap();

        assert_eq!(
            result.errors,
            vec![
                "\"birthday\" is required".to_string(),
                "\"email\" must be a valid email".to_string(),
                "\"name\" length must be at least 3 characters long".to_string(),
            ]
        );
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_missing_reports_error() {
        let (_, service) = service();
        let result = service.get("ghost").await.unwrap();

        assert_eq!(result.errors[0], "There is not a passenger for the id 'ghost'.");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_, service) = service();
        let passenger = service.create(input()).await.unwrap().model.unwrap();

        let mut change = input();
        change.email = Some("alice@airline.example".to_string());
        service.update(&passenger.id, change).await.unwrap();
        let stored = service.get(&passenger.id).await.unwrap().model.unwrap();
        assert_eq!(stored.email, "alice@airline.example");

        assert!(service.delete(&passenger.id).await.unwrap());
        assert!(!service.get(&passenger.id).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (_, service) = service();
        assert!(matches!(
            service.update("ghost", input()).await,
            Err(ServiceError::Repository(RepositoryError::NotFound(_)))
        ));
    }
}
