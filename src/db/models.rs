//! Data models
//!
//! This module defines the entities stored in the application table and the
//! shapes returned by paged reads.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

use crate::utils::date;

/// Anything a repository can store.
///
/// The identifier is the sort key of the stored item. An empty identifier
/// means "not assigned yet".
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    /// Items in store order
    pub items: Vec<T>,

    /// Number of items returned
    pub count: usize,

    /// Opaque continuation token, absent when there are no further pages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl<T> PagedResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_token: None,
        }
    }
}

/// Lifecycle state of a flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightState {
    #[default]
    Awaiting,
    CheckIn,
    Delayed,
    Running,
    Complete,
    Cancelled,
}

impl FlightState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightState::Awaiting => "Awaiting",
            FlightState::CheckIn => "CheckIn",
            FlightState::Delayed => "Delayed",
            FlightState::Running => "Running",
            FlightState::Complete => "Complete",
            FlightState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled flight.
///
/// Stored under the `flight` partition. The route and status indexes are
/// derived from it at write time and never appear on the entity itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    #[serde(default)]
    pub id: String,

    /// Flight code, e.g. `NL4850UK`
    pub code: String,

    /// Departure location
    pub from: String,

    /// Arrival location
    pub to: String,

    /// Scheduled departure
    #[serde(with = "date::iso_millis")]
    pub date: DateTime<Utc>,

    pub airline: String,

    #[serde(default)]
    pub state: FlightState,
}

impl Entity for Flight {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Caller-supplied flight payload.
///
/// Every field is optional so validation can report each one that is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FlightInput {
    #[validate(required, length(min = 3, max = 10))]
    pub code: Option<String>,

    #[validate(required, length(min = 3, max = 100))]
    pub from: Option<String>,

    #[validate(required, length(min = 3, max = 100))]
    pub to: Option<String>,

    #[validate(required, custom(function = "validate_date"))]
    pub date: Option<String>,

    #[validate(required, length(min = 2, max = 100))]
    pub airline: Option<String>,

    #[serde(default)]
    pub state: Option<FlightState>,
}

fn validate_date(value: &str) -> Result<(), ValidationError> {
    if date::is_date(value) {
        Ok(())
    } else {
        Err(ValidationError::new("date"))
    }
}

impl FlightInput {
    /// Build the flight this input describes.
    ///
    /// Returns `None` when a required field is missing or the date does not
    /// parse; run validation first to learn which.
    pub fn into_flight(self, id: impl Into<String>) -> Option<Flight> {
        Some(Flight {
            id: id.into(),
            code: self.code?,
            from: self.from?,
            to: self.to?,
            date: date::from_iso(self.date.as_deref()?)?,
            airline: self.airline?,
            state: self.state.unwrap_or_default(),
        })
    }
}

impl From<&Flight> for FlightInput {
    fn from(flight: &Flight) -> Self {
        Self {
            code: Some(flight.code.clone()),
            from: Some(flight.from.clone()),
            to: Some(flight.to.clone()),
            date: Some(date::to_iso(&flight.date)),
            airline: Some(flight.airline.clone()),
            state: Some(flight.state),
        }
    }
}

/// A passenger that can be checked in on a flight.
///
/// Stored under the `passenger` partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    #[serde(default)]
    pub id: String,

    pub name: String,

    pub email: String,

    #[serde(with = "date::iso_millis")]
    pub birthday: DateTime<Utc>,
}

impl Entity for Passenger {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Caller-supplied passenger payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PassengerInput {
    #[validate(required, length(min = 3, max = 250), custom(function = "validate_alphanumeric"))]
    pub name: Option<String>,

    #[validate(required, email, length(min = 3, max = 100))]
    pub email: Option<String>,

    #[validate(required, custom(function = "validate_date"))]
    pub birthday: Option<String>,
}

fn validate_alphanumeric(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("alphanum"))
    }
}

impl PassengerInput {
    /// Build the passenger this input describes, `None` when incomplete
    pub fn into_passenger(self, id: impl Into<String>) -> Option<Passenger> {
        Some(Passenger {
            id: id.into(),
            name: self.name?,
            email: self.email?,
            birthday: date::from_iso(self.birthday.as_deref()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

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

    #[test]
    fn test_flight_serializes_iso_date_and_state() {
        let flight = input().into_flight("f-1").unwrap();
        let value = serde_json::to_value(&flight).unwrap();

        assert_eq!(value["date"], "2024-06-01T10:00:00.000Z");
        assert_eq!(value["state"], "Awaiting");
        assert_eq!(value["id"], "f-1");
    }

    #[test]
    fn test_flight_deserializes_without_id_or_state() {
        let flight: Flight = serde_json::from_value(json!({
            "code": "NL4850UK",
            "from": "Amsterdam",
            "to": "London",
            "date": "2024-06-01",
            "airline": "KLM",
        }))
        .unwrap();

        assert_eq!(flight.id, "");
        assert_eq!(flight.state, FlightState::Awaiting);
        assert_eq!(flight.date, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_flight_state_display_matches_serde() {
        for state in [
            FlightState::Awaiting,
            FlightState::CheckIn,
            FlightState::Delayed,
            FlightState::Running,
            FlightState::Complete,
            FlightState::Cancelled,
        ] {
            assert_eq!(serde_json::to_value(state).unwrap(), json!(state.to_string()));
        }
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn test_invalid_input_reports_each_field() {
        let mut bad = input();
        bad.code = Some("NL".to_string());
        bad.airline = None;
        bad.date = Some("2024-03-120".to_string());

        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("code"));
        assert!(fields.contains_key("airline"));
        assert!(fields.contains_key("date"));
        assert!(!fields.contains_key("from"));
    }

    fn passenger_input() -> PassengerInput {
        PassengerInput {
            name: Some("Alice".to_string()),
            email: Some("alice@example.com".to_string()),
            birthday: Some("1990-04-12".to_string()),
        }
    }

    #[test]
    fn test_passenger_input_builds_passenger() {
        let input = passenger_input();
        assert!(input.validate().is_ok());

        let passenger = input.into_passenger("p-1").unwrap();
        assert_eq!(passenger.birthday, Utc.with_ymd_and_hms(1990, 4, 12, 0, 0, 0).unwrap());
        assert_eq!(
            serde_json::to_value(&passenger).unwrap()["birthday"],
            "1990-04-12T00:00:00.000Z"
        );
    }

    #[test]
    fn test_invalid_passenger_input_reports_each_field() {
        let bad = PassengerInput {
            name: Some("Al ice".to_string()),
            email: Some("not-an-email".to_string()),
            birthday: None,
        };

        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields["name"].iter().any(|e| e.code == "alphanum"));
        assert!(fields["email"].iter().any(|e| e.code == "email"));
        assert!(fields["birthday"].iter().any(|e| e.code == "required"));
    }

    #[test]
    fn test_paged_result_uses_camel_case() {
        let page = PagedResult {
            items: vec![1, 2],
            count: 2,
            next_token: Some("abc".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({"items": [1, 2], "count": 2, "nextToken": "abc"})
        );

        let last: PagedResult<i32> = PagedResult::empty();
        assert_eq!(
            serde_json::to_value(&last).unwrap(),
            json!({"items": [], "count": 0})
        );
    }
}
