//! Flight repository
//!
//! Flights are stored under the `flight` partition with two derived index
//! key pairs: the route index (`{from}#{to}` by date) and the status index
//! (`flight#{state}` by date).

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

use crate::db::index_query::{SecondaryIndex, SortPredicate};
use crate::db::models::{Flight, FlightState, PagedResult};
use crate::db::repositories::entity::{deserialize_entity, serialize_entity, EntityRepository, RecordMapper};
use crate::db::repositories::RepositoryError;
use crate::db::store::{KeyValueStore, Record};
use crate::utils::date::{from_iso, to_iso};

/// Partition key of every flight
pub const FLIGHT_PARTITION: &str = "flight";

/// How far ahead of departure check-in opens
pub const CHECK_IN_WINDOW_HOURS: i64 = 48;

/// Last instant of the check-in window opened at `as_of`.
///
/// The window runs to the end of the UTC day that falls
/// [`CHECK_IN_WINDOW_HOURS`] after `as_of`.
pub fn check_in_window_end(as_of: DateTime<Utc>) -> DateTime<Utc> {
    let horizon = as_of + Duration::hours(CHECK_IN_WINDOW_HOURS);
    horizon
        .date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|end| end.and_utc())
        .unwrap_or(horizon)
}

/// Most flights opened for check-in per run
pub const CHECK_IN_BATCH_SIZE: usize = 10;

/// The two secondary indexes flights are queried through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightIndexes {
    /// Keyed on `{from}#{to}`, sorted by date
    pub route: SecondaryIndex,

    /// Keyed on `flight#{state}`, sorted by date
    pub status: SecondaryIndex,
}

impl Default for FlightIndexes {
    fn default() -> Self {
        Self {
            route: SecondaryIndex::numbered(1),
            status: SecondaryIndex::numbered(2),
        }
    }
}

impl FlightIndexes {
    /// Indexes with the standard key attributes deployed under custom names
    pub fn named(route: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            route: SecondaryIndex::numbered_as(1, route),
            status: SecondaryIndex::numbered_as(2, status),
        }
    }
}

/// Optional filters for listing flights on a route
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightFilters {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl FlightFilters {
    fn route(&self) -> String {
        route_key(
            self.from.as_deref().unwrap_or_default(),
            self.to.as_deref().unwrap_or_default(),
        )
    }

    fn date_range(&self) -> Option<SortPredicate> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => Some(SortPredicate::Between {
                from: to_iso(start),
                to: to_iso(end),
            }),
            (Some(start), None) => Some(SortPredicate::AtLeast(to_iso(start))),
            (None, Some(end)) => Some(SortPredicate::AtMost(to_iso(end))),
            (None, None) => None,
        }
    }
}

fn route_key(from: &str, to: &str) -> String {
    format!("{from}#{to}")
}

fn status_key(state: FlightState) -> String {
    format!("{FLIGHT_PARTITION}#{state}")
}

/// Maps flights to records carrying ISO dates and both index key pairs
#[derive(Debug, Clone, Default)]
pub struct FlightRecordMapper {
    indexes: FlightIndexes,
}

impl FlightRecordMapper {
    pub fn new(indexes: FlightIndexes) -> Self {
        Self { indexes }
    }

    pub fn indexes(&self) -> &FlightIndexes {
        &self.indexes
    }
}

impl RecordMapper<Flight> for FlightRecordMapper {
    fn to_storage_record(&self, flight: &Flight) -> Result<Record, RepositoryError> {
        let mut record = serialize_entity(flight)?;
        let date = Value::String(to_iso(&flight.date));

        record.insert("date".to_string(), date.clone());
        record.insert(
            self.indexes.route.partition_attr.clone(),
            Value::String(route_key(&flight.from, &flight.to)),
        );
        record.insert(self.indexes.route.sort_attr.clone(), date.clone());
        record.insert(
            self.indexes.status.partition_attr.clone(),
            Value::String(status_key(flight.state)),
        );
        record.insert(self.indexes.status.sort_attr.clone(), date);

        Ok(record)
    }

    fn from_storage_record(&self, mut record: Record) -> Result<Flight, RepositoryError> {
        // Older items may hold a date without a time part
        if let Some(Value::String(text)) = record.get("date") {
            let date = from_iso(text).ok_or_else(|| {
                RepositoryError::Serialization(format!("invalid flight date: {}", text))
            })?;
            record.insert("date".to_string(), Value::String(to_iso(&date)));
        }

        deserialize_entity(record)
    }
}

/// Repository for flights.
///
/// Every generic operation is available through `Deref` to the underlying
/// [`EntityRepository`].
#[derive(Clone)]
pub struct FlightRepository {
    base: EntityRepository<Flight, FlightRecordMapper>,
}

impl FlightRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, indexes: FlightIndexes) -> Self {
        Self {
            base: EntityRepository::with_mapper(
                store,
                FLIGHT_PARTITION,
                FlightRecordMapper::new(indexes),
            ),
        }
    }

    fn indexes(&self) -> &FlightIndexes {
        self.base.mapper().indexes()
    }

    /// Flights on a route, optionally within a date range (inclusive).
    ///
    /// Missing `from`/`to` become empty strings in the route key.
    pub async fn get_paged_by_filters(
        &self,
        filters: &FlightFilters,
        count: Option<usize>,
        token: Option<String>,
    ) -> Result<PagedResult<Flight>, RepositoryError> {
        self.base
            .get_by_index(
                &self.indexes().route,
                &filters.route(),
                filters.date_range(),
                count,
                token,
            )
            .await
    }

    /// Awaiting flights departing within the check-in window of `as_of`,
    /// earliest first, at most [`CHECK_IN_BATCH_SIZE`].
    pub async fn get_flights_to_check_in(
        &self,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Flight>, RepositoryError> {
        let window_end = check_in_window_end(as_of);

        let page = self
            .base
            .get_by_index(
                &self.indexes().status,
                &status_key(FlightState::Awaiting),
                Some(SortPredicate::AtMost(to_iso(&window_end))),
                Some(CHECK_IN_BATCH_SIZE),
                None,
            )
            .await?;

        tracing::debug!(
            as_of = %to_iso(&as_of),
            window_end = %to_iso(&window_end),
            found = page.count,
            "Fetched flights to check in"
        );

        Ok(page.items)
    }
}

impl Deref for FlightRepository {
    type Target = EntityRepository<Flight, FlightRecordMapper>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryStore;
    use crate::db::store::ItemKey;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn flight(code: &str, from: &str, to: &str, date: DateTime<Utc>, state: FlightState) -> Flight {
        Flight {
            id: String::new(),
            code: code.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            date,
            airline: "KLM".to_string(),
            state,
        }
    }

    fn repository() -> (InMemoryStore, FlightRepository) {
        let store = InMemoryStore::new();
        let repo = FlightRepository::new(Arc::new(store.clone()), FlightIndexes::default());
        (store, repo)
    }

    #[tokio::test]
    async fn test_stored_record_carries_index_keys() {
        let (store, repo) = repository();
        let created = repo
            .create(
                flight("NL4850UK", "Amsterdam", "London", at(2024, 6, 1, 10), FlightState::Awaiting),
                None,
            )
            .await
            .unwrap();

        let raw = store.raw(&ItemKey::new("flight", &created.id)).await.unwrap();
        assert_eq!(raw["date"], "2024-06-01T10:00:00.000Z");
        assert_eq!(raw["gsi1pk"], "Amsterdam#London");
        assert_eq!(raw["gsi1sk"], "2024-06-01T10:00:00.000Z");
        assert_eq!(raw["gsi2pk"], "flight#Awaiting");
        assert_eq!(raw["gsi2sk"], "2024-06-01T10:00:00.000Z");

        let fetched = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_custom_index_names_keep_key_attributes() {
        let mapper = FlightRecordMapper::new(FlightIndexes::named("RouteIndex", "StatusIndex"));
        let record = mapper
            .to_storage_record(&flight("AB123", "A", "B", at(2024, 1, 1, 0), FlightState::Delayed))
            .unwrap();

        assert_eq!(mapper.indexes().route.name, "RouteIndex");
        assert_eq!(record["gsi1pk"], "A#B");
        assert_eq!(record["gsi2pk"], "flight#Delayed");
    }

    #[test]
    fn test_legacy_date_only_records_are_read() {
        let mapper = FlightRecordMapper::default();
        let record = json!({
            "pk": "flight",
            "id": "f-1",
            "code": "AB123",
            "from": "Amsterdam",
            "to": "London",
            "date": "2024-06-01",
            "airline": "KLM",
            "state": "Running",
            "gsi1pk": "Amsterdam#London",
            "gsi1sk": "2024-06-01",
        })
        .as_object()
        .cloned()
        .unwrap();

        let flight = mapper.from_storage_record(record).unwrap();
        assert_eq!(flight.date, at(2024, 6, 1, 0));
        assert_eq!(flight.state, FlightState::Running);
        assert_eq!(flight.id, "f-1");
    }

    #[test]
    fn test_unparseable_date_is_rejected() {
        let mapper = FlightRecordMapper::default();
        let record = json!({"pk": "flight", "id": "f-1", "code": "AB123", "from": "A", "to": "B", "date": "soon", "airline": "X"})
            .as_object()
            .cloned()
            .unwrap();

        assert!(matches!(
            mapper.from_storage_record(record),
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_filters_select_route_and_inclusive_range() {
        let (_, repo) = repository();
        for (code, day) in [("D01", 1), ("D05", 5), ("D10", 10), ("D15", 15)] {
            repo.create(
                flight(code, "Amsterdam", "London", at(2024, 6, day, 0), FlightState::Awaiting),
                None,
            )
            .await
            .unwrap();
        }
        repo.create(
            flight("OTH", "Paris", "London", at(2024, 6, 5, 0), FlightState::Awaiting),
            None,
        )
        .await
        .unwrap();

        let filters = FlightFilters {
            start_date: Some(at(2024, 6, 5, 0)),
            end_date: Some(at(2024, 6, 10, 0)),
            from: Some("Amsterdam".to_string()),
            to: Some("London".to_string()),
        };
        let page = repo.get_paged_by_filters(&filters, Some(10), None).await.unwrap();

        let codes: Vec<&str> = page.items.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["D05", "D10"]);
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_filters_with_one_bound() {
        let (_, repo) = repository();
        for day in [1, 5, 10] {
            repo.create(
                flight(&format!("D{day:02}"), "A", "B", at(2024, 6, day, 0), FlightState::Awaiting),
                None,
            )
            .await
            .unwrap();
        }

        let after = FlightFilters {
            start_date: Some(at(2024, 6, 5, 0)),
            from: Some("A".to_string()),
            to: Some("B".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.get_paged_by_filters(&after, None, None).await.unwrap().count, 2);

        let before = FlightFilters {
            end_date: Some(at(2024, 6, 4, 0)),
            from: Some("A".to_string()),
            to: Some("B".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.get_paged_by_filters(&before, None, None).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_check_in_window_selects_awaiting_flights() {
        let (_, repo) = repository();
        let due = repo
            .create(
                flight("NL4850UK", "Amsterdam", "London", at(2024, 6, 1, 10), FlightState::Awaiting),
                None,
            )
            .await
            .unwrap();
        repo.create(
            flight("RUN001", "Amsterdam", "London", at(2024, 6, 1, 9), FlightState::Running),
            None,
        )
        .await
        .unwrap();
        repo.create(
            flight("LATE01", "Amsterdam", "London", at(2024, 6, 10, 9), FlightState::Awaiting),
            None,
        )
        .await
        .unwrap();

        let flights = repo.get_flights_to_check_in(at(2024, 5, 30, 0)).await.unwrap();

        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].id, due.id);
    }

    #[test]
    fn test_check_in_window_ends_with_the_day() {
        let end = check_in_window_end(at(2024, 5, 30, 0));
        assert_eq!(to_iso(&end), "2024-06-01T23:59:59.999Z");

        let end = check_in_window_end(at(2024, 5, 30, 22));
        assert_eq!(to_iso(&end), "2024-06-01T23:59:59.999Z");
    }

    #[tokio::test]
    async fn test_check_in_excludes_flights_after_the_window() {
        let (_, repo) = repository();
        repo.create(
            flight("NEXT01", "A", "B", at(2024, 6, 2, 0), FlightState::Awaiting),
            None,
        )
        .await
        .unwrap();

        assert!(repo.get_flights_to_check_in(at(2024, 5, 30, 0)).await.unwrap().is_empty());
        assert_eq!(repo.get_flights_to_check_in(at(2024, 5, 31, 0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_in_is_capped() {
        let (_, repo) = repository();
        let flights: Vec<Flight> = (0..15)
            .map(|i| flight(&format!("CAP{i:02}"), "A", "B", at(2024, 6, 1, i), FlightState::Awaiting))
            .collect();
        repo.batch_write(flights).await.unwrap();

        let due = repo.get_flights_to_check_in(at(2024, 5, 31, 0)).await.unwrap();
        assert_eq!(due.len(), CHECK_IN_BATCH_SIZE);
        assert_eq!(due[0].code, "CAP00");
    }

    #[tokio::test]
    async fn test_update_moves_flight_between_status_partitions() {
        let (_, repo) = repository();
        let mut created = repo
            .create(
                flight("NL4850UK", "Amsterdam", "London", at(2024, 6, 1, 10), FlightState::Awaiting),
                None,
            )
            .await
            .unwrap();

        created.state = FlightState::CheckIn;
        repo.update(&created.id.clone(), created, None).await.unwrap();

        let due = repo.get_flights_to_check_in(at(2024, 5, 30, 0)).await.unwrap();
        assert!(due.is_empty());
    }
}
