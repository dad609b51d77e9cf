//! Secondary index queries
//!
//! Builds key-condition expressions (partition equality plus an optional
//! sort-key predicate) and runs them against a named index.

use serde_json::Value;

use crate::db::models::PagedResult;
use crate::db::pagination;
use crate::db::repositories::RepositoryError;
use crate::db::store::{KeyValueStore, QueryRequest, Record};

/// A secondary index and the attributes it is keyed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryIndex {
    pub name: String,
    pub partition_attr: String,
    pub sort_attr: String,
}

impl SecondaryIndex {
    pub fn new(
        name: impl Into<String>,
        partition_attr: impl Into<String>,
        sort_attr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_attr: partition_attr.into(),
            sort_attr: sort_attr.into(),
        }
    }

    /// Index `GSI{n}` keyed on `gsi{n}pk` / `gsi{n}sk`
    pub fn numbered(n: u8) -> Self {
        Self::new(format!("GSI{n}"), format!("gsi{n}pk"), format!("gsi{n}sk"))
    }

    /// Same key attributes as `GSI{n}`, deployed under a different name
    pub fn numbered_as(n: u8, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::numbered(n)
        }
    }
}

/// Condition on the sort key of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortPredicate {
    Equals(String),
    /// Inclusive on both ends
    Between { from: String, to: String },
    AtLeast(String),
    AtMost(String),
}

impl SortPredicate {
    /// Evaluate against a stored sort value
    pub fn matches(&self, value: &str) -> bool {
        match self {
            SortPredicate::Equals(expected) => value == expected,
            SortPredicate::Between { from, to } => value >= from.as_str() && value <= to.as_str(),
            SortPredicate::AtLeast(from) => value >= from.as_str(),
            SortPredicate::AtMost(to) => value <= to.as_str(),
        }
    }
}

/// Structured key condition: `partition_attr = value [AND sort predicate]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition_attr: String,
    pub partition_value: String,
    pub sort: Option<(String, SortPredicate)>,
}

impl KeyCondition {
    pub fn partition(attr: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            partition_attr: attr.into(),
            partition_value: value.into(),
            sort: None,
        }
    }

    pub fn with_sort(mut self, attr: impl Into<String>, predicate: SortPredicate) -> Self {
        self.sort = Some((attr.into(), predicate));
        self
    }

    /// Render as a key-condition expression and its value placeholders
    pub fn expression(&self) -> (String, Record) {
        let mut values = Record::new();
        let mut expression = format!("{} = :pk", self.partition_attr);
        values.insert(":pk".to_string(), Value::String(self.partition_value.clone()));

        if let Some((attr, predicate)) = &self.sort {
            match predicate {
                SortPredicate::Equals(sk) => {
                    expression.push_str(&format!(" AND {attr} = :sk"));
                    values.insert(":sk".to_string(), Value::String(sk.clone()));
                }
                SortPredicate::Between { from, to } => {
                    expression.push_str(&format!(" AND {attr} BETWEEN :start AND :end"));
                    values.insert(":start".to_string(), Value::String(from.clone()));
                    values.insert(":end".to_string(), Value::String(to.clone()));
                }
                SortPredicate::AtLeast(from) => {
                    expression.push_str(&format!(" AND {attr} >= :start"));
                    values.insert(":start".to_string(), Value::String(from.clone()));
                }
                SortPredicate::AtMost(to) => {
                    expression.push_str(&format!(" AND {attr} <= :end"));
                    values.insert(":end".to_string(), Value::String(to.clone()));
                }
            }
        }

        (expression, values)
    }
}

/// A paged query against one secondary index.
///
/// Without a limit the query is unbounded and any continuation passed in is
/// ignored; a continuation may still come back if the store truncates.
#[derive(Debug, Clone)]
pub struct SecondaryIndexQuery {
    index: SecondaryIndex,
    partition_value: String,
    sort: Option<SortPredicate>,
    limit: Option<i32>,
    continuation: Option<String>,
}

impl SecondaryIndexQuery {
    pub fn new(index: SecondaryIndex, partition_value: impl Into<String>) -> Self {
        Self {
            index,
            partition_value: partition_value.into(),
            sort: None,
            limit: None,
            continuation: None,
        }
    }

    pub fn with_sort(mut self, sort: Option<SortPredicate>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: Option<i32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_continuation(mut self, token: Option<String>) -> Self {
        self.continuation = token;
        self
    }

    /// The store request this query issues
    pub fn request(&self) -> Result<QueryRequest, RepositoryError> {
        let mut key_condition =
            KeyCondition::partition(&self.index.partition_attr, &self.partition_value);
        if let Some(sort) = &self.sort {
            key_condition = key_condition.with_sort(&self.index.sort_attr, sort.clone());
        }

        let exclusive_start_key = match self.limit {
            Some(_) => pagination::decode(self.continuation.as_deref())?,
            None => None,
        };

        Ok(QueryRequest {
            index: Some(self.index.clone()),
            key_condition,
            limit: self.limit,
            exclusive_start_key,
        })
    }

    /// Run the query, mapping each stored record through `map`
    pub async fn execute<T, F>(
        &self,
        store: &dyn KeyValueStore,
        map: F,
    ) -> Result<PagedResult<T>, RepositoryError>
    where
        F: Fn(Record) -> Result<T, RepositoryError>,
    {
        let request = self.request()?;

        tracing::debug!(
            index = %self.index.name,
            partition = %self.partition_value,
            sort = ?self.sort,
            limit = ?self.limit,
            "Querying secondary index"
        );

        let output = store.query(request).await?;
        let next_token = pagination::encode(output.last_evaluated_key.as_ref())?;
        let items = output
            .items
            .into_iter()
            .map(map)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PagedResult {
            count: output.count,
            items,
            next_token,
        })
    }
}
