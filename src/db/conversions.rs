//! DynamoDB attribute conversions
//!
//! Pure functions between JSON records and DynamoDB `AttributeValue` maps,
//! testable without DynamoDB access.

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Number, Value};
use std::collections::HashMap;

use crate::db::store::{Record, StoreError};

/// DynamoDB item shape
pub type Item = HashMap<String, AttributeValue>;

/// Convert a JSON value to an attribute value
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

/// Convert an attribute value back to JSON.
///
/// Binary attributes have no JSON counterpart and are rejected.
pub fn from_attribute(value: &AttributeValue) -> Result<Value, StoreError> {
    match value {
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::N(n) => parse_number(n).map(Value::Number),
        AttributeValue::L(values) => values
            .iter()
            .map(from_attribute)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(map) => to_record(map).map(Value::Object),
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|n| parse_number(n).map(Value::Number))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(StoreError::Conversion(format!(
            "unsupported attribute type: {:?}",
            other
        ))),
    }
}

fn parse_number(n: &str) -> Result<Number, StoreError> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Number::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Number::from(u));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| StoreError::Conversion(format!("invalid number: {}", n)))
}

/// Convert a JSON record to a DynamoDB item
pub fn to_item(record: &Record) -> Item {
    record
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

/// Convert a DynamoDB item to a JSON record
pub fn to_record(item: &Item) -> Result<Record, StoreError> {
    item.iter()
        .map(|(k, v)| from_attribute(v).map(|value| (k.clone(), value)))
        .collect()
}
