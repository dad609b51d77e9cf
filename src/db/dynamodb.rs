//! DynamoDB store
//!
//! This module implements [`KeyValueStore`] on top of the AWS DynamoDB SDK
//! client, against a single table keyed by `pk` (hash) and `id` (range).

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{DeleteRequest, KeysAndAttributes, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client as DynamoDbSdkClient;
use std::collections::HashMap;

use crate::db::conversions::{to_attribute, to_item, to_record};
use crate::db::store::{
    ItemKey, KeyValueStore, QueryOutput, QueryRequest, Record, StoreError, UpdateSpec,
    WriteOperation,
};

/// DynamoDB-backed store for a single table.
#[derive(Clone)]
pub struct DynamoDbStore {
    /// AWS DynamoDB SDK client
    client: DynamoDbSdkClient,

    /// Table holding every entity partition
    table_name: String,
}

impl DynamoDbStore {
    /// Create a new DynamoDB store.
    ///
    /// # Arguments
    /// * `client` - AWS DynamoDB SDK client
    /// * `table_name` - Name of the single application table
    pub fn new(client: DynamoDbSdkClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Get a reference to the underlying AWS SDK client
    pub fn client(&self) -> &DynamoDbSdkClient {
        &self.client
    }

    /// Get the table name
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

fn sdk_error<E: std::error::Error>(e: E) -> StoreError {
    StoreError::DynamoDb(DisplayErrorContext(e).to_string())
}

fn key_item(key: &ItemKey) -> HashMap<String, aws_sdk_dynamodb::types::AttributeValue> {
    to_item(&key.to_record())
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Record>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_item(key)))
            .send()
            .await
            .map_err(sdk_error)?;

        result.item.as_ref().map(to_record).transpose()
    }

    async fn put_item(&self, record: Record) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(&record)))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn update_item(&self, key: &ItemKey, spec: &UpdateSpec) -> Result<(), StoreError> {
        if spec.is_empty() {
            return Ok(());
        }

        let values = spec
            .attribute_values
            .iter()
            .map(|(placeholder, value)| (placeholder.clone(), to_attribute(value)))
            .collect();

        self.client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_item(key)))
            .update_expression(&spec.set_expression)
            .set_expression_attribute_names(Some(spec.attribute_names.clone()))
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<bool, StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_item(key)))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(true)
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput, StoreError> {
        let (expression, values) = request.key_condition.expression();

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(request.index.map(|index| index.name))
            .key_condition_expression(expression)
            .set_expression_attribute_values(Some(to_item(&values)))
            .set_limit(request.limit)
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(to_item))
            .send()
            .await
            .map_err(sdk_error)?;

        let items = result
            .items
            .unwrap_or_default()
            .iter()
            .map(to_record)
            .collect::<Result<Vec<_>, _>>()?;
        let last_evaluated_key = result.last_evaluated_key.as_ref().map(to_record).transpose()?;

        Ok(QueryOutput {
            count: usize::try_from(result.count).unwrap_or(items.len()),
            scanned_count: usize::try_from(result.scanned_count).unwrap_or_default(),
            items,
            last_evaluated_key,
        })
    }

    async fn batch_get_items(&self, keys: Vec<ItemKey>) -> Result<Vec<Record>, StoreError> {
        let keys_and_attributes = KeysAndAttributes::builder()
            .set_keys(Some(keys.iter().map(key_item).collect()))
            .build()
            .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

        let result = self
            .client
            .batch_get_item()
            .request_items(&self.table_name, keys_and_attributes)
            .send()
            .await
            .map_err(sdk_error)?;

        let unprocessed: usize = result
            .unprocessed_keys
            .as_ref()
            .and_then(|pending| pending.get(&self.table_name))
            .map(|pending| pending.keys().len())
            .unwrap_or(0);
        if unprocessed > 0 {
            return Err(StoreError::Unprocessed(unprocessed));
        }

        result
            .responses
            .and_then(|mut responses| responses.remove(&self.table_name))
            .unwrap_or_default()
            .iter()
            .map(to_record)
            .collect()
    }

    async fn batch_write_items(&self, operations: Vec<WriteOperation>) -> Result<(), StoreError> {
        let requests = operations
            .iter()
            .map(|operation| match operation {
                WriteOperation::Put(record) => PutRequest::builder()
                    .set_item(Some(to_item(record)))
                    .build()
                    .map(|put| WriteRequest::builder().put_request(put).build()),
                WriteOperation::Delete(key) => DeleteRequest::builder()
                    .set_key(Some(key_item(key)))
                    .build()
                    .map(|delete| WriteRequest::builder().delete_request(delete).build()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

        let result = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(sdk_error)?;

        let unprocessed: usize = result
            .unprocessed_items
            .as_ref()
            .and_then(|pending| pending.get(&self.table_name))
            .map(Vec::len)
            .unwrap_or(0);
        if unprocessed > 0 {
            return Err(StoreError::Unprocessed(unprocessed));
        }

        Ok(())
    }

    /// Check if the DynamoDB table is reachable
    ///
    /// Performs a describe_table operation to verify connectivity.
    async fn health_check(&self) -> bool {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                tracing::debug!(table = %self.table_name, "DynamoDB health check passed");
                true
            }
            Err(e) => {
                tracing::warn!(table = %self.table_name, error = %DisplayErrorContext(&e), "DynamoDB health check failed");
                false
            }
        }
    }
}
