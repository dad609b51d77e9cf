//! AWS SDK configuration
//!
//! This module provides AWS SDK configuration for the DynamoDB and SQS
//! clients, supporting custom endpoints for local development and testing.

use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::Client as DynamoDbSdkClient;
use aws_sdk_sqs::Client as SqsClient;

use crate::config::Settings;

/// AWS configuration builder
///
/// Creates AWS SDK configuration with support for:
/// - Custom regions
/// - Credential providers (environment, instance profile, etc.)
/// - Custom endpoint URLs for local testing
pub struct AwsConfigBuilder<'a> {
    settings: &'a Settings,
}

impl<'a> AwsConfigBuilder<'a> {
    /// Create a new AWS configuration builder
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Build the base AWS SDK configuration shared by every client
    pub async fn build_sdk_config(&self) -> SdkConfig {
        let region_provider = RegionProviderChain::first_try(Region::new(self.settings.aws_region.clone()))
            .or_default_provider();

        aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await
    }

    /// Create a DynamoDB client with optional custom endpoint
    ///
    /// If `DYNAMODB_ENDPOINT_URL` is set in settings, the client will use
    /// that endpoint (useful for DynamoDB Local or LocalStack).
    pub fn build_dynamodb_client(&self, sdk_config: &SdkConfig) -> DynamoDbSdkClient {
        match &self.settings.dynamodb_endpoint_url {
            Some(endpoint_url) => {
                tracing::info!(endpoint = %endpoint_url, "Using custom DynamoDB endpoint");

                let dynamodb_config = aws_sdk_dynamodb::config::Builder::from(sdk_config)
                    .endpoint_url(endpoint_url)
                    .build();

                DynamoDbSdkClient::from_conf(dynamodb_config)
            }
            None => DynamoDbSdkClient::new(sdk_config),
        }
    }

    /// Create an SQS client with optional custom endpoint
    ///
    /// If `SQS_ENDPOINT_URL` is set in settings, the client will use that
    /// endpoint (useful for LocalStack or ElasticMQ).
    pub fn build_sqs_client(&self, sdk_config: &SdkConfig) -> SqsClient {
        match &self.settings.sqs_endpoint_url {
            Some(endpoint_url) => {
                tracing::info!(endpoint = %endpoint_url, "Using custom SQS endpoint");

                let sqs_config = aws_sdk_sqs::config::Builder::from(sdk_config)
                    .endpoint_url(endpoint_url)
                    .build();

                SqsClient::from_conf(sqs_config)
            }
            None => SqsClient::new(sdk_config),
        }
    }
}

/// Build AWS SDK config from settings (convenience function)
pub async fn build_aws_config(settings: &Settings) -> SdkConfig {
    AwsConfigBuilder::new(settings).build_sdk_config().await
}

/// Create a DynamoDB client from settings (convenience function)
pub async fn create_dynamodb_client(settings: &Settings) -> DynamoDbSdkClient {
    let builder = AwsConfigBuilder::new(settings);
    let sdk_config = builder.build_sdk_config().await;
    builder.build_dynamodb_client(&sdk_config)
}

/// Create an SQS client from settings (convenience function)
pub async fn create_sqs_client(settings: &Settings) -> SqsClient {
    let builder = AwsConfigBuilder::new(settings);
    let sdk_config = builder.build_sdk_config().await;
    builder.build_sqs_client(&sdk_config)
}
