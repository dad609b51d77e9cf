//! Application settings and configuration
//!
//! This module provides configuration management for the application,
//! loading settings from environment variables with sensible defaults.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Application environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// Where flights are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// The DynamoDB table (production)
    #[default]
    #[value(alias = "dynamo")]
    Dynamodb,
    /// Process memory, lost on exit (local development)
    #[value(alias = "mem")]
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Dynamodb => write!(f, "dynamodb"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StoreBackend::Dynamodb),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            _ => anyhow::bail!("Invalid store backend: {}. Expected: dynamodb or memory", s),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub host: String,
    pub port: u16,

    // AWS settings
    pub aws_region: String,
    pub dynamodb_endpoint_url: Option<String>,
    pub sqs_endpoint_url: Option<String>,

    // Storage
    pub store_backend: StoreBackend,
    pub table_name: String,
    pub gsi1_name: String,
    pub gsi2_name: String,

    // Queues
    pub check_in_flight_queue_url: Option<String>,
    pub check_in_passenger_queue_url: Option<String>,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        let settings = Self {
            // App settings
            app_name: env_or_default("APP_NAME", "flight-checkin"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: env_or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: env_or_default("LOG_LEVEL", "info"),

            // Server settings
            host: env_or_default("HOST", "0.0.0.0"),
            port: env_or_default("PORT", "8000")
                .parse()
                .context("Invalid PORT value")?,

            // AWS settings
            aws_region: env_or_default("AWS_REGION", "us-east-1"),
            dynamodb_endpoint_url: env::var("DYNAMODB_ENDPOINT_URL").ok(),
            sqs_endpoint_url: env::var("SQS_ENDPOINT_URL").ok(),

            // Storage
            store_backend: env_or_default("STORE_BACKEND", "dynamodb")
                .parse()
                .context("Invalid STORE_BACKEND value")?,
            table_name: env_or_default("TABLE_NAME", "flight-checkin"),
            gsi1_name: env_or_default("DYNAMODB_GSI1_NAME", "GSI1"),
            gsi2_name: env_or_default("DYNAMODB_GSI2_NAME", "GSI2"),

            // Queues
            check_in_flight_queue_url: env::var("CHECK_IN_FLIGHT_SQS_QUEUE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            check_in_passenger_queue_url: env::var("CHECK_IN_PASSENGER_SQS_QUEUE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if self.table_name.trim().is_empty() {
            anyhow::bail!("TABLE_NAME cannot be empty");
        }

        if self.gsi1_name.trim().is_empty() || self.gsi2_name.trim().is_empty() {
            anyhow::bail!("Secondary index names cannot be empty");
        }

        if self.check_in_flight_queue_url.is_none() {
            tracing::warn!("CHECK_IN_FLIGHT_SQS_QUEUE_URL is not set; check-in messages will fail");
        }

        if self.check_in_passenger_queue_url.is_none() {
            tracing::warn!("CHECK_IN_PASSENGER_SQS_QUEUE_URL is not set; passenger messages will fail");
        }

        if self.environment == Environment::Production && self.store_backend == StoreBackend::Memory {
            tracing::warn!("Running in production with the in-memory store!");
        }

        Ok(())
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "flight-checkin".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            aws_region: "us-east-1".to_string(),
            dynamodb_endpoint_url: None,
            sqs_endpoint_url: None,
            store_backend: StoreBackend::Dynamodb,
            table_name: "flight-checkin".to_string(),
            gsi1_name: "GSI1".to_string(),
            gsi2_name: "GSI2".to_string(),
            check_in_flight_queue_url: None,
            check_in_passenger_queue_url: None,
        }
    }
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.app_name, "flight-checkin");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.store_backend, StoreBackend::Dynamodb);
        assert_eq!(settings.gsi1_name, "GSI1");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("moon".parse::<Environment>().is_err());
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("DynamoDB".parse::<StoreBackend>().unwrap(), StoreBackend::Dynamodb);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.port = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.table_name = " ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8000");
    }
}
