//! CLI tool to create the flight table
//!
//! Usage:
//!   cargo run --bin setup_table
//!
//! For local development with DynamoDB Local:
//!   DYNAMODB_ENDPOINT_URL=http://localhost:8001 cargo run --bin setup_table

use anyhow::{Context, Result};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    Projection, ProjectionType, ScalarAttributeType,
};
use clap::Parser;
use flight_checkin::{
    config::{create_dynamodb_client, Settings},
    db::{
        repositories::FlightIndexes,
        store::{ID_ATTR, PARTITION_KEY_ATTR},
        SecondaryIndex,
    },
};

/// Create the single-table layout used for flights
#[derive(Parser, Debug)]
#[command(name = "setup_table")]
#[command(about = "Create the DynamoDB table and secondary indexes for flights")]
struct Args {
    /// DynamoDB endpoint URL (overrides DYNAMODB_ENDPOINT_URL)
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Table name (overrides TABLE_NAME)
    #[arg(long)]
    table_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load()?;
    if let Some(url) = args.endpoint_url {
        settings.dynamodb_endpoint_url = Some(url);
    }
    if let Some(table_name) = args.table_name {
        settings.table_name = table_name;
    }

    if let Some(ref url) = settings.dynamodb_endpoint_url {
        println!("Using DynamoDB endpoint: {}", url);
    }

    let client = create_dynamodb_client(&settings).await;
    let indexes = FlightIndexes::named(settings.gsi1_name.clone(), settings.gsi2_name.clone());

    println!("\nSetting up table {}...\n", settings.table_name);

    match create_table(&client, &settings.table_name, &indexes).await {
        Ok(true) => println!("Created table: {}", settings.table_name),
        Ok(false) => println!("Table already exists: {}", settings.table_name),
        Err(e) => {
            println!("Failed to create table {}: {:#}", settings.table_name, e);
            return Err(e);
        }
    }

    Ok(())
}

fn string_attribute(name: &str) -> Result<AttributeDefinition> {
    Ok(AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()?)
}

fn key(name: &str, key_type: KeyType) -> Result<KeySchemaElement> {
    Ok(KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()?)
}

fn global_index(index: &SecondaryIndex) -> Result<GlobalSecondaryIndex> {
    Ok(GlobalSecondaryIndex::builder()
        .index_name(&index.name)
        .key_schema(key(&index.partition_attr, KeyType::Hash)?)
        .key_schema(key(&index.sort_attr, KeyType::Range)?)
        .projection(
            Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
        )
        .build()?)
}

async fn create_table(
    client: &aws_sdk_dynamodb::Client,
    table_name: &str,
    indexes: &FlightIndexes,
) -> Result<bool> {
    let tables = client
        .list_tables()
        .send()
        .await
        .context("Failed to list tables")?;
    if tables.table_names().iter().any(|name| name == table_name) {
        return Ok(false);
    }

    let mut request = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(string_attribute(PARTITION_KEY_ATTR)?)
        .attribute_definitions(string_attribute(ID_ATTR)?)
        .key_schema(key(PARTITION_KEY_ATTR, KeyType::Hash)?)
        .key_schema(key(ID_ATTR, KeyType::Range)?)
        .billing_mode(BillingMode::PayPerRequest);

    for index in [&indexes.route, &indexes.status] {
        request = request
            .attribute_definitions(string_attribute(&index.partition_attr)?)
            .attribute_definitions(string_attribute(&index.sort_attr)?)
            .global_secondary_indexes(global_index(index)?);
    }

    request.send().await.context("CreateTable failed")?;

    Ok(true)
}
