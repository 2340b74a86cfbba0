//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        buyer::{self, BuyerInput},
        line,
        machine::{self, MachineInput},
        model::{self, ModelInput},
        model_group::{self, ModelGroupInput},
        model_process::{self, ModelProcessInput, ModelProcessView},
        station::{self, StationInput},
    },
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test buyer with code "TB" and name "Test Buyer".
pub async fn create_test_buyer(db: &DatabaseConnection) -> Result<entities::buyer::Model> {
    buyer::create_buyer(
        db,
        BuyerInput {
            code: "TB".to_string(),
            name: "Test Buyer".to_string(),
        },
    )
    .await
}

/// Creates a model group under `buyer_id`.
pub async fn create_test_model_group(
    db: &DatabaseConnection,
    name: &str,
    buyer_id: i32,
) -> Result<entities::model_group::Model> {
    model_group::create_model_group(
        db,
        ModelGroupInput {
            name: name.to_string(),
            buyer_id,
        },
    )
    .await
}

/// Creates a product model under `model_group_id`.
pub async fn create_test_model(
    db: &DatabaseConnection,
    name: &str,
    model_group_id: i32,
) -> Result<entities::model::Model> {
    model::create_model(
        db,
        ModelInput {
            name: name.to_string(),
            model_group_id,
        },
    )
    .await
}

/// Creates a model process for `model_id`.
pub async fn create_test_model_process(
    db: &DatabaseConnection,
    name: &str,
    model_id: i32,
) -> Result<ModelProcessView> {
    model_process::create_model_process(
        db,
        ModelProcessInput {
            name: name.to_string(),
            model_id,
        },
    )
    .await
}

/// Creates an unassigned machine with the given name and IP.
///
/// # Defaults
/// * no station, type, code or MAC
/// * `client_status`: "Offline"
pub async fn create_test_machine(
    db: &DatabaseConnection,
    name: &str,
    ip: &str,
) -> Result<entities::machine::Model> {
    machine::create_machine(
        db,
        MachineInput {
            name: name.to_string(),
            ip: Some(ip.to_string()),
            ..Default::default()
        },
    )
    .await
}

/// Creates a machine installed at `station_id`.
pub async fn create_test_machine_at(
    db: &DatabaseConnection,
    name: &str,
    ip: &str,
    station_id: i32,
) -> Result<entities::machine::Model> {
    machine::create_machine(
        db,
        MachineInput {
            name: name.to_string(),
            ip: Some(ip.to_string()),
            station_id: Some(station_id),
            ..Default::default()
        },
    )
    .await
}

/// Sets up a test environment with a single buyer.
/// Returns (db, buyer).
pub async fn setup_with_buyer() -> Result<(DatabaseConnection, entities::buyer::Model)> {
    let db = setup_test_db().await?;
    let buyer = create_test_buyer(&db).await?;
    Ok((db, buyer))
}

/// Sets up a test environment with one unassigned machine "ICT-01".
/// Returns (db, machine).
pub async fn setup_with_machine() -> Result<(DatabaseConnection, entities::machine::Model)> {
    let db = setup_test_db().await?;
    let machine = create_test_machine(&db, "ICT-01", "10.224.1.10").await?;
    Ok((db, machine))
}

/// A complete hierarchy down to one station.
pub struct StationFixture {
    pub db: DatabaseConnection,
    pub buyer: entities::buyer::Model,
    pub model_group: entities::model_group::Model,
    pub model: entities::model::Model,
    pub model_process: ModelProcessView,
    pub line: entities::line::Model,
    pub station: entities::station::Model,
}

/// Sets up buyer "Test Buyer" → group "Galaxy A" → model "SM-A156" →
/// process "SMT", plus line "L01" and station "ST-01" running that process.
pub async fn setup_with_station() -> Result<StationFixture> {
    let (db, buyer) = setup_with_buyer().await?;
    let model_group = create_test_model_group(&db, "Galaxy A", buyer.id).await?;
    let model = create_test_model(&db, "SM-A156", model_group.id).await?;
    let model_process = create_test_model_process(&db, "SMT", model.id).await?;
    let line = line::create_line(&db, "L01".to_string()).await?;
    let station = station::create_station(
        &db,
        StationInput {
            name: "ST-01".to_string(),
            line_id: line.id,
            model_process_id: model_process.id,
        },
    )
    .await?;

    Ok(StationFixture {
        db,
        buyer,
        model_group,
        model,
        model_process,
        line,
        station,
    })
}
