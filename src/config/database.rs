//! Database configuration module.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! `SQLite` is the default backend; a `mysql://` URL works through the same code.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity` and created only if missing, so the
//! server can start against an existing database without a migration step.

use crate::entities::{
    Buyer, ClientConfig, Command, Line, LogData, LogFile, Machine, MachineType, ModelGroup,
    ModelProcess, ProductModel, Station, client_config,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

/// Database used when `DATABASE_URL` is not set
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/machine_manager.sqlite?mode=rwc";

/// Establishes a connection to the given database URL.
///
/// For file-backed `SQLite` URLs the parent directory is created first so that
/// `mode=rwc` can create the file.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or_default();
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<()> {
    let builder = db.get_database_backend();
    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;
    Ok(())
}

/// Creates all tables, parents before children, plus the composite unique
/// index on client configuration keys.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Buyer).await?;
    create_table(db, &schema, ModelGroup).await?;
    create_table(db, &schema, ProductModel).await?;
    create_table(db, &schema, ModelProcess).await?;
    create_table(db, &schema, Line).await?;
    create_table(db, &schema, Station).await?;
    create_table(db, &schema, MachineType).await?;
    create_table(db, &schema, Machine).await?;
    create_table(db, &schema, Command).await?;
    create_table(db, &schema, LogFile).await?;
    create_table(db, &schema, LogData).await?;
    create_table(db, &schema, ClientConfig).await?;

    let index = Index::create()
        .if_not_exists()
        .name("idx_client_configs_machine_key")
        .table(ClientConfig)
        .col(client_config::Column::MachineId)
        .col(client_config::Column::ConfigKey)
        .unique()
        .to_owned();
    db.execute(builder.build(&index)).await?;

    Ok(())
}
