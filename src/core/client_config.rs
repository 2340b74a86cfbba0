//! Per-machine key/value configuration pushed to agents.

use super::required_text;
use crate::{
    entities::{ClientConfig, Machine, client_config},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_KEY_LEN: usize = 100;

/// Payload for setting a configuration value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValueInput {
    /// Value to store
    pub config_value: String,
    /// Parsing hint for the agent
    #[serde(default)]
    pub data_type: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
}

async fn ensure_machine(db: &DatabaseConnection, machine_id: i32) -> Result<()> {
    if Machine::find_by_id(machine_id).one(db).await?.is_none() {
        return Err(Error::not_found("Machine", machine_id));
    }
    Ok(())
}

/// Lists the configuration entries of a machine ordered by key.
///
/// # Errors
/// Returns an error if the machine does not exist or the query fails.
pub async fn get_config_for_machine(
    db: &DatabaseConnection,
    machine_id: i32,
) -> Result<Vec<client_config::Model>> {
    ensure_machine(db, machine_id).await?;
    ClientConfig::find()
        .filter(client_config::Column::MachineId.eq(machine_id))
        .order_by_asc(client_config::Column::ConfigKey)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates or replaces the entry `key` of a machine.
///
/// # Errors
/// Returns an error if the key is blank or too long, the machine does not
/// exist, or the write fails.
pub async fn upsert_config(
    db: &DatabaseConnection,
    machine_id: i32,
    key: &str,
    input: ConfigValueInput,
) -> Result<client_config::Model> {
    let key = required_text("Config key", key, MAX_KEY_LEN)?;
    ensure_machine(db, machine_id).await?;

    let existing = ClientConfig::find()
        .filter(client_config::Column::MachineId.eq(machine_id))
        .filter(client_config::Column::ConfigKey.eq(key.as_str()))
        .one(db)
        .await?;

    let now = Utc::now();
    let saved = match existing {
        Some(entry) => {
            let mut active: client_config::ActiveModel = entry.into();
            active.config_value = Set(input.config_value);
            active.data_type = Set(input.data_type);
            active.description = Set(input.description);
            active.updated_time = Set(now);
            active.update(db).await?
        }
        None => {
            client_config::ActiveModel {
                machine_id: Set(machine_id),
                config_key: Set(key),
                config_value: Set(input.config_value),
                data_type: Set(input.data_type),
                description: Set(input.description),
                updated_time: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    info!(machine_id, key = %saved.config_key, "Client config saved");
    Ok(saved)
}

/// Deletes the entry `key` of a machine.
///
/// # Errors
/// Returns an error if the entry does not exist or the delete fails.
pub async fn delete_config(db: &DatabaseConnection, machine_id: i32, key: &str) -> Result<()> {
    let result = ClientConfig::delete_many()
        .filter(client_config::Column::MachineId.eq(machine_id))
        .filter(client_config::Column::ConfigKey.eq(key))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Config key", key));
    }
    Ok(())
}
