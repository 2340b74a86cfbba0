//! Command queue business logic.
//!
//! Operators queue commands for a machine; its agent polls for pending ones,
//! marks them `Sent` when picked up and reports `Executed` or `Error` when
//! done. Pending commands are delivered by ascending priority, oldest first,
//! and only once their `scheduled_at` time (if any) has passed.

use super::optional_text;
use crate::{
    entities::{Command, CommandStatus, Machine, command, command::DEFAULT_PRIORITY},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Payload for queuing a command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInput {
    /// Target machine
    pub machine_id: i32,
    /// Station context
    #[serde(default)]
    pub station_id: Option<i32>,
    /// Command kind (e.g., "Ping", "Backup")
    pub command_type: String,
    /// Program the command relates to
    #[serde(default)]
    pub program_name: Option<String>,
    /// Free-form parameters
    #[serde(default)]
    pub parameters: Option<String>,
    /// Delivery priority; lower first, defaults to 5
    #[serde(default)]
    pub priority: Option<i32>,
    /// Earliest delivery time
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Status report from an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// New status name: Pending, Sent, Executed or Error
    pub status: String,
    /// Result text
    #[serde(default)]
    pub result_message: Option<String>,
    /// Error text
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Queues a new `Pending` command for an existing machine.
///
/// # Errors
/// Returns an error if the command type is blank, the machine does not exist,
/// or the insert fails.
pub async fn create_command(db: &DatabaseConnection, input: CommandInput) -> Result<command::Model> {
    let command_type = input.command_type.trim().to_string();
    if command_type.is_empty() {
        return Err(Error::validation("Command type is required"));
    }
    if Machine::find_by_id(input.machine_id).one(db).await?.is_none() {
        return Err(Error::InvalidReference {
            entity: "Machine",
            id: input.machine_id.into(),
        });
    }

    let created = command::ActiveModel {
        machine_id: Set(input.machine_id),
        station_id: Set(input.station_id),
        command_type: Set(command_type),
        program_name: Set(optional_text(input.program_name)),
        parameters: Set(input.parameters),
        status: Set(CommandStatus::Pending),
        priority: Set(input.priority.unwrap_or(DEFAULT_PRIORITY)),
        created_time: Set(Utc::now()),
        scheduled_at: Set(input.scheduled_at),
        sent_time: Set(None),
        executed_time: Set(None),
        result_message: Set(None),
        error_message: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        command_id = created.command_id,
        machine_id = created.machine_id,
        command_type = %created.command_type,
        "Command queued"
    );
    Ok(created)
}

/// Retrieves a specific command by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_command_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<command::Model>> {
    Command::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Lists all commands, newest first, optionally filtered by status.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_commands(
    db: &DatabaseConnection,
    status: Option<CommandStatus>,
) -> Result<Vec<command::Model>> {
    let mut query = Command::find();
    if let Some(status) = status {
        query = query.filter(command::Column::Status.eq(status));
    }
    query
        .order_by_desc(command::Column::CreatedTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the commands of a machine, newest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_commands_for_machine(
    db: &DatabaseConnection,
    machine_id: i32,
) -> Result<Vec<command::Model>> {
    Command::find()
        .filter(command::Column::MachineId.eq(machine_id))
        .order_by_desc(command::Column::CreatedTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the commands a machine's agent should execute now.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_pending_commands(
    db: &DatabaseConnection,
    machine_id: i32,
) -> Result<Vec<command::Model>> {
    Command::find()
        .filter(command::Column::MachineId.eq(machine_id))
        .filter(command::Column::Status.eq(CommandStatus::Pending))
        .filter(
            Condition::any()
                .add(command::Column::ScheduledAt.is_null())
                .add(command::Column::ScheduledAt.lte(Utc::now())),
        )
        .order_by_asc(command::Column::Priority)
        .order_by_asc(command::Column::CreatedTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sets the status of a command and stamps the matching time.
///
/// `Sent` stamps `sent_time`; `Executed` and `Error` stamp `executed_time`.
/// Result and error messages replace the stored ones when given.
///
/// # Errors
/// Returns an error if the status name is unknown, the command does not
/// exist, or the update fails.
pub async fn update_command_status(
    db: &DatabaseConnection,
    id: i32,
    update: StatusUpdate,
) -> Result<command::Model> {
    let status: CommandStatus = update.status.parse().map_err(Error::validation)?;
    let existing = get_command_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Command", id))?;

    let now = Utc::now();
    let mut active: command::ActiveModel = existing.into();
    active.status = Set(status);
    match status {
        CommandStatus::Sent => active.sent_time = Set(Some(now)),
        CommandStatus::Executed | CommandStatus::Error => active.executed_time = Set(Some(now)),
        CommandStatus::Pending => {}
    }
    if update.result_message.is_some() {
        active.result_message = Set(update.result_message);
    }
    if update.error_message.is_some() {
        active.error_message = Set(update.error_message);
    }

    let updated = active.update(db).await?;
    info!(command_id = id, %status, "Command status updated");
    Ok(updated)
}

/// Deletes a command.
///
/// # Errors
/// Returns an error if the command does not exist or the delete fails.
pub async fn delete_command(db: &DatabaseConnection, id: i32) -> Result<()> {
    let result = Command::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Command", id));
    }
    Ok(())
}
