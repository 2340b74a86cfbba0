//! Log file metadata.
//!
//! Deleting a log file also removes the log rows parsed from it.

use super::required_text;
use crate::{
    entities::{LogFile, Machine, log_file, log_file::STATUS_PROCESSING},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Payload for registering a log file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileInput {
    /// File name on the machine
    pub file_name: String,
    /// Machine that produced the file
    pub machine_id: i32,
    /// Day the file covers; today when absent
    #[serde(default)]
    pub date_created: Option<NaiveDate>,
    /// Size in bytes
    #[serde(default)]
    pub file_size: i64,
}

/// Payload for changing a log file's processing status
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileStatusUpdate {
    /// New status (e.g., "Processed", "Failed")
    pub status: String,
}

/// Registers a log file for an existing machine with status `Processing`.
///
/// # Errors
/// Returns an error if the file name is blank, the size is negative, the
/// machine does not exist, or the insert fails.
pub async fn create_log_file(db: &DatabaseConnection, input: LogFileInput) -> Result<log_file::Model> {
    let file_name = required_text("File name", &input.file_name, 255)?;
    if input.file_size < 0 {
        return Err(Error::validation("File size cannot be negative"));
    }
    if Machine::find_by_id(input.machine_id).one(db).await?.is_none() {
        return Err(Error::InvalidReference {
            entity: "Machine",
            id: input.machine_id.into(),
        });
    }

    let now = Utc::now();
    let created = log_file::ActiveModel {
        file_name: Set(file_name),
        machine_id: Set(input.machine_id),
        date_created: Set(input.date_created.unwrap_or_else(|| now.date_naive())),
        file_size: Set(input.file_size),
        status: Set(STATUS_PROCESSING.to_string()),
        created_time: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(log_file_id = created.id, file = %created.file_name, "Log file registered");
    Ok(created)
}

/// Retrieves a specific log file by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_log_file_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<log_file::Model>> {
    LogFile::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Lists log files, newest first, optionally for one machine only.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_log_files(
    db: &DatabaseConnection,
    machine_id: Option<i32>,
) -> Result<Vec<log_file::Model>> {
    let mut query = LogFile::find();
    if let Some(machine_id) = machine_id {
        query = query.filter(log_file::Column::MachineId.eq(machine_id));
    }
    query
        .order_by_desc(log_file::Column::CreatedTime)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sets the processing status of a log file.
///
/// # Errors
/// Returns an error if the status is blank, the file does not exist, or the
/// update fails.
pub async fn update_log_file_status(
    db: &DatabaseConnection,
    id: i32,
    status: &str,
) -> Result<log_file::Model> {
    let status = required_text("Status", status, 20)?;
    let existing = get_log_file_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Log file", id))?;

    let mut active: log_file::ActiveModel = existing.into();
    active.status = Set(status);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a log file and its log rows.
///
/// # Errors
/// Returns an error if the file does not exist or the delete fails.
pub async fn delete_log_file(db: &DatabaseConnection, id: i32) -> Result<()> {
    let result = LogFile::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Log file", id));
    }
    info!(log_file_id = id, "Log file deleted");
    Ok(())
}
