//! Log row business logic - batch upload, filtered paging and retention.
//!
//! Batches are written in a single transaction so an upload either lands
//! completely or not at all. The uploading machine's `last_log_time` moves
//! forward to the newest timestamp in the batch.

use super::optional_text;
use crate::{
    entities::{LogData, Machine, log_data, log_data::DEFAULT_LEVEL, machine},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Largest accepted page size for log queries
pub const MAX_PAGE_SIZE: u64 = 1000;
const DEFAULT_PAGE_SIZE: u64 = 50;
// Keeps each INSERT well under SQLite's bound-parameter limit
const INSERT_CHUNK: usize = 500;

/// One log line as uploaded by an agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewLogEntry {
    /// Log file the line came from
    pub file_id: Option<i32>,
    /// Station context
    pub station_id: Option<i32>,
    /// Product model context
    pub model_id: Option<i32>,
    /// Level; "Info" when absent
    pub log_level: Option<String>,
    /// Message text
    pub message: String,
    /// Extra details
    pub details: Option<String>,
    /// Source, usually a file name
    pub source: Option<String>,
    /// Category (e.g., "monitor")
    pub category: Option<String>,
    /// Product identifier
    pub pid: Option<String>,
    /// Process result
    pub result: Option<String>,
    /// Unparsed line
    pub raw_data: Option<String>,
    /// Event time on the machine; upload time when absent
    pub log_timestamp: Option<DateTime<Utc>>,
}

/// A single log row for a given machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryInput {
    /// Machine the row belongs to
    pub machine_id: i32,
    /// The row itself
    #[serde(flatten)]
    pub entry: NewLogEntry,
}

/// A batch of log rows from one machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBatch {
    /// Machine the rows belong to
    pub machine_id: i32,
    /// The rows
    pub entries: Vec<NewLogEntry>,
}

/// Filter and paging parameters for log queries
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogQuery {
    /// Only rows of this machine
    pub machine_id: Option<i32>,
    /// Only rows of the machine with this asset code
    pub machine_code: Option<String>,
    /// Only rows with this level (case-sensitive)
    pub log_level: Option<String>,
    /// Rows at or after this time
    pub start_date: Option<DateTime<Utc>>,
    /// Rows at or before this time
    pub end_date: Option<DateTime<Utc>>,
    /// 1-based page number
    pub page: Option<u64>,
    /// Rows per page, at most 1000
    pub page_size: Option<u64>,
}

/// One page of log rows
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    /// Rows on this page, newest first
    pub items: Vec<log_data::Model>,
    /// Rows matching the filter
    pub total_count: u64,
    /// 1-based page number
    pub page: u64,
    /// Requested page size
    pub page_size: u64,
    /// Number of pages
    pub total_pages: u64,
}

fn to_active(
    machine_id: i32,
    entry: NewLogEntry,
    received: DateTime<Utc>,
) -> log_data::ActiveModel {
    let level = optional_text(entry.log_level).unwrap_or_else(|| DEFAULT_LEVEL.to_string());
    log_data::ActiveModel {
        machine_id: Set(machine_id),
        file_id: Set(entry.file_id),
        station_id: Set(entry.station_id),
        model_id: Set(entry.model_id),
        log_level: Set(level),
        message: Set(entry.message),
        details: Set(entry.details),
        source: Set(entry.source),
        category: Set(entry.category),
        pid: Set(entry.pid),
        result: Set(entry.result),
        raw_data: Set(entry.raw_data),
        log_timestamp: Set(entry.log_timestamp.unwrap_or(received)),
        received_time: Set(received),
        ..Default::default()
    }
}

async fn ensure_machine(db: &DatabaseConnection, machine_id: i32) -> Result<machine::Model> {
    Machine::find_by_id(machine_id)
        .one(db)
        .await?
        .ok_or(Error::InvalidReference {
            entity: "Machine",
            id: machine_id.into(),
        })
}

/// Stores a batch of log rows atomically. Returns the number of rows stored.
///
/// # Errors
/// Returns an error if:
/// - The batch is empty
/// - The machine does not exist
/// - Any insert fails (nothing is stored in that case)
pub async fn upload_batch(db: &DatabaseConnection, batch: LogBatch) -> Result<usize> {
    if batch.entries.is_empty() {
        return Err(Error::validation("Log batch cannot be empty"));
    }
    let machine = ensure_machine(db, batch.machine_id).await?;

    let received = Utc::now();
    let count = batch.entries.len();
    let newest = batch
        .entries
        .iter()
        .map(|e| e.log_timestamp.unwrap_or(received))
        .max();
    let rows: Vec<log_data::ActiveModel> = batch
        .entries
        .into_iter()
        .map(|e| to_active(batch.machine_id, e, received))
        .collect();

    let txn = db.begin().await?;
    for chunk in rows.chunks(INSERT_CHUNK) {
        LogData::insert_many(chunk.to_vec()).exec(&txn).await?;
    }

    if newest > machine.last_log_time {
        let mut active: machine::ActiveModel = machine.into();
        active.last_log_time = Set(newest);
        active.update(&txn).await?;
    }
    txn.commit().await?;

    info!(machine_id = batch.machine_id, count, "Log batch stored");
    Ok(count)
}

/// Stores a single log row.
///
/// # Errors
/// Returns an error if the machine does not exist or the insert fails.
pub async fn add_log(db: &DatabaseConnection, input: LogEntryInput) -> Result<log_data::Model> {
    ensure_machine(db, input.machine_id).await?;
    let row = to_active(input.machine_id, input.entry, Utc::now())
        .insert(db)
        .await?;
    debug!(log_id = row.log_id, machine_id = row.machine_id, "Log row stored");
    Ok(row)
}

/// Retrieves a specific log row by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_log_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<log_data::Model>> {
    LogData::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Runs a filtered, paged log query, newest first.
///
/// # Errors
/// Returns an error if the page number is zero or too large to address, if
/// the page size is zero or above [`MAX_PAGE_SIZE`], or if the query fails.
pub async fn query_logs(db: &DatabaseConnection, query: LogQuery) -> Result<LogPage> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page == 0 {
        return Err(Error::validation("Page number must be at least 1"));
    }
    if page_size == 0 {
        return Err(Error::validation("Page size must be at least 1"));
    }
    if page_size > MAX_PAGE_SIZE {
        return Err(Error::validation("Page size cannot exceed 1000"));
    }
    let in_range = (page - 1)
        .checked_mul(page_size)
        .is_some_and(|offset| i64::try_from(offset).is_ok());
    if !in_range {
        return Err(Error::validation(format!("Page number {page} is out of range")));
    }

    let mut select = LogData::find();
    if let Some(machine_id) = query.machine_id {
        select = select.filter(log_data::Column::MachineId.eq(machine_id));
    }
    if let Some(code) = optional_text(query.machine_code) {
        let ids: Vec<i32> = Machine::find()
            .filter(machine::Column::MachineCode.eq(code))
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        select = select.filter(log_data::Column::MachineId.is_in(ids));
    }
    if let Some(level) = optional_text(query.log_level) {
        select = select.filter(log_data::Column::LogLevel.eq(level));
    }
    if let Some(start) = query.start_date {
        select = select.filter(log_data::Column::LogTimestamp.gte(start));
    }
    if let Some(end) = query.end_date {
        select = select.filter(log_data::Column::LogTimestamp.lte(end));
    }

    let paginator = select
        .order_by_desc(log_data::Column::LogTimestamp)
        .order_by_desc(log_data::Column::LogId)
        .paginate(db, page_size);
    let totals = paginator.num_items_and_pages().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(LogPage {
        items,
        total_count: totals.number_of_items,
        page,
        page_size,
        total_pages: totals.number_of_pages,
    })
}

/// Lists the log rows of a machine, newest first, optionally within a range.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_logs_for_machine(
    db: &DatabaseConnection,
    machine_id: i32,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<log_data::Model>> {
    let mut select = LogData::find().filter(log_data::Column::MachineId.eq(machine_id));
    if let Some(start) = start {
        select = select.filter(log_data::Column::LogTimestamp.gte(start));
    }
    if let Some(end) = end {
        select = select.filter(log_data::Column::LogTimestamp.lte(end));
    }
    select
        .order_by_desc(log_data::Column::LogTimestamp)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes a log row.
///
/// # Errors
/// Returns an error if the row does not exist or the delete fails.
pub async fn delete_log(db: &DatabaseConnection, id: i64) -> Result<()> {
    let result = LogData::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Log", id));
    }
    Ok(())
}

/// Deletes log rows whose timestamp is more than `days` days old.
/// Returns the number of rows deleted.
///
/// # Errors
/// Returns an error if `days` is not positive or the delete fails.
pub async fn cleanup_old_logs(db: &DatabaseConnection, days: i64) -> Result<u64> {
    if days <= 0 {
        return Err(Error::validation("Days must be a positive number"));
    }
    let cutoff = chrono::Duration::try_days(days)
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let result = LogData::delete_many()
        .filter(log_data::Column::LogTimestamp.lt(cutoff))
        .exec(db)
        .await?;

    info!(days, deleted = result.rows_affected, "Old logs cleaned up");
    Ok(result.rows_affected)
}
