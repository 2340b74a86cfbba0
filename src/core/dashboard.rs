//! Dashboard aggregation - metrics, alerts and the recent activity feed.
//!
//! Error logs are matched on level case-insensitively because agents report
//! levels in whatever case the machine software writes them.

use crate::{
    entities::{
        Command, CommandStatus, LogData, Machine, command, log_data,
        machine::{self, ONLINE},
    },
    errors::Result,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    QueryOrder, QuerySelect,
    prelude::*,
    sea_query::{Expr, Func, SimpleExpr},
};
use serde::Serialize;
use std::collections::HashMap;

/// More error logs than this within the last hour raise an alert
pub const ERROR_RATE_THRESHOLD: u64 = 10;
const DESCRIPTION_LIMIT: usize = 50;

/// Headline numbers for the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    /// All machines
    pub total_machines: u64,
    /// Machines reporting heartbeats
    pub online_machines: u64,
    /// Machines not reporting heartbeats
    pub offline_machines: u64,
    /// Machines whose operator status is "Error"
    pub error_machines: u64,
    /// All stored log rows
    pub total_logs: u64,
    /// Log rows timestamped today (UTC)
    pub today_logs: u64,
    /// Commands waiting for delivery
    pub pending_commands: u64,
    /// Commands finished successfully
    pub executed_commands: u64,
    /// When the numbers were computed
    pub last_updated: DateTime<Utc>,
}

/// Something an operator should look at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Alert kind: `MachineOffline`, `CommandFailed` or `HighErrorRate`
    pub kind: String,
    /// Human-readable summary
    pub message: String,
    /// "Warning" or "Error"
    pub severity: String,
}

/// One entry of the recent activity feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Command ID or log ID
    pub id: i64,
    /// "Command" or "Error"
    pub kind: String,
    /// Short description, at most 50 characters plus an ellipsis
    pub description: String,
    /// Machine involved
    pub machine_id: i32,
    /// Its name, "Unknown" if it no longer exists
    pub machine_name: String,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Command status or log level
    pub status: String,
}

fn is_error_level() -> SimpleExpr {
    Expr::expr(Func::upper(Expr::col(log_data::Column::LogLevel))).eq("ERROR")
}

fn truncate(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_LIMIT {
        let head: String = text.chars().take(DESCRIPTION_LIMIT).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Computes the dashboard headline numbers.
///
/// # Errors
/// Returns an error if a count query fails.
pub async fn get_metrics(db: &DatabaseConnection) -> Result<DashboardMetrics> {
    let total_machines = Machine::find().count(db).await?;
    let online_machines = Machine::find()
        .filter(machine::Column::ClientStatus.eq(ONLINE))
        .count(db)
        .await?;
    let error_machines = Machine::find()
        .filter(machine::Column::Status.eq("Error"))
        .count(db)
        .await?;

    let total_logs = LogData::find().count(db).await?;
    let midnight = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or_else(Utc::now);
    let today_logs = LogData::find()
        .filter(log_data::Column::LogTimestamp.gte(midnight))
        .count(db)
        .await?;

    let pending_commands = Command::find()
        .filter(command::Column::Status.eq(CommandStatus::Pending))
        .count(db)
        .await?;
    let executed_commands = Command::find()
        .filter(command::Column::Status.eq(CommandStatus::Executed))
        .count(db)
        .await?;

    Ok(DashboardMetrics {
        total_machines,
        online_machines,
        offline_machines: total_machines.saturating_sub(online_machines),
        error_machines,
        total_logs,
        today_logs,
        pending_commands,
        executed_commands,
        last_updated: Utc::now(),
    })
}

/// Builds the list of active alerts.
///
/// # Errors
/// Returns an error if a count query fails.
pub async fn get_alerts(db: &DatabaseConnection) -> Result<Vec<Alert>> {
    let mut alerts = Vec::new();

    let offline = Machine::find()
        .filter(machine::Column::ClientStatus.ne(ONLINE))
        .count(db)
        .await?;
    if offline > 0 {
        alerts.push(Alert {
            kind: "MachineOffline".to_string(),
            message: format!("{offline} machine(s) are offline"),
            severity: "Warning".to_string(),
        });
    }

    let failed = Command::find()
        .filter(command::Column::Status.eq(CommandStatus::Error))
        .count(db)
        .await?;
    if failed > 0 {
        alerts.push(Alert {
            kind: "CommandFailed".to_string(),
            message: format!("{failed} command(s) failed execution"),
            severity: "Error".to_string(),
        });
    }

    let recent_errors = LogData::find()
        .filter(is_error_level())
        .filter(log_data::Column::LogTimestamp.gt(Utc::now() - Duration::hours(1)))
        .count(db)
        .await?;
    if recent_errors > ERROR_RATE_THRESHOLD {
        alerts.push(Alert {
            kind: "HighErrorRate".to_string(),
            message: format!("{recent_errors} error logs in the last hour"),
            severity: "Warning".to_string(),
        });
    }

    Ok(alerts)
}

/// Merges the latest commands and error logs into one feed, newest first.
///
/// Half of `count` comes from each source before merging.
///
/// # Errors
/// Returns an error if a query fails.
pub async fn get_recent_activities(db: &DatabaseConnection, count: u64) -> Result<Vec<Activity>> {
    let half = (count / 2).max(1);

    let commands = Command::find()
        .order_by_desc(command::Column::CreatedTime)
        .limit(half)
        .all(db)
        .await?;
    let errors = LogData::find()
        .filter(is_error_level())
        .order_by_desc(log_data::Column::LogTimestamp)
        .limit(half)
        .all(db)
        .await?;

    let names: HashMap<i32, String> = Machine::find()
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();
    let name_of = |id: i32| {
        names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    };

    let mut activities: Vec<Activity> = commands
        .into_iter()
        .map(|c| Activity {
            id: c.command_id.into(),
            kind: "Command".to_string(),
            description: truncate(&format!("Command '{}' {}", c.command_type, c.status)),
            machine_id: c.machine_id,
            machine_name: name_of(c.machine_id),
            timestamp: c.executed_time.unwrap_or(c.created_time),
            status: c.status.to_string(),
        })
        .chain(errors.into_iter().map(|l| Activity {
            id: l.log_id,
            kind: "Error".to_string(),
            description: truncate(&l.message),
            machine_id: l.machine_id,
            machine_name: name_of(l.machine_id),
            timestamp: l.log_timestamp,
            status: l.log_level,
        }))
        .collect();

    activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    activities.truncate(usize::try_from(count).unwrap_or(usize::MAX));
    Ok(activities)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::command::{CommandInput, StatusUpdate, create_command, update_command_status};
    use crate::core::log::{LogBatch, NewLogEntry, upload_batch};
    use crate::core::machine::heartbeat;
    use crate::test_utils::*;

    fn error_entry(message: &str, minutes_ago: i64) -> NewLogEntry {
        NewLogEntry {
            log_level: Some("ERROR".to_string()),
            message: message.to_string(),
            log_timestamp: Some(Utc::now() - Duration::minutes(minutes_ago)),
            ..Default::default()
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(60);
        let cut = truncate(&long);
        assert_eq!(cut.len(), 53);
        assert!(cut.ends_with("..."));
    }

    #[tokio::test]
    async fn test_metrics() -> Result<()> {
        let (db, machine) = setup_with_machine().await?;
        create_test_machine(&db, "ICT-02", "10.224.1.99").await?;
        heartbeat(&db, machine.id).await?;
        create_command(
            &db,
            CommandInput {
                machine_id: machine.id,
                command_type: "Ping".to_string(),
                ..Default::default()
            },
        )
        .await?;
        upload_batch(
            &db,
            LogBatch {
                machine_id: machine.id,
                entries: vec![error_entry("boom", 1)],
            },
        )
        .await?;

        let metrics = get_metrics(&db).await?;
        assert_eq!(metrics.total_machines, 2);
        assert_eq!(metrics.online_machines, 1);
        assert_eq!(metrics.offline_machines, 1);
        assert_eq!(metrics.total_logs, 1);
        assert_eq!(metrics.pending_commands, 1);
        assert_eq!(metrics.executed_commands, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_alerts() -> Result<()> {
        let (db, machine) = setup_with_machine().await?;
        let cmd = create_command(
            &db,
            CommandInput {
                machine_id: machine.id,
                command_type: "Backup".to_string(),
                ..Default::default()
            },
        )
        .await?;
        update_command_status(
            &db,
            cmd.command_id,
            StatusUpdate {
                status: "Error".to_string(),
                result_message: None,
                error_message: Some("FTP refused".to_string()),
            },
        )
        .await?;
        let entries = (0..11).map(|i| error_entry("pin contact fail", i)).collect();
        upload_batch(
            &db,
            LogBatch {
                machine_id: machine.id,
                entries,
            },
        )
        .await?;

        let kinds: Vec<String> = get_alerts(&db).await?.into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec!["MachineOffline", "CommandFailed", "HighErrorRate"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_alerts_when_quiet() -> Result<()> {
        let (db, machine) = setup_with_machine().await?;
        heartbeat(&db, machine.id).await?;
        assert!(get_alerts(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_activities_merged_newest_first() -> Result<()> {
        let (db, machine) = setup_with_machine().await?;
        upload_batch(
            &db,
            LogBatch {
                machine_id: machine.id,
                entries: vec![
                    error_entry(&"e".repeat(80), 10),
                    error_entry("older", 20),
                ],
            },
        )
        .await?;
        create_command(
            &db,
            CommandInput {
                machine_id: machine.id,
                command_type: "Ping".to_string(),
                ..Default::default()
            },
        )
        .await?;

        let feed = get_recent_activities(&db, 10).await?;
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].kind, "Command");
        assert_eq!(feed[0].machine_name, "ICT-01");
        assert!(feed[1].description.ends_with("..."));
        assert_eq!(feed[2].description, "older");
        Ok(())
    }
}
