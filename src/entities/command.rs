//! Command entity - Work queued by operators for a machine's agent.
//!
//! Agents poll for `Pending` commands, mark them `Sent` when picked up and
//! `Executed` or `Error` when finished.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a command, persisted as its variant name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum CommandStatus {
    /// Waiting to be picked up by the agent
    #[sea_orm(string_value = "Pending")]
    Pending,
    /// Delivered to the agent
    #[sea_orm(string_value = "Sent")]
    Sent,
    /// Finished successfully
    #[sea_orm(string_value = "Executed")]
    Executed,
    /// Finished with an error
    #[sea_orm(string_value = "Error")]
    Error,
}

impl CommandStatus {
    /// The persisted and wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Sent => "Sent",
            Self::Executed => "Executed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = String;

    /// Parses a status name, ignoring ASCII case
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim();
        match name.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "executed" => Ok(Self::Executed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown command status '{name}'")),
        }
    }
}

/// Command database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "commands")]
pub struct Model {
    /// Unique identifier for the command
    #[sea_orm(primary_key)]
    pub command_id: i32,
    /// Target machine
    pub machine_id: i32,
    /// Station context, if any
    pub station_id: Option<i32>,
    /// Command kind understood by the agent (e.g., "Ping", "Backup")
    pub command_type: String,
    /// Program the command relates to
    pub program_name: Option<String>,
    /// Free-form parameters, usually JSON
    #[sea_orm(column_type = "Text", nullable)]
    pub parameters: Option<String>,
    /// Current lifecycle status
    pub status: CommandStatus,
    /// Lower values are delivered first
    pub priority: i32,
    /// When the command was queued
    pub created_time: DateTimeUtc,
    /// Earliest time the command may be delivered
    pub scheduled_at: Option<DateTimeUtc>,
    /// When the agent picked the command up
    pub sent_time: Option<DateTimeUtc>,
    /// When the agent finished the command
    pub executed_time: Option<DateTimeUtc>,
    /// Result text reported by the agent
    #[sea_orm(column_type = "Text", nullable)]
    pub result_message: Option<String>,
    /// Error text reported by the agent
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
}

/// Defines relationships between Command and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each command targets one machine and is removed with it
    #[sea_orm(
        belongs_to = "super::machine::Entity",
        from = "Column::MachineId",
        to = "super::machine::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Machine,
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Priority assigned when the caller does not give one
pub const DEFAULT_PRIORITY: i32 = 5;
