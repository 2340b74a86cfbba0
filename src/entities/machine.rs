//! Machine entity - A piece of factory equipment running the agent.
//!
//! Machines are identified by MAC address first and IP second when they
//! register. They are optionally installed at a station and typed by a
//! machine type. Commands, logs, log files and client configuration rows
//! belong to a machine and are removed with it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Machine database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "machines")]
pub struct Model {
    /// Unique identifier for the machine
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Display name
    pub name: String,
    /// Asset code, unique when present
    #[sea_orm(unique)]
    pub machine_code: Option<String>,
    /// Free-form operator status (e.g., "Running", "Maintenance")
    pub status: Option<String>,
    /// Machine type, if classified
    pub machine_type_id: Option<i32>,
    /// Current IPv4 address, unique when present
    #[sea_orm(unique)]
    pub ip: Option<String>,
    /// Name in the manufacturing execution system
    pub gmes_name: Option<String>,
    /// Station the machine is installed at
    pub station_id: Option<i32>,
    /// Program currently loaded on the machine
    pub program_name: Option<String>,
    /// Upper-case, colon-separated MAC address, unique when present
    #[sea_orm(unique)]
    pub mac_address: Option<String>,
    /// Timestamp of the newest uploaded log row
    pub last_log_time: Option<DateTimeUtc>,
    /// Agent version reported at registration
    pub app_version: Option<String>,
    /// Connectivity status: "Online" or "Offline"
    pub client_status: String,
    /// Last time the agent registered or sent a heartbeat
    pub last_seen: Option<DateTimeUtc>,
    /// When the machine row was created
    pub created_at: DateTimeUtc,
    /// When the machine row was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Machine and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Station the machine is installed at
    #[sea_orm(
        belongs_to = "super::station::Entity",
        from = "Column::StationId",
        to = "super::station::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Station,
    /// Machine type classification
    #[sea_orm(
        belongs_to = "super::machine_type::Entity",
        from = "Column::MachineTypeId",
        to = "super::machine_type::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    MachineType,
    /// Commands queued for this machine
    #[sea_orm(has_many = "super::command::Entity")]
    Commands,
    /// Log rows uploaded by this machine
    #[sea_orm(has_many = "super::log_data::Entity")]
    LogData,
    /// Log files uploaded by this machine
    #[sea_orm(has_many = "super::log_file::Entity")]
    LogFiles,
    /// Per-machine configuration entries
    #[sea_orm(has_many = "super::client_config::Entity")]
    ClientConfigs,
}

impl Related<super::station::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Station.def()
    }
}

impl Related<super::machine_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MachineType.def()
    }
}

impl Related<super::command::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commands.def()
    }
}

impl Related<super::log_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LogData.def()
    }
}

impl Related<super::log_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LogFiles.def()
    }
}

impl Related<super::client_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientConfigs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Connectivity value stored in `client_status` for machines seen recently
pub const ONLINE: &str = "Online";
/// Connectivity value stored in `client_status` for machines not seen recently
pub const OFFLINE: &str = "Offline";
