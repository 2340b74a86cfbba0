//! Log file entity - Metadata for a log file uploaded by a machine.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Log file database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "log_files")]
pub struct Model {
    /// Unique identifier for the log file
    #[sea_orm(primary_key)]
    pub id: i32,
    /// File name as found on the machine
    pub file_name: String,
    /// Machine that produced the file
    pub machine_id: i32,
    /// Day the file covers
    pub date_created: Date,
    /// Size in bytes
    pub file_size: i64,
    /// Processing status (e.g., "Processing", "Processed")
    pub status: String,
    /// When the row was created
    pub created_time: DateTimeUtc,
}

/// Defines relationships between `LogFile` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each file belongs to one machine and is removed with it
    #[sea_orm(
        belongs_to = "super::machine::Entity",
        from = "Column::MachineId",
        to = "super::machine::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Machine,
    /// Parsed log rows of this file
    #[sea_orm(has_many = "super::log_data::Entity")]
    LogData,
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machine.def()
    }
}

impl Related<super::log_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LogData.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Status given to new log files
pub const STATUS_PROCESSING: &str = "Processing";
