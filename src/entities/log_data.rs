//! Log data entity - One log line uploaded by a machine's agent.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Log row database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "log_data")]
pub struct Model {
    /// Unique identifier for the log row
    #[sea_orm(primary_key)]
    pub log_id: i64,
    /// Machine that produced the line
    pub machine_id: i32,
    /// Log file the line came from, if tracked
    pub file_id: Option<i32>,
    /// Station context, if known
    pub station_id: Option<i32>,
    /// Product model context, if known
    pub model_id: Option<i32>,
    /// Level such as "INFO", "WARN", "ERROR"
    pub log_level: String,
    /// Log message
    #[sea_orm(column_type = "Text")]
    pub message: String,
    /// Extra details
    #[sea_orm(column_type = "Text", nullable)]
    pub details: Option<String>,
    /// Source of the line, usually a file name
    pub source: Option<String>,
    /// Free-form category (e.g., "monitor")
    pub category: Option<String>,
    /// Product identifier the line refers to
    pub pid: Option<String>,
    /// Test or process result
    pub result: Option<String>,
    /// The unparsed line
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_data: Option<String>,
    /// When the event happened on the machine
    pub log_timestamp: DateTimeUtc,
    /// When the server received the row
    pub received_time: DateTimeUtc,
}

/// Defines relationships between `LogData` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each row belongs to one machine and is removed with it
    #[sea_orm(
        belongs_to = "super::machine::Entity",
        from = "Column::MachineId",
        to = "super::machine::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Machine,
    /// Rows are removed with their log file
    #[sea_orm(
        belongs_to = "super::log_file::Entity",
        from = "Column::FileId",
        to = "super::log_file::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    LogFile,
    /// Product model context
    #[sea_orm(
        belongs_to = "super::model::Entity",
        from = "Column::ModelId",
        to = "super::model::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    ProductModel,
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machine.def()
    }
}

impl Related<super::log_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LogFile.def()
    }
}

impl Related<super::model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductModel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Level given to rows uploaded without one
pub const DEFAULT_LEVEL: &str = "Info";
