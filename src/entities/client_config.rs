//! Client configuration entity - Key/value settings pushed to a machine's agent.
//!
//! `(machine_id, config_key)` is unique; the index is created next to the
//! table in `config::database`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Client configuration database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "client_configs")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub config_id: i32,
    /// Machine the entry applies to
    pub machine_id: i32,
    /// Setting name
    pub config_key: String,
    /// Setting value
    #[sea_orm(column_type = "Text")]
    pub config_value: String,
    /// Hint for the agent on how to parse the value (e.g., "int", "bool")
    pub data_type: Option<String>,
    /// Human-readable description
    pub description: Option<String>,
    /// Last modification time
    pub updated_time: DateTimeUtc,
}

/// Defines relationships between `ClientConfig` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one machine and is removed with it
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
