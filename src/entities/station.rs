//! Station entity - A work position on a line that executes one model process.
//!
//! Stations connect the physical layout (lines) with the product hierarchy
//! (model processes). Machines are installed at stations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Station database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "stations")]
pub struct Model {
    /// Unique identifier for the station
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Station name
    pub name: String,
    /// ID of the line the station sits on
    pub line_id: i32,
    /// ID of the model process performed at this station
    pub model_process_id: i32,
}

/// Defines relationships between Station and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each station belongs to one line
    #[sea_orm(
        belongs_to = "super::line::Entity",
        from = "Column::LineId",
        to = "super::line::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Line,
    /// Each station performs one model process
    #[sea_orm(
        belongs_to = "super::model_process::Entity",
        from = "Column::ModelProcessId",
        to = "super::model_process::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    ModelProcess,
    /// One station hosts many machines
    #[sea_orm(has_many = "super::machine::Entity")]
    Machines,
}

impl Related<super::line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Line.def()
    }
}

impl Related<super::model_process::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelProcess.def()
    }
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
