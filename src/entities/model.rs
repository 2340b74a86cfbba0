//! Model entity - A product model manufactured for a buyer.
//!
//! Models sit under a model group and own the model processes that
//! describe how they are built.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product model database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "models")]
pub struct Model {
    /// Unique identifier for the model
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Model name (e.g., "SM-A156"), unique
    #[sea_orm(unique)]
    pub name: String,
    /// ID of the model group this model belongs to
    pub model_group_id: i32,
}

/// Defines relationships between Model and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each model belongs to one model group
    #[sea_orm(
        belongs_to = "super::model_group::Entity",
        from = "Column::ModelGroupId",
        to = "super::model_group::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    ModelGroup,
    /// One model has many model processes
    #[sea_orm(has_many = "super::model_process::Entity")]
    ModelProcesses,
    /// Log rows may reference the model being produced
    #[sea_orm(has_many = "super::log_data::Entity")]
    LogData,
}

impl Related<super::model_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelGroup.def()
    }
}

impl Related<super::model_process::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelProcesses.def()
    }
}

impl Related<super::log_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LogData.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
