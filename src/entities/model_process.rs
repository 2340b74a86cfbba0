//! Model process entity - A manufacturing process step for a product model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Model process database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "model_processes")]
pub struct Model {
    /// Unique identifier for the process
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Process name (e.g., "SMT", "Final Test")
    pub name: String,
    /// ID of the product model this process belongs to
    pub model_id: i32,
}

/// Defines relationships between `ModelProcess` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each process belongs to one model
    #[sea_orm(
        belongs_to = "super::model::Entity",
        from = "Column::ModelId",
        to = "super::model::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    ProductModel,
    /// One process runs on many stations
    #[sea_orm(has_many = "super::station::Entity")]
    Stations,
}

impl Related<super::model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductModel.def()
    }
}

impl Related<super::station::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
