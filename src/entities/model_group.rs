//! Model group entity - A family of product models belonging to one buyer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Model group database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "model_groups")]
pub struct Model {
    /// Unique identifier for the model group
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Group name, unique across all buyers
    #[sea_orm(unique)]
    pub name: String,
    /// ID of the owning buyer
    pub buyer_id: i32,
}

/// Defines relationships between `ModelGroup` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each model group belongs to one buyer; a buyer with groups cannot be deleted
    #[sea_orm(
        belongs_to = "super::buyer::Entity",
        from = "Column::BuyerId",
        to = "super::buyer::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Buyer,
    /// One model group has many models
    #[sea_orm(has_many = "super::model::Entity")]
    Models,
}

impl Related<super::buyer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<super::model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Models.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
