//! Buyer entity - The customer at the top of the factory hierarchy.
//!
//! Each buyer owns model groups. Both `code` and `name` are unique.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Buyer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "buyers")]
pub struct Model {
    /// Unique identifier for the buyer
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Short buyer code (e.g., "SS", "LG")
    #[sea_orm(unique)]
    pub code: String,
    /// Display name of the buyer
    #[sea_orm(unique)]
    pub name: String,
}

/// Defines relationships between Buyer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One buyer has many model groups
    #[sea_orm(has_many = "super::model_group::Entity")]
    ModelGroups,
}

impl Related<super::model_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
