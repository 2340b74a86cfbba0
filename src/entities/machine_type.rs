//! Machine type entity - Catalogue of equipment kinds (e.g., "ICT", "FCT").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Machine type database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "machine_types")]
pub struct Model {
    /// Unique identifier for the machine type
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Type name, unique
    #[sea_orm(unique)]
    pub name: String,
}

/// Defines relationships between `MachineType` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One machine type is used by many machines
    #[sea_orm(has_many = "super::machine::Entity")]
    Machines,
}

impl Related<super::machine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Machines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
