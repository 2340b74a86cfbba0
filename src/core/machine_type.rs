//! Machine type catalogue.

use super::required_text;
use crate::{
    entities::{Machine, MachineType, machine, machine_type},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

const MAX_NAME_LEN: usize = 45;

/// Payload for creating or replacing a machine type
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineTypeInput {
    /// Unique type name
    pub name: String,
}

/// Retrieves all machine types ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_machine_types(db: &DatabaseConnection) -> Result<Vec<machine_type::Model>> {
    MachineType::find()
        .order_by_asc(machine_type::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific machine type by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_machine_type_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<machine_type::Model>> {
    MachineType::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Finds a machine type by its exact name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_machine_type_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<machine_type::Model>> {
    MachineType::find()
        .filter(machine_type::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn ensure_unique(db: &DatabaseConnection, name: &str, exclude_id: Option<i32>) -> Result<()> {
    let mut query = MachineType::find().filter(machine_type::Column::Name.eq(name));
    if let Some(id) = exclude_id {
        query = query.filter(machine_type::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::Duplicate {
            entity: "Machine type",
            field: "name",
            value: name.to_string(),
        });
    }
    Ok(())
}

/// Creates a new machine type.
///
/// # Errors
/// Returns an error if the name is invalid or taken, or the insert fails.
pub async fn create_machine_type(
    db: &DatabaseConnection,
    name: String,
) -> Result<machine_type::Model> {
    let name = required_text("Name", &name, MAX_NAME_LEN)?;
    ensure_unique(db, &name, None).await?;

    let created = machine_type::ActiveModel {
        name: Set(name),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(machine_type_id = created.id, name = %created.name, "Machine type created");
    Ok(created)
}

/// Renames an existing machine type.
///
/// # Errors
/// Returns an error if the type does not exist, the name is invalid or taken,
/// or the update fails.
pub async fn update_machine_type(
    db: &DatabaseConnection,
    id: i32,
    name: String,
) -> Result<machine_type::Model> {
    let name = required_text("Name", &name, MAX_NAME_LEN)?;
    let existing = get_machine_type_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Machine type", id))?;
    ensure_unique(db, &name, Some(id)).await?;

    let mut active: machine_type::ActiveModel = existing.into();
    active.name = Set(name);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a machine type no machine uses.
///
/// # Errors
/// Returns an error if the type does not exist, is in use, or the delete
/// fails.
pub async fn delete_machine_type(db: &DatabaseConnection, id: i32) -> Result<()> {
    let existing = get_machine_type_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Machine type", id))?;

    let machines = Machine::find()
        .filter(machine::Column::MachineTypeId.eq(id))
        .count(db)
        .await?;
    if machines > 0 {
        return Err(Error::HasDependents {
            entity: "machine type",
            name: existing.name,
            count: machines,
            dependents: "machines",
        });
    }

    MachineType::delete_by_id(id).exec(db).await?;
    info!(machine_type_id = id, "Machine type deleted");
    Ok(())
}
