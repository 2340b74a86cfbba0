//! Production line business logic.

use super::required_text;
use crate::{
    entities::{Line, Station, line, station},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

const MAX_NAME_LEN: usize = 20;

/// Payload for creating or replacing a line
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineInput {
    /// Line name
    pub name: String,
}

/// Retrieves all lines ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_lines(db: &DatabaseConnection) -> Result<Vec<line::Model>> {
    Line::find()
        .order_by_asc(line::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific line by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_line_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<line::Model>> {
    Line::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Finds a line by its exact name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_line_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<line::Model>> {
    Line::find()
        .filter(line::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new line.
///
/// # Errors
/// Returns an error if the name is blank or too long, or the insert fails.
pub async fn create_line(db: &DatabaseConnection, name: String) -> Result<line::Model> {
    let name = required_text("Name", &name, MAX_NAME_LEN)?;
    let created = line::ActiveModel {
        name: Set(name),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(line_id = created.id, name = %created.name, "Line created");
    Ok(created)
}

/// Renames an existing line.
///
/// # Errors
/// Returns an error if the line does not exist, the name is invalid, or the
/// update fails.
pub async fn update_line(db: &DatabaseConnection, id: i32, name: String) -> Result<line::Model> {
    let name = required_text("Name", &name, MAX_NAME_LEN)?;
    let existing = get_line_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Line", id))?;

    let mut active: line::ActiveModel = existing.into();
    active.name = Set(name);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a line that has no stations.
///
/// # Errors
/// Returns an error if the line does not exist, still has stations, or the
/// delete fails.
pub async fn delete_line(db: &DatabaseConnection, id: i32) -> Result<()> {
    let existing = get_line_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Line", id))?;

    let stations = Station::find()
        .filter(station::Column::LineId.eq(id))
        .count(db)
        .await?;
    if stations > 0 {
        return Err(Error::HasDependents {
            entity: "line",
            name: existing.name,
            count: stations,
            dependents: "stations",
        });
    }

    Line::delete_by_id(id).exec(db).await?;
    info!(line_id = id, "Line deleted");
    Ok(())
}
