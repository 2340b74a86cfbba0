//! Station business logic.
//!
//! A station sits on a line and performs one model process. Both references
//! are validated on write; a station with machines installed cannot be deleted.

use super::required_text;
use crate::{
    entities::{Line, Machine, ModelProcess, Station, machine, station},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

const MAX_NAME_LEN: usize = 50;

/// Payload for creating or replacing a station
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationInput {
    /// Station name
    pub name: String,
    /// Line the station sits on
    pub line_id: i32,
    /// Process performed at the station
    pub model_process_id: i32,
}

/// Retrieves all stations ordered by line, then name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_stations(db: &DatabaseConnection) -> Result<Vec<station::Model>> {
    Station::find()
        .order_by_asc(station::Column::LineId)
        .order_by_asc(station::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific station by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_station_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<station::Model>> {
    Station::find_by_id(id).one(db).await.map_err(Into::into)
}

async fn validate(db: &DatabaseConnection, input: StationInput) -> Result<StationInput> {
    let name = required_text("Name", &input.name, MAX_NAME_LEN)?;

    if Line::find_by_id(input.line_id).one(db).await?.is_none() {
        return Err(Error::InvalidReference {
            entity: "Line",
            id: input.line_id.into(),
        });
    }
    if ModelProcess::find_by_id(input.model_process_id)
        .one(db)
        .await?
        .is_none()
    {
        return Err(Error::InvalidReference {
            entity: "Model process",
            id: input.model_process_id.into(),
        });
    }

    Ok(StationInput { name, ..input })
}

/// Creates a new station.
///
/// # Errors
/// Returns an error if the name is invalid, the line or model process does
/// not exist, or the insert fails.
pub async fn create_station(db: &DatabaseConnection, input: StationInput) -> Result<station::Model> {
    let input = validate(db, input).await?;

    let created = station::ActiveModel {
        name: Set(input.name),
        line_id: Set(input.line_id),
        model_process_id: Set(input.model_process_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(station_id = created.id, "Station created");
    Ok(created)
}

/// Replaces an existing station.
///
/// # Errors
/// Returns an error if the station does not exist, validation fails, or the
/// update fails.
pub async fn update_station(
    db: &DatabaseConnection,
    id: i32,
    input: StationInput,
) -> Result<station::Model> {
    let existing = get_station_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Station", id))?;
    let input = validate(db, input).await?;

    let mut active: station::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.line_id = Set(input.line_id);
    active.model_process_id = Set(input.model_process_id);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a station with no machines installed.
///
/// # Errors
/// Returns an error if the station does not exist, still hosts machines, or
/// the delete fails.
pub async fn delete_station(db: &DatabaseConnection, id: i32) -> Result<()> {
    let existing = get_station_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Station", id))?;

    let machines = Machine::find()
        .filter(machine::Column::StationId.eq(id))
        .count(db)
        .await?;
    if machines > 0 {
        return Err(Error::HasDependents {
            entity: "station",
            name: existing.name,
            count: machines,
            dependents: "machines",
        });
    }

    Station::delete_by_id(id).exec(db).await?;
    info!(station_id = id, "Station deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_station_validates_references() -> Result<()> {
        let fixture = setup_with_station().await?;

        let bad_line = create_station(
            &fixture.db,
            StationInput {
                name: "ST-02".to_string(),
                line_id: 999,
                model_process_id: fixture.model_process.id,
            },
        )
        .await;
        assert!(matches!(
            bad_line.unwrap_err(),
            Error::InvalidReference { entity: "Line", .. }
        ));

        let bad_process = create_station(
            &fixture.db,
            StationInput {
                name: "ST-02".to_string(),
                line_id: fixture.line.id,
                model_process_id: 999,
            },
        )
        .await;
        assert!(matches!(
            bad_process.unwrap_err(),
            Error::InvalidReference { entity: "Model process", .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_station_with_machine_rejected() -> Result<()> {
        let fixture = setup_with_station().await?;
        create_test_machine_at(&fixture.db, "ICT-01", "10.224.1.10", fixture.station.id).await?;

        let err = delete_station(&fixture.db, fixture.station.id).await.unwrap_err();
        assert!(matches!(err, Error::HasDependents { dependents: "machines", .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_station() -> Result<()> {
        let fixture = setup_with_station().await?;
        let updated = update_station(
            &fixture.db,
            fixture.station.id,
            StationInput {
                name: "ST-01B".to_string(),
                line_id: fixture.line.id,
                model_process_id: fixture.model_process.id,
            },
        )
        .await?;
        assert_eq!(updated.name, "ST-01B");
        assert_eq!(get_all_stations(&fixture.db).await?.len(), 1);
        Ok(())
    }
}
