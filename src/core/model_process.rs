//! Model process business logic.
//!
//! Processes belong to a product model. Reads are projected with the names of
//! the model, its group and buyer, plus the number of stations running the
//! process, so clients can display the full chain without extra calls.

use super::required_text;
use crate::{
    entities::{
        Buyer, ModelGroup, ModelProcess, ProductModel, Station, model_process, station,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

const MAX_NAME_LEN: usize = 50;

/// Payload for creating a model process
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProcessInput {
    /// Process name
    pub name: String,
    /// Model the process belongs to
    pub model_id: i32,
}

/// Partial update of a model process; blank or absent fields are kept
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProcessUpdate {
    /// New name, ignored when blank
    pub name: Option<String>,
    /// New model, ignored when absent
    pub model_id: Option<i32>,
}

/// Model process with its resolved hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProcessView {
    /// Process ID
    pub id: i32,
    /// Process name
    pub name: String,
    /// Model ID
    pub model_id: i32,
    /// Model name
    pub model_name: Option<String>,
    /// Model group name
    pub model_group_name: Option<String>,
    /// Buyer name
    pub buyer_name: Option<String>,
    /// Number of stations running this process
    pub station_count: u64,
}

/// Lookup tables used to project processes without one query per row.
struct Names {
    models: HashMap<i32, (String, i32)>,
    groups: HashMap<i32, (String, i32)>,
    buyers: HashMap<i32, String>,
    stations: HashMap<i32, u64>,
}

impl Names {
    async fn load(db: &DatabaseConnection) -> Result<Self> {
        let models = ProductModel::find()
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id, (m.name, m.model_group_id)))
            .collect();
        let groups = ModelGroup::find()
            .all(db)
            .await?
            .into_iter()
            .map(|g| (g.id, (g.name, g.buyer_id)))
            .collect();
        let buyers = Buyer::find()
            .all(db)
            .await?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect();

        let mut stations = HashMap::new();
        for s in Station::find().all(db).await? {
            *stations.entry(s.model_process_id).or_insert(0) += 1;
        }

        Ok(Self {
            models,
            groups,
            buyers,
            stations,
        })
    }

    fn project(&self, process: model_process::Model) -> ModelProcessView {
        let model = self.models.get(&process.model_id);
        let group = model.and_then(|(_, group_id)| self.groups.get(group_id));
        let buyer = group.and_then(|(_, buyer_id)| self.buyers.get(buyer_id));

        ModelProcessView {
            id: process.id,
            station_count: self.stations.get(&process.id).copied().unwrap_or(0),
            name: process.name,
            model_id: process.model_id,
            model_name: model.map(|(name, _)| name.clone()),
            model_group_name: group.map(|(name, _)| name.clone()),
            buyer_name: buyer.cloned(),
        }
    }
}

/// Retrieves all model processes with their hierarchy, ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_model_processes(db: &DatabaseConnection) -> Result<Vec<ModelProcessView>> {
    let names = Names::load(db).await?;
    let processes = ModelProcess::find()
        .order_by_asc(model_process::Column::Name)
        .all(db)
        .await?;
    Ok(processes.into_iter().map(|p| names.project(p)).collect())
}

/// Retrieves a specific model process with its hierarchy.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_model_process_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<ModelProcessView>> {
    let Some(process) = ModelProcess::find_by_id(id).one(db).await? else {
        return Ok(None);
    };
    let names = Names::load(db).await?;
    Ok(Some(names.project(process)))
}

async fn ensure_model(db: &DatabaseConnection, model_id: i32) -> Result<()> {
    if ProductModel::find_by_id(model_id).one(db).await?.is_none() {
        return Err(Error::InvalidReference {
            entity: "Model",
            id: model_id.into(),
        });
    }
    Ok(())
}

/// Creates a new model process for an existing model.
///
/// # Errors
/// Returns an error if the name is invalid, the model does not exist, or the
/// insert fails.
pub async fn create_model_process(
    db: &DatabaseConnection,
    input: ModelProcessInput,
) -> Result<ModelProcessView> {
    let name = required_text("Name", &input.name, MAX_NAME_LEN)?;
    ensure_model(db, input.model_id).await?;

    let created = model_process::ActiveModel {
        name: Set(name),
        model_id: Set(input.model_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(model_process_id = created.id, "Model process created");
    let names = Names::load(db).await?;
    Ok(names.project(created))
}

/// Applies a partial update to a model process.
///
/// # Errors
/// Returns an error if the process does not exist, the new name is too long,
/// the new model does not exist, or the update fails.
pub async fn update_model_process(
    db: &DatabaseConnection,
    id: i32,
    update: ModelProcessUpdate,
) -> Result<ModelProcessView> {
    let existing = ModelProcess::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Model process", id))?;

    let mut active: model_process::ActiveModel = existing.into();
    if let Some(name) = update.name.filter(|n| !n.trim().is_empty()) {
        active.name = Set(required_text("Name", &name, MAX_NAME_LEN)?);
    }
    if let Some(model_id) = update.model_id {
        ensure_model(db, model_id).await?;
        active.model_id = Set(model_id);
    }

    let updated = active.update(db).await?;
    let names = Names::load(db).await?;
    Ok(names.project(updated))
}

/// Deletes a model process that no station runs.
///
/// # Errors
/// Returns an error if the process does not exist, stations still use it, or
/// the delete fails.
pub async fn delete_model_process(db: &DatabaseConnection, id: i32) -> Result<()> {
    let existing = ModelProcess::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Model process", id))?;

    let stations = Station::find()
        .filter(station::Column::ModelProcessId.eq(id))
        .count(db)
        .await?;
    if stations > 0 {
        return Err(Error::HasDependents {
            entity: "model process",
            name: existing.name,
            count: stations,
            dependents: "stations",
        });
    }

    ModelProcess::delete_by_id(id).exec(db).await?;
    info!(model_process_id = id, "Model process deleted");
    Ok(())
}
