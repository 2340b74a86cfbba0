//! Model group business logic.
//!
//! A model group belongs to a buyer and owns product models. Names are unique.

use super::required_text;
use crate::{
    entities::{Buyer, ModelGroup, ProductModel, model, model_group},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

const MAX_NAME_LEN: usize = 50;

/// Payload for creating or replacing a model group
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelGroupInput {
    /// Unique group name
    pub name: String,
    /// Owning buyer
    pub buyer_id: i32,
}

/// Retrieves all model groups ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_model_groups(db: &DatabaseConnection) -> Result<Vec<model_group::Model>> {
    ModelGroup::find()
        .order_by_asc(model_group::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific model group by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_model_group_by_id(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<model_group::Model>> {
    ModelGroup::find_by_id(id).one(db).await.map_err(Into::into)
}

async fn validate(
    db: &DatabaseConnection,
    input: ModelGroupInput,
    exclude_id: Option<i32>,
) -> Result<ModelGroupInput> {
    let name = required_text("Name", &input.name, MAX_NAME_LEN)?;

    if Buyer::find_by_id(input.buyer_id).one(db).await?.is_none() {
        return Err(Error::InvalidReference {
            entity: "Buyer",
            id: input.buyer_id.into(),
        });
    }

    let mut dup = ModelGroup::find().filter(model_group::Column::Name.eq(name.as_str()));
    if let Some(id) = exclude_id {
        dup = dup.filter(model_group::Column::Id.ne(id));
    }
    if dup.one(db).await?.is_some() {
        return Err(Error::Duplicate {
            entity: "Model group",
            field: "name",
            value: name,
        });
    }

    Ok(ModelGroupInput {
        name,
        buyer_id: input.buyer_id,
    })
}

/// Creates a new model group under an existing buyer.
///
/// # Errors
/// Returns an error if the name is invalid or taken, the buyer does not
/// exist, or the insert fails.
pub async fn create_model_group(
    db: &DatabaseConnection,
    input: ModelGroupInput,
) -> Result<model_group::Model> {
    let input = validate(db, input, None).await?;

    let created = model_group::ActiveModel {
        name: Set(input.name),
        buyer_id: Set(input.buyer_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(model_group_id = created.id, "Model group created");
    Ok(created)
}

/// Replaces the name and buyer of an existing model group.
///
/// # Errors
/// Returns an error if the group does not exist, validation fails, or the
/// update fails.
pub async fn update_model_group(
    db: &DatabaseConnection,
    id: i32,
    input: ModelGroupInput,
) -> Result<model_group::Model> {
    let existing = get_model_group_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Model group", id))?;
    let input = validate(db, input, Some(id)).await?;

    let mut active: model_group::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.buyer_id = Set(input.buyer_id);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a model group that owns no models.
///
/// # Errors
/// Returns an error if the group does not exist, still owns models, or the
/// delete fails.
pub async fn delete_model_group(db: &DatabaseConnection, id: i32) -> Result<()> {
    let existing = get_model_group_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Model group", id))?;

    let models = existing.find_related(ProductModel).count(db).await?;
    if models > 0 {
        return Err(Error::HasDependents {
            entity: "model group",
            name: existing.name,
            count: models,
            dependents: "models",
        });
    }

    ModelGroup::delete_by_id(id).exec(db).await?;
    info!(model_group_id = id, "Model group deleted");
    Ok(())
}

/// Lists the models of a model group.
///
/// # Errors
/// Returns an error if the group does not exist or the query fails.
pub async fn get_models_for_group(db: &DatabaseConnection, id: i32) -> Result<Vec<model::Model>> {
    let existing = get_model_group_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Model group", id))?;

    existing
        .find_related(ProductModel)
        .order_by_asc(model::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
