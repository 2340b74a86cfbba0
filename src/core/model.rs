//! Product model business logic.
//!
//! Models belong to a model group and own model processes. Names are unique.

use super::required_text;
use crate::{
    entities::{ModelGroup, ModelProcess, ProductModel, model},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

const MAX_NAME_LEN: usize = 50;

/// Payload for creating or replacing a product model
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInput {
    /// Unique model name
    pub name: String,
    /// Owning model group
    pub model_group_id: i32,
}

/// Retrieves all models ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_models(db: &DatabaseConnection) -> Result<Vec<model::Model>> {
    ProductModel::find()
        .order_by_asc(model::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific model by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_model_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<model::Model>> {
    ProductModel::find_by_id(id).one(db).await.map_err(Into::into)
}

async fn validate(
    db: &DatabaseConnection,
    input: ModelInput,
    exclude_id: Option<i32>,
) -> Result<ModelInput> {
    let name = required_text("Name", &input.name, MAX_NAME_LEN)?;

    if ModelGroup::find_by_id(input.model_group_id)
        .one(db)
        .await?
        .is_none()
    {
        return Err(Error::InvalidReference {
            entity: "Model group",
            id: input.model_group_id.into(),
        });
    }

    let mut dup = ProductModel::find().filter(model::Column::Name.eq(name.as_str()));
    if let Some(id) = exclude_id {
        dup = dup.filter(model::Column::Id.ne(id));
    }
    if dup.one(db).await?.is_some() {
        return Err(Error::Duplicate {
            entity: "Model",
            field: "name",
            value: name,
        });
    }

    Ok(ModelInput {
        name,
        model_group_id: input.model_group_id,
    })
}

/// Creates a new model under an existing model group.
///
/// # Errors
/// Returns an error if the name is invalid or taken, the group does not
/// exist, or the insert fails.
pub async fn create_model(db: &DatabaseConnection, input: ModelInput) -> Result<model::Model> {
    let input = validate(db, input, None).await?;

    let created = model::ActiveModel {
        name: Set(input.name),
        model_group_id: Set(input.model_group_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(model_id = created.id, name = %created.name, "Model created");
    Ok(created)
}

/// Replaces the name and group of an existing model.
///
/// # Errors
/// Returns an error if the model does not exist, validation fails, or the
/// update fails.
pub async fn update_model(
    db: &DatabaseConnection,
    id: i32,
    input: ModelInput,
) -> Result<model::Model> {
    let existing = get_model_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Model", id))?;
    let input = validate(db, input, Some(id)).await?;

    let mut active: model::ActiveModel = existing.into();
    active.name = Set(input.name);
    active.model_group_id = Set(input.model_group_id);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a model that owns no model processes.
///
/// # Errors
/// Returns an error if the model does not exist, still owns processes, or
/// the delete fails.
pub async fn delete_model(db: &DatabaseConnection, id: i32) -> Result<()> {
    let existing = get_model_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Model", id))?;

    let processes = existing.find_related(ModelProcess).count(db).await?;
    if processes > 0 {
        return Err(Error::HasDependents {
            entity: "model",
            name: existing.name,
            count: processes,
            dependents: "model processes",
        });
    }

    ProductModel::delete_by_id(id).exec(db).await?;
    info!(model_id = id, "Model deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_model_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let result = create_model(
            &db,
            ModelInput {
                name: "  ".to_string(),
                model_group_id: 1,
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_model_lifecycle() -> Result<()> {
        let (db, buyer) = setup_with_buyer().await?;
        let group = create_test_model_group(&db, "Galaxy A", buyer.id).await?;
        let model = create_test_model(&db, "SM-A156", group.id).await?;

        let dup = create_test_model(&db, "SM-A156", group.id).await;
        assert!(matches!(dup.unwrap_err(), Error::Duplicate { .. }));

        let bad_group = update_model(
            &db,
            model.id,
            ModelInput {
                name: "SM-A156".to_string(),
                model_group_id: 999,
            },
        )
        .await;
        assert!(matches!(bad_group.unwrap_err(), Error::InvalidReference { .. }));

        create_test_model_process(&db, "SMT", model.id).await?;
        let err = delete_model(&db, model.id).await.unwrap_err();
        assert!(matches!(err, Error::HasDependents { .. }));
        Ok(())
    }
}
