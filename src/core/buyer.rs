//! Buyer business logic - Handles all buyer-related operations.
//!
//! Buyers are the root of the product hierarchy. Codes and names are unique,
//! and a buyer that still owns model groups cannot be deleted. Search matches
//! either field by substring.

use super::required_text;
use crate::{
    entities::{Buyer, ModelGroup, buyer, model_group},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const MAX_CODE_LEN: usize = 10;
const MAX_NAME_LEN: usize = 50;

/// Payload for creating or replacing a buyer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInput {
    /// Short unique code
    pub code: String,
    /// Unique display name
    pub name: String,
}

/// Buyer row together with the number of model groups it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerSummary {
    /// Buyer ID
    pub id: i32,
    /// Buyer code
    pub code: String,
    /// Buyer name
    pub name: String,
    /// Number of model groups owned by the buyer
    pub model_group_count: u64,
}

/// Retrieves all buyers ordered by name, each with its model group count.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_buyers(db: &DatabaseConnection) -> Result<Vec<BuyerSummary>> {
    let buyers = Buyer::find()
        .order_by_asc(buyer::Column::Name)
        .find_with_related(ModelGroup)
        .all(db)
        .await?;

    Ok(buyers
        .into_iter()
        .map(|(b, groups)| BuyerSummary {
            id: b.id,
            code: b.code,
            name: b.name,
            model_group_count: groups.len() as u64,
        })
        .collect())
}

/// Retrieves a specific buyer by its ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_buyer_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<buyer::Model>> {
    Buyer::find_by_id(id).one(db).await.map_err(Into::into)
}

async fn ensure_unique(
    db: &DatabaseConnection,
    input: &BuyerInput,
    exclude_id: Option<i32>,
) -> Result<()> {
    let mut by_code = Buyer::find().filter(buyer::Column::Code.eq(input.code.as_str()));
    let mut by_name = Buyer::find().filter(buyer::Column::Name.eq(input.name.as_str()));
    if let Some(id) = exclude_id {
        by_code = by_code.filter(buyer::Column::Id.ne(id));
        by_name = by_name.filter(buyer::Column::Id.ne(id));
    }

    if by_code.one(db).await?.is_some() {
        return Err(Error::Duplicate {
            entity: "Buyer",
            field: "code",
            value: input.code.clone(),
        });
    }
    if by_name.one(db).await?.is_some() {
        return Err(Error::Duplicate {
            entity: "Buyer",
            field: "name",
            value: input.name.clone(),
        });
    }
    Ok(())
}

fn validate(input: BuyerInput) -> Result<BuyerInput> {
    Ok(BuyerInput {
        code: required_text("Code", &input.code, MAX_CODE_LEN)?,
        name: required_text("Name", &input.name, MAX_NAME_LEN)?,
    })
}

/// Creates a new buyer after validating the fields and their uniqueness.
///
/// # Errors
/// Returns an error if:
/// - The code or name is blank or too long
/// - Another buyer already uses the code or name
/// - The database insert operation fails
pub async fn create_buyer(db: &DatabaseConnection, input: BuyerInput) -> Result<buyer::Model> {
    let input = validate(input)?;
    ensure_unique(db, &input, None).await?;

    let created = buyer::ActiveModel {
        code: Set(input.code),
        name: Set(input.name),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(buyer_id = created.id, code = %created.code, "Buyer created");
    Ok(created)
}

/// Replaces the code and name of an existing buyer.
///
/// # Errors
/// Returns an error if:
/// - The buyer does not exist
/// - The code or name is blank, too long, or used by another buyer
/// - The database update operation fails
pub async fn update_buyer(
    db: &DatabaseConnection,
    id: i32,
    input: BuyerInput,
) -> Result<buyer::Model> {
    let input = validate(input)?;
    let existing = get_buyer_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Buyer", id))?;
    ensure_unique(db, &input, Some(id)).await?;

    let mut active: buyer::ActiveModel = existing.into();
    active.code = Set(input.code);
    active.name = Set(input.name);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a buyer that owns no model groups.
///
/// # Errors
/// Returns an error if:
/// - The buyer does not exist
/// - The buyer still owns model groups
/// - The database delete operation fails
pub async fn delete_buyer(db: &DatabaseConnection, id: i32) -> Result<()> {
    let existing = get_buyer_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Buyer", id))?;

    let groups = ModelGroup::find()
        .filter(model_group::Column::BuyerId.eq(id))
        .count(db)
        .await?;
    if groups > 0 {
        warn!(buyer_id = id, groups, "Refusing to delete buyer with model groups");
        return Err(Error::HasDependents {
            entity: "buyer",
            name: existing.name,
            count: groups,
            dependents: "model groups",
        });
    }

    Buyer::delete_by_id(id).exec(db).await?;
    info!(buyer_id = id, "Buyer deleted");
    Ok(())
}

/// Finds buyers whose name or code contains `term`.
///
/// # Errors
/// Returns an error if the term is blank or the database query fails.
pub async fn search_buyers(db: &DatabaseConnection, term: &str) -> Result<Vec<buyer::Model>> {
    let term = term.trim();
    if term.is_empty() {
        return Err(Error::validation("Search term is required"));
    }

    Buyer::find()
        .filter(
            Condition::any()
                .add(buyer::Column::Name.contains(term))
                .add(buyer::Column::Code.contains(term)),
        )
        .order_by_asc(buyer::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the model groups owned by a buyer.
///
/// # Errors
/// Returns an error if the buyer does not exist or the query fails.
pub async fn get_model_groups_for_buyer(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Vec<model_group::Model>> {
    let existing = get_buyer_by_id(db, id)
        .await?
        .ok_or_else(|| Error::not_found("Buyer", id))?;

    existing
        .find_related(ModelGroup)
        .order_by_asc(model_group::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
