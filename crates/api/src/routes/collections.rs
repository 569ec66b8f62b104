//! Collection routes. A collection is a curated, ordered product list.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use drape_core::{CollectionId, ProductId};

use super::ReorderRequest;
use super::categories::{CatalogFields, CatalogPayload};
use crate::db::collections::CollectionInput;
use crate::db::{CollectionRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Collection, Product};
use crate::state::AppState;

/// Collection create/update body.
#[derive(Debug, Default, Deserialize)]
pub struct CollectionPayload {
    #[serde(flatten)]
    pub fields: CatalogPayload,
    /// Replaces the membership, in display order, when present.
    pub product_ids: Option<Vec<ProductId>>,
}

impl From<Collection> for CatalogFields {
    fn from(c: Collection) -> Self {
        Self {
            name: c.name,
            slug: c.slug,
            description: c.description,
            image_url: c.image_url,
            priority: c.priority,
            is_active: c.is_active,
        }
    }
}

impl From<CatalogFields> for CollectionInput {
    fn from(f: CatalogFields) -> Self {
        Self {
            name: f.name,
            slug: f.slug,
            description: f.description,
            image_url: f.image_url,
            priority: f.priority,
            is_active: f.is_active,
        }
    }
}

/// Collection with its active products.
#[derive(Debug, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: Collection,
    pub products: Vec<Product>,
}

/// GET /api/collections
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Collection>>> {
    Ok(Json(CollectionRepository::new(state.pool()).list(false).await?))
}

/// GET /api/collections/admin/all
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Collection>>> {
    Ok(Json(CollectionRepository::new(state.pool()).list(true).await?))
}

/// Collection detail with products in membership order.
///
/// GET /api/collections/{slug}
///
/// # Errors
///
/// Returns 404 for unknown or inactive collections.
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CollectionDetail>> {
    let collection = CollectionRepository::new(state.pool())
        .get_active_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;
    let products = ProductRepository::new(state.pool())
        .list_in_collection(collection.id, None)
        .await?;

    Ok(Json(CollectionDetail {
        collection,
        products,
    }))
}

/// POST /api/collections
///
/// # Errors
///
/// Returns 400 for invalid fields and 409 for a duplicate slug.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<CollectionPayload>,
) -> Result<(StatusCode, Json<Collection>)> {
    let input: CollectionInput = payload
        .fields
        .merge(None)
        .map_err(AppError::BadRequest)?
        .into();
    let collection = CollectionRepository::new(state.pool())
        .create(&input, payload.product_ids.as_deref())
        .await?;
    state.home_cache().invalidate();

    tracing::info!(collection_id = %collection.id, admin_id = %admin.id, "Collection created");
    Ok((StatusCode::CREATED, Json(collection)))
}

/// PUT /api/collections/{id}
///
/// # Errors
///
/// Returns 404 for unknown collections, 400 for invalid fields and 409 for a duplicate slug.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CollectionId>,
    Json(payload): Json<CollectionPayload>,
) -> Result<Json<Collection>> {
    let collections = CollectionRepository::new(state.pool());
    let existing = collections
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;

    let input: CollectionInput = payload
        .fields
        .merge(Some(existing.into()))
        .map_err(AppError::BadRequest)?
        .into();
    let collection = collections
        .update(id, &input, payload.product_ids.as_deref())
        .await?;
    state.home_cache().invalidate();

    tracing::info!(collection_id = %id, admin_id = %admin.id, "Collection updated");
    Ok(Json(collection))
}

/// DELETE /api/collections/{id}
///
/// # Errors
///
/// Returns 404 for unknown collections.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CollectionId>,
) -> Result<StatusCode> {
    CollectionRepository::new(state.pool()).delete(id).await?;
    state.home_cache().invalidate();

    tracing::info!(collection_id = %id, admin_id = %admin.id, "Collection deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/collections/reorder
///
/// # Errors
///
/// Returns 500 if the update fails.
pub async fn reorder(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(req): Json<ReorderRequest<CollectionId>>,
) -> Result<Json<Vec<Collection>>> {
    let collections = CollectionRepository::new(state.pool());
    collections.reorder(&req.ids).await?;
    state.home_cache().invalidate();
    Ok(Json(collections.list(true).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_flattens_fields() {
        let payload: CollectionPayload = serde_json::from_value(serde_json::json!({
            "name": "Wedding Edit",
            "product_ids": [3, 1, 2]
        }))
        .unwrap();
        assert_eq!(payload.fields.name.as_deref(), Some("Wedding Edit"));
        assert_eq!(
            payload.product_ids.unwrap(),
            vec![ProductId::new(3), ProductId::new(1), ProductId::new(2)]
        );
    }

    #[test]
    fn test_payload_without_products_keeps_membership() {
        let payload: CollectionPayload =
            serde_json::from_value(serde_json::json!({ "priority": 2 })).unwrap();
        assert!(payload.product_ids.is_none());
    }
}
