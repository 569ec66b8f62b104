//! Category routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use drape_core::CategoryId;

use super::{ReorderRequest, double_option, resolve_slug};
use crate::db::CategoryRepository;
use crate::db::categories::CategoryInput;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Category;
use crate::state::AppState;

/// Writable fields shared by categories and collections.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

/// Validated catalog entry fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFields {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub priority: i32,
    pub is_active: bool,
}

impl CatalogPayload {
    /// Merge onto `existing` (if any) and validate.
    pub(super) fn merge(
        self,
        existing: Option<CatalogFields>,
    ) -> std::result::Result<CatalogFields, String> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .or_else(|| existing.as_ref().map(|e| e.name.clone()))
            .filter(|n| !n.is_empty())
            .ok_or("Name is required")?;
        let slug = resolve_slug(
            self.slug.as_deref(),
            existing.as_ref().map(|e| e.slug.as_str()),
            &name,
        )?;

        Ok(CatalogFields {
            slug,
            description: self
                .description
                .or_else(|| existing.as_ref().map(|e| e.description.clone()))
                .unwrap_or_default(),
            image_url: self
                .image_url
                .unwrap_or_else(|| existing.as_ref().and_then(|e| e.image_url.clone()))
                .filter(|u| !u.trim().is_empty()),
            priority: self
                .priority
                .or_else(|| existing.as_ref().map(|e| e.priority))
                .unwrap_or(0),
            is_active: self
                .is_active
                .or_else(|| existing.as_ref().map(|e| e.is_active))
                .unwrap_or(true),
            name,
        })
    }
}

impl From<Category> for CatalogFields {
    fn from(c: Category) -> Self {
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

impl From<CatalogFields> for CategoryInput {
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

/// Active categories ordered by priority, then name.
///
/// GET /api/categories
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list(false).await?))
}

/// All categories including inactive ones.
///
/// GET /api/categories/admin/all
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::new(state.pool()).list(true).await?))
}

/// GET /api/categories/{slug}
///
/// # Errors
///
/// Returns 404 for unknown or inactive categories.
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>> {
    CategoryRepository::new(state.pool())
        .get_active_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
}

/// POST /api/categories
///
/// # Errors
///
/// Returns 400 for invalid fields and 409 for a duplicate slug.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<CatalogPayload>,
) -> Result<(StatusCode, Json<Category>)> {
    let input: CategoryInput = payload.merge(None).map_err(AppError::BadRequest)?.into();
    let category = CategoryRepository::new(state.pool()).create(&input).await?;
    state.home_cache().invalidate();

    tracing::info!(category_id = %category.id, admin_id = %admin.id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/{id}
///
/// # Errors
///
/// Returns 404 for unknown categories, 400 for invalid fields and 409 for a duplicate slug.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(payload): Json<CatalogPayload>,
) -> Result<Json<Category>> {
    let categories = CategoryRepository::new(state.pool());
    let existing = categories
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let input: CategoryInput = payload
        .merge(Some(existing.into()))
        .map_err(AppError::BadRequest)?
        .into();
    let category = categories.update(id, &input).await?;
    state.home_cache().invalidate();

    tracing::info!(category_id = %id, admin_id = %admin.id, "Category updated");
    Ok(Json(category))
}

/// Delete a category. Its products stay, uncategorized.
///
/// DELETE /api/categories/{id}
///
/// # Errors
///
/// Returns 404 for unknown categories.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    state.home_cache().invalidate();

    tracing::info!(category_id = %id, admin_id = %admin.id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Set priorities from list order.
///
/// PUT /api/categories/reorder
///
/// # Errors
///
/// Returns 500 if the update fails.
pub async fn reorder(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(req): Json<ReorderRequest<CategoryId>>,
) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool());
    categories.reorder(&req.ids).await?;
    state.home_cache().invalidate();
    Ok(Json(categories.list(true).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> CatalogPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_merge_new_entry() {
        let fields = payload(serde_json::json!({ "name": " Silk Sarees " }))
            .merge(None)
            .unwrap();
        assert_eq!(fields.name, "Silk Sarees");
        assert_eq!(fields.slug, "silk-sarees");
        assert_eq!(fields.priority, 0);
        assert!(fields.is_active);
        assert!(fields.image_url.is_none());
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let existing = CatalogFields {
            name: "Cotton".to_string(),
            slug: "cotton-everyday".to_string(),
            description: "Breathable".to_string(),
            image_url: Some("/uploads/a.webp".to_string()),
            priority: 3,
            is_active: false,
        };
        let fields = payload(serde_json::json!({ "priority": 1 }))
            .merge(Some(existing.clone()))
            .unwrap();
        assert_eq!(fields.slug, "cotton-everyday");
        assert_eq!(fields.priority, 1);
        assert_eq!(fields.image_url, existing.image_url);

        let cleared = payload(serde_json::json!({ "image_url": null }))
            .merge(Some(existing))
            .unwrap();
        assert!(cleared.image_url.is_none());
    }

    #[test]
    fn test_merge_requires_name() {
        let err = payload(serde_json::json!({ "name": "   " })).merge(None).unwrap_err();
        assert_eq!(err, "Name is required");
    }
}
