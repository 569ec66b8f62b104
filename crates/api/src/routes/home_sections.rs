//! Homepage content routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use drape_core::{CollectionId, HomeSectionId, SectionType};

use super::{ReorderRequest, double_option};
use crate::db::HomeSectionRepository;
use crate::db::home_sections::HomeSectionInput;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::HomeSection;
use crate::state::AppState;

/// Active sections ordered by position.
///
/// GET /api/home-sections
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<HomeSection>>> {
    Ok(Json(HomeSectionRepository::new(state.pool()).list(false).await?))
}

/// Resolved homepage (sections with products, categories, announcement).
///
/// GET /api/home-sections/homepage
///
/// # Errors
///
/// Returns 500 if building the page fails.
pub async fn homepage(State(state): State<AppState>) -> Result<Response> {
    let page = state.home_cache().get(state.pool()).await?;
    Ok(Json(page.as_ref()).into_response())
}

/// GET /api/home-sections/admin/all
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<HomeSection>>> {
    Ok(Json(HomeSectionRepository::new(state.pool()).list(true).await?))
}

/// Section create/update body. On update, omitted fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct HomeSectionPayload {
    pub section_type: Option<SectionType>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub subtitle: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub link_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub collection_id: Option<Option<CollectionId>>,
    pub position: Option<i32>,
    pub is_active: Option<bool>,
    pub content: Option<serde_json::Value>,
}

impl HomeSectionPayload {
    fn into_input(
        self,
        existing: Option<&HomeSection>,
    ) -> std::result::Result<HomeSectionInput, String> {
        let section_type = self
            .section_type
            .or_else(|| existing.map(|s| s.section_type))
            .ok_or("Section type is required")?;
        let collection_id = self
            .collection_id
            .unwrap_or_else(|| existing.and_then(|s| s.collection_id));
        if section_type == SectionType::CollectionShowcase && collection_id.is_none() {
            return Err("Collection showcase sections need a collection".to_string());
        }

        let content = self
            .content
            .or_else(|| existing.map(|s| s.content.clone()))
            .unwrap_or_else(|| serde_json::json!({}));
        if !content.is_object() {
            return Err("Section content must be a JSON object".to_string());
        }

        Ok(HomeSectionInput {
            section_type,
            title: self
                .title
                .map(|t| t.trim().to_string())
                .or_else(|| existing.map(|s| s.title.clone()))
                .unwrap_or_default(),
            subtitle: self
                .subtitle
                .unwrap_or_else(|| existing.and_then(|s| s.subtitle.clone())),
            image_url: self
                .image_url
                .unwrap_or_else(|| existing.and_then(|s| s.image_url.clone())),
            link_url: self
                .link_url
                .unwrap_or_else(|| existing.and_then(|s| s.link_url.clone())),
            collection_id,
            position: self
                .position
                .or_else(|| existing.map(|s| s.position))
                .unwrap_or(0),
            is_active: self
                .is_active
                .or_else(|| existing.map(|s| s.is_active))
                .unwrap_or(true),
            content,
        })
    }
}

/// POST /api/home-sections
///
/// # Errors
///
/// Returns 400 for invalid fields.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<HomeSectionPayload>,
) -> Result<(StatusCode, Json<HomeSection>)> {
    let input = payload.into_input(None).map_err(AppError::BadRequest)?;
    let section = HomeSectionRepository::new(state.pool()).create(&input).await?;
    state.home_cache().invalidate();

    tracing::info!(section_id = %section.id, admin_id = %admin.id, "Home section created");
    Ok((StatusCode::CREATED, Json(section)))
}

/// PUT /api/home-sections/{id}
///
/// # Errors
///
/// Returns 404 for unknown sections and 400 for invalid fields.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<HomeSectionId>,
    Json(payload): Json<HomeSectionPayload>,
) -> Result<Json<HomeSection>> {
    let sections = HomeSectionRepository::new(state.pool());
    let existing = sections
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Home section not found".to_string()))?;

    let input = payload
        .into_input(Some(&existing))
        .map_err(AppError::BadRequest)?;
    let section = sections.update(id, &input).await?;
    state.home_cache().invalidate();

    tracing::info!(section_id = %id, admin_id = %admin.id, "Home section updated");
    Ok(Json(section))
}

/// DELETE /api/home-sections/{id}
///
/// # Errors
///
/// Returns 404 for unknown sections.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<HomeSectionId>,
) -> Result<StatusCode> {
    HomeSectionRepository::new(state.pool()).delete(id).await?;
    state.home_cache().invalidate();

    tracing::info!(section_id = %id, admin_id = %admin.id, "Home section deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Set positions from list order.
///
/// PUT /api/home-sections/reorder
///
/// # Errors
///
/// Returns 500 if the update fails.
pub async fn reorder(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(req): Json<ReorderRequest<HomeSectionId>>,
) -> Result<Json<Vec<HomeSection>>> {
    let sections = HomeSectionRepository::new(state.pool());
    sections.reorder(&req.ids).await?;
    state.home_cache().invalidate();
    Ok(Json(sections.list(true).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> HomeSectionPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_new_section_defaults() {
        let input = payload(serde_json::json!({ "section_type": "hero", "title": "Festive Edit" }))
            .into_input(None)
            .unwrap();
        assert_eq!(input.section_type, SectionType::Hero);
        assert_eq!(input.content, serde_json::json!({}));
        assert!(input.is_active);
    }

    #[test]
    fn test_showcase_requires_collection() {
        let err = payload(serde_json::json!({ "section_type": "collection_showcase" }))
            .into_input(None)
            .unwrap_err();
        assert_eq!(err, "Collection showcase sections need a collection");

        let ok = payload(serde_json::json!({
            "section_type": "collection_showcase",
            "collection_id": 4
        }))
        .into_input(None)
        .unwrap();
        assert_eq!(ok.collection_id, Some(CollectionId::new(4)));
    }

    #[test]
    fn test_content_must_be_object() {
        let err = payload(serde_json::json!({ "section_type": "banner", "content": [1, 2] }))
            .into_input(None)
            .unwrap_err();
        assert_eq!(err, "Section content must be a JSON object");
    }
}
