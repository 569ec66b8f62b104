//! Admin image uploads.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::uploads::StoredFile;
use crate::state::AppState;

/// Multipart field name carrying files.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: Vec<StoredFile>,
}

/// Store every `file` part of a multipart body. Nothing is kept unless every
/// part is accepted.
///
/// POST /api/uploads
///
/// # Errors
///
/// Returns 400 for malformed bodies, non-image files, oversized files or no
/// files at all.
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut parts = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;

        parts.push((original_name, bytes));
    }

    if parts.is_empty() {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }
    let files = state.uploads().store_all(&parts).await?;

    tracing::info!(admin_id = %admin.id, count = files.len(), "Images uploaded");
    Ok((StatusCode::CREATED, Json(UploadResponse { files })))
}
