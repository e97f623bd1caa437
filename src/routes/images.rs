use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::services::storage::{sanitize_image_id, StorageError};

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub message: String,
}

/// GET /images/{image_id} — serve a stored image as PNG.
pub async fn get_image(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let image_id = sanitize_image_id(&raw_id);

    match state.images.read_image(&image_id).await {
        Ok((path, bytes)) => {
            info!(path = %path.display(), "Serving image");
            Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
        }
        Err(StorageError::NotFound(_)) => {
            warn!(image_id = %image_id, "Image not found");
            Err(ApiError::ImageNotFound(image_id))
        }
        Err(e) => Err(e.into()),
    }
}

/// DELETE /images/{image_id} — remove a stored image file.
pub async fn delete_image(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let image_id = sanitize_image_id(&raw_id);

    match state.images.delete_image(&image_id).await {
        Ok(path) => {
            info!(path = %path.display(), "Deleted image");
            Ok(Json(DeleteResponse {
                status: "success".to_string(),
                message: format!("Image {} deleted", image_id),
            }))
        }
        Err(StorageError::NotFound(_)) => {
            warn!(image_id = %image_id, "Image not found for deletion");
            Err(ApiError::ImageNotFound(image_id))
        }
        Err(e) => {
            error!(image_id = %image_id, error = %e, "Failed to delete image");
            Err(e.into())
        }
    }
}
