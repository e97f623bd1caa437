pub mod generate;
pub mod health;
pub mod images;
pub mod metrics;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;
use crate::error::ApiError;

/// Build the API router. Unknown routes and methods answer with the JSON
/// error envelope (`HTTP_ERROR`).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/generate", post(generate::generate_images))
        .route(
            "/images/{image_id}",
            get(images::get_image).delete(images::delete_image),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::http(StatusCode::NOT_FOUND)
}

async fn method_not_allowed() -> ApiError {
    ApiError::http(StatusCode::METHOD_NOT_ALLOWED)
}
