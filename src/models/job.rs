use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::generation::{GenerationParams, ImageModel, ImageQuality, ImageStyle};

/// Status reported for a generation job. Jobs only ever reach the caller
/// once every image is saved, so `Completed` is the only success state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    Failed,
}

/// Summary of one stored image, as returned to callers and recorded in metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSummary {
    pub id: Uuid,
    pub url: String,
    /// Prompt actually used upstream (may be a revised prompt).
    pub prompt: String,
    pub model: ImageModel,
    pub size: String,
}

impl ImageSummary {
    pub fn new(id: Uuid, prompt: String, model: ImageModel, size: &str) -> Self {
        Self {
            id,
            url: format!("/images/{}", id),
            prompt,
            model,
            size: size.to_string(),
        }
    }
}

/// `metadata.json` written once per job after all images are saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub count: u32,
    pub model: ImageModel,
    pub size: String,
    pub quality: ImageQuality,
    pub style: Option<ImageStyle>,
    pub images: Vec<ImageSummary>,
}

impl JobMetadata {
    pub fn new(job_id: Uuid, params: &GenerationParams, images: Vec<ImageSummary>) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            prompt: params.prompt.clone(),
            count: params.count,
            model: params.model,
            size: params.size.clone(),
            quality: params.quality,
            style: params.style,
            images,
        }
    }
}

/// Response body for a successful `POST /generate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub images: Vec<ImageSummary>,
}
