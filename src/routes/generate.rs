use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::generation::GenerationParams;
use crate::models::job::{GenerateResponse, ImageSummary, JobMetadata, JobStatus};
use crate::services::generator::{GenerationError, ImageGenerator};
use crate::services::storage::{ImageStore, JobDir};

/// POST /generate — generate, download and store one or more images.
///
/// Pipeline:
/// 1. Refuse with 503 when no credential was configured at startup
/// 2. Decode and validate the body
/// 3. Create the job directory
/// 4. Request the batch upstream, then download and save each image in order
/// 5. Write `metadata.json` and return the image summaries
///
/// Nothing is rolled back on failure: images saved before a failing
/// download stay on disk and the job has no metadata document.
pub async fn generate_images(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let generator = state
        .upstream
        .generator()
        .ok_or(ApiError::ServiceUnavailable)?;

    let body: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::InvalidJson)?;

    let params = GenerationParams::from_json(body).map_err(|e| {
        warn!(error = %e, "Rejected generation request");
        ApiError::from(e)
    })?;

    let job_id = Uuid::new_v4();
    let job = state.images.create_job(job_id).await?;

    info!(
        job_id = %job_id,
        count = params.count,
        model = %params.model,
        prompt = %prompt_preview(&params.prompt),
        "Starting generation job"
    );
    metrics::counter!("image_jobs_total").increment(1);
    let started = Instant::now();

    match run_job(generator, &state.images, &job, &params).await {
        Ok(images) => {
            metrics::counter!("image_jobs_completed").increment(1);
            metrics::histogram!("image_job_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            info!(job_id = %job_id, images = images.len(), "Job completed successfully");

            Ok(Json(GenerateResponse {
                job_id,
                status: JobStatus::Completed,
                images,
            }))
        }
        Err(e) => {
            metrics::counter!("image_jobs_failed").increment(1);
            Err(e)
        }
    }
}

async fn run_job(
    generator: &ImageGenerator,
    store: &ImageStore,
    job: &JobDir,
    params: &GenerationParams,
) -> Result<Vec<ImageSummary>, ApiError> {
    let descriptors = generator
        .generate_batch(params)
        .await
        .map_err(|e| generation_failed(job.job_id, e))?;

    let mut images = Vec::with_capacity(descriptors.len());
    for (idx, descriptor) in descriptors.into_iter().enumerate() {
        let seq = idx + 1;
        let image_id = Uuid::new_v4();

        let url = descriptor.url.ok_or_else(|| {
            generation_failed(
                job.job_id,
                GenerationError::Download("no image URL in API response".to_string()),
            )
        })?;

        let bytes = generator
            .download_image(&url)
            .await
            .map_err(|e| generation_failed(job.job_id, e))?;

        let path = job.image_path(seq, image_id);
        ImageGenerator::save_image(&bytes, &path)
            .await
            .map_err(|e| generation_failed(job.job_id, e))?;

        info!(
            job_id = %job.job_id,
            image_id = %image_id,
            "Saved image {}/{} to {}",
            seq,
            params.count,
            path.display()
        );
        metrics::counter!("images_generated_total").increment(1);

        let prompt = descriptor
            .revised_prompt
            .unwrap_or_else(|| params.prompt.clone());
        images.push(ImageSummary::new(image_id, prompt, params.model, &params.size));
    }

    let metadata = JobMetadata::new(job.job_id, params, images.clone());
    store.write_metadata(job, &metadata).await.map_err(|e| {
        error!(job_id = %job.job_id, error = %e, "Failed to write job metadata");
        ApiError::from(e)
    })?;

    Ok(images)
}

fn generation_failed(job_id: Uuid, err: GenerationError) -> ApiError {
    match &err {
        GenerationError::RateLimited { retry_after, .. } => {
            warn!(job_id = %job_id, retry_after = ?retry_after, error = %err, "Rate limit exceeded");
        }
        GenerationError::InvalidApiKey(_) => {
            error!(job_id = %job_id, error = %err, "Upstream rejected API key");
        }
        _ => {
            error!(job_id = %job_id, error = %err, "Image generation failed");
        }
    }
    ApiError::from(err)
}

fn prompt_preview(prompt: &str) -> String {
    let preview: String = prompt.chars().take(50).collect();
    if preview.len() < prompt.len() {
        format!("{}...", preview)
    } else {
        preview
    }
}
