use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::generation::{GenerationParams, ImageModel, ImageQuality, ImageStyle};

/// Client for the OpenAI image generations API.
pub struct ImageGenerator {
    http: Client,
    api_key: String,
    api_url: String,
    generation_timeout: Duration,
    download_timeout: Duration,
}

#[derive(Serialize)]
struct GenerationPayload<'a> {
    model: ImageModel,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<ImageQuality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<ImageStyle>,
}

/// Successful upstream response.
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub data: Vec<ImageDescriptor>,
}

/// One generated image as described by the upstream API.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDescriptor {
    pub url: Option<String>,
    pub revised_prompt: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamErrorBody {
    error: UpstreamErrorDetail,
}

#[derive(Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

impl ImageGenerator {
    pub fn new(
        api_key: String,
        api_url: String,
        generation_timeout: Duration,
        download_timeout: Duration,
    ) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::InvalidApiKey(
                "OpenAI API key is required".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent(concat!("image-gen-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Unexpected(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            api_url,
            generation_timeout,
            download_timeout,
        })
    }

    /// Issue a single generation call for `n` images.
    ///
    /// `quality` and `style` are only sent to models that accept them.
    pub async fn generate_image(
        &self,
        prompt: &str,
        model: ImageModel,
        size: &str,
        quality: ImageQuality,
        style: Option<ImageStyle>,
        n: u32,
    ) -> Result<GenerationResponse, GenerationError> {
        let extended = model.supports_quality_and_style();
        let payload = GenerationPayload {
            model,
            prompt,
            n,
            size,
            response_format: "url",
            quality: extended.then_some(quality),
            style: if extended { style } else { None },
        };

        debug!(model = %model, n, size, "Calling image generation API");

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(self.generation_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(GenerationError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::from_upstream(response).await);
        }

        let body = response.text().await.map_err(GenerationError::from_transport)?;
        serde_json::from_str(&body)
            .map_err(|e| GenerationError::Unexpected(format!("malformed API response: {}", e)))
    }

    /// Produce `params.count` image descriptors.
    ///
    /// Models limited to one image per call are looped sequentially; the
    /// first failing call aborts the whole batch.
    pub async fn generate_batch(
        &self,
        params: &GenerationParams,
    ) -> Result<Vec<ImageDescriptor>, GenerationError> {
        let mut images = Vec::with_capacity(params.count as usize);

        if params.model.supports_batch() {
            let result = self
                .generate_image(
                    &params.prompt,
                    params.model,
                    &params.size,
                    params.quality,
                    params.style,
                    params.count,
                )
                .await?;
            images.extend(result.data);
        } else {
            for i in 0..params.count {
                let result = self
                    .generate_image(
                        &params.prompt,
                        params.model,
                        &params.size,
                        params.quality,
                        params.style,
                        1,
                    )
                    .await?;
                debug!(iteration = i + 1, total = params.count, "Generated image");
                images.extend(result.data);
            }
        }

        info!(
            model = %params.model,
            requested = params.count,
            received = images.len(),
            "Image batch generated"
        );

        Ok(images)
    }

    /// Fetch raw image bytes from a URL returned by the API.
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self
            .http
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GenerationError::Download(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    /// Write image bytes to `path`.
    pub async fn save_image(data: &[u8], path: &Path) -> Result<(), GenerationError> {
        tokio::fs::write(path, data).await.map_err(GenerationError::Save)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("Failed to save image: {0}")]
    Save(#[source] std::io::Error),
}

impl GenerationError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            GenerationError::Network(err)
        } else {
            GenerationError::Unexpected(err.to_string())
        }
    }

    async fn from_upstream(response: reqwest::Response) -> Self {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);

        Self::from_status(status, message, retry_after)
    }

    fn from_status(status: StatusCode, message: String, retry_after: Option<u64>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => GenerationError::InvalidApiKey(message),
            StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited {
                message,
                retry_after,
            },
            StatusCode::BAD_REQUEST => GenerationError::InvalidRequest(message),
            _ => GenerationError::Upstream {
                status: status.as_u16(),
                message,
            },
        }
    }
}

/// Prefer `error.message` from a JSON body, then the raw body, then the reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<UpstreamErrorBody>(body) {
        return parsed.error.message;
    }
    if !body.trim().is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
