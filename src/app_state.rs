use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{generator::ImageGenerator, storage::ImageStore};

/// Upstream client availability, decided once at startup.
pub enum Upstream {
    Ready(ImageGenerator),
    /// No usable credential; carries the reason for logging.
    Unconfigured(String),
}

impl Upstream {
    /// Resolve the credential file named in `config` and build the client.
    pub fn from_config(config: &AppConfig) -> Self {
        let api_key = match crate::config::load_api_key(&config.api_key_file) {
            Ok(key) => key,
            Err(e) => return Upstream::Unconfigured(e.to_string()),
        };

        match ImageGenerator::new(
            api_key,
            config.openai_api_url.clone(),
            config.generation_timeout(),
            config.download_timeout(),
        ) {
            Ok(generator) => Upstream::Ready(generator),
            Err(e) => Upstream::Unconfigured(e.to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Upstream::Ready(_))
    }

    pub fn generator(&self) -> Option<&ImageGenerator> {
        match self {
            Upstream::Ready(generator) => Some(generator),
            Upstream::Unconfigured(_) => None,
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<Upstream>,
    pub images: Arc<ImageStore>,
}

impl AppState {
    pub fn new(upstream: Upstream, images: ImageStore) -> Self {
        Self {
            upstream: Arc::new(upstream),
            images: Arc::new(images),
        }
    }
}
