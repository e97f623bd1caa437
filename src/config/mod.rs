use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Root directory holding one subdirectory per generation job
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,

    /// Mounted secret containing the OpenAI API key
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,

    /// OpenAI image generations endpoint
    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,

    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("/app/images")
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from("/run/secrets/openai_api_key")
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1/images/generations".to_string()
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_download_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Read the upstream API key from a mounted secret file.
///
/// Surrounding whitespace is stripped; a file that is missing, unreadable or
/// blank is an error so the caller can start in the unconfigured state.
pub fn load_api_key(path: &Path) -> Result<String, CredentialError> {
    if !path.exists() {
        return Err(CredentialError::Missing(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let key = raw.trim();
    if key.is_empty() {
        return Err(CredentialError::Empty(path.to_path_buf()));
    }

    Ok(key.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("API key secret not found at {0}")]
    Missing(PathBuf),

    #[error("API key secret at {0} exists but is empty")]
    Empty(PathBuf),

    #[error("Failed to read API key secret at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
