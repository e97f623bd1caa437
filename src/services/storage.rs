use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::job::JobMetadata;

const METADATA_FILE: &str = "metadata.json";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Local image storage: one directory per job under a common root.
///
/// There is no index; lookups scan every job directory for a file name
/// containing the image id.
pub struct ImageStore {
    root: PathBuf,
}

/// A job directory that images are being written into.
#[derive(Debug, Clone)]
pub struct JobDir {
    pub job_id: Uuid,
    pub path: PathBuf,
}

impl JobDir {
    /// `{seq:03}-{image_id}.png`, with `seq` starting at 1.
    pub fn image_path(&self, seq: usize, image_id: Uuid) -> PathBuf {
        self.path.join(format!("{:03}-{}.png", seq, image_id))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the images root if absent.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(StorageError::Io)
    }

    /// Create the directory for a new job.
    pub async fn create_job(&self, job_id: Uuid) -> Result<JobDir, StorageError> {
        let path = self.root.join(job_id.to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(StorageError::Io)?;
        Ok(JobDir { job_id, path })
    }

    /// Write the job's metadata document (pretty-printed JSON).
    pub async fn write_metadata(
        &self,
        job: &JobDir,
        metadata: &JobMetadata,
    ) -> Result<PathBuf, StorageError> {
        let path = job.metadata_path();
        let json = serde_json::to_vec_pretty(metadata).map_err(StorageError::Serialize)?;
        tokio::fs::write(&path, json).await.map_err(StorageError::Io)?;
        Ok(path)
    }

    /// Find the first stored image whose file name contains `image_id`.
    ///
    /// `image_id` must already be sanitized; an empty id never matches.
    pub async fn find_image(&self, image_id: &str) -> Result<Option<PathBuf>, StorageError> {
        if image_id.is_empty() {
            return Ok(None);
        }

        let mut jobs = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(job) = jobs.next_entry().await.map_err(StorageError::Io)? {
            if !job.file_type().await.map_err(StorageError::Io)?.is_dir() {
                continue;
            }

            let mut files = tokio::fs::read_dir(job.path())
                .await
                .map_err(StorageError::Io)?;
            while let Some(file) = files.next_entry().await.map_err(StorageError::Io)? {
                let path = file.path();
                let name_matches = file.file_name().to_string_lossy().contains(image_id);
                if name_matches
                    && is_image_file(&path)
                    && file.file_type().await.map_err(StorageError::Io)?.is_file()
                {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read a stored image's bytes.
    pub async fn read_image(&self, image_id: &str) -> Result<(PathBuf, Vec<u8>), StorageError> {
        let path = self
            .find_image(image_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(image_id.to_string()))?;
        let bytes = tokio::fs::read(&path).await.map_err(StorageError::Io)?;
        Ok((path, bytes))
    }

    /// Remove a stored image. Job metadata is left untouched.
    pub async fn delete_image(&self, image_id: &str) -> Result<PathBuf, StorageError> {
        let path = self
            .find_image(image_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(image_id.to_string()))?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(StorageError::Delete)?;
        Ok(path)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Reduce a caller-supplied image id to a safe file name fragment.
///
/// Keeps only the last path component, then drops everything except
/// alphanumerics and `.`, `-`, `_`.
pub fn sanitize_image_id(raw: &str) -> String {
    let last = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    last.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Failed to delete image: {0}")]
    Delete(#[source] std::io::Error),

    #[error("Filesystem error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Failed to serialize metadata: {0}")]
    Serialize(#[source] serde_json::Error),
}
