use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{
    errors::{AppError, Result},
    storage::{validate_key, MediaStore, StoredAsset},
};

/// Files under `UPLOAD_DIR`, served by the app at `/media`.
pub struct LocalMediaStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new<P: AsRef<Path>>(base_path: P, public_base_url: &str) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/media/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<StoredAsset> {
        validate_key(key)?;
        let full_path = self.full_path(key);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&full_path, &data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {}", e)))?;

        tracing::debug!(key = %key, content_type = %content_type, size = data.len(), "Stored media locally");

        Ok(StoredAsset {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        match fs::remove_file(self.full_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {}", e))),
        }
    }
}
