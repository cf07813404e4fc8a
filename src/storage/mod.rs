use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::{Config, StorageBackend};
use crate::errors::{AppError, Result};

pub mod cdn;
pub mod local;

pub use cdn::CdnMediaStore;
pub use local::LocalMediaStore;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StoredAsset {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<StoredAsset>;

    async fn delete(&self, key: &str) -> Result<()>;
}

pub type SharedMediaStore = Arc<dyn MediaStore>;

/// Keys are relative, slash separated and never climb out of the store root.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::Storage(format!("Invalid storage key: {}", key)))
    }
}

pub fn create_store(config: &Config, http: reqwest::Client) -> Result<SharedMediaStore> {
    match config.storage.backend {
        StorageBackend::Local => {
            let store = LocalMediaStore::new(
                &config.storage.upload_dir,
                &config.storage.public_base_url,
            )?;
            Ok(Arc::new(store))
        }
        StorageBackend::Cdn => {
            let (Some(url), Some(api_key), Some(api_secret)) = (
                config.storage.cdn_url.as_ref(),
                config.storage.cdn_api_key.as_ref(),
                config.storage.cdn_api_secret.as_ref(),
            ) else {
                return Err(AppError::Storage(
                    "MEDIA_CDN_URL, MEDIA_CDN_API_KEY and MEDIA_CDN_API_SECRET are required for the cdn backend"
                        .to_string(),
                ));
            };
            Ok(Arc::new(CdnMediaStore::new(http, url, api_key, api_secret)))
        }
    }
}
