use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

use crate::{
    errors::{AppError, Result},
    storage::{validate_key, MediaStore, StoredAsset},
    utils::crypto::sign_params,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Hosted media CDN with signed uploads.
///
/// Every request carries `api_key`, `timestamp` and `signature`, where the
/// signature is `sha256(sorted(public_id, timestamp) + secret)`.
pub struct CdnMediaStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: Option<String>,
}

impl CdnMediaStore {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    fn signed_fields(&self, public_id: &str) -> Vec<(&'static str, String)> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id.to_string()), ("timestamp", timestamp.clone())],
            &self.api_secret,
        );

        vec![
            ("api_key", self.api_key.clone()),
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("signature", signature),
        ]
    }
}

fn public_id_for(key: &str) -> &str {
    key.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(key)
}

#[async_trait]
impl MediaStore for CdnMediaStore {
    async fn store(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<StoredAsset> {
        validate_key(key)?;
        let public_id = public_id_for(key);
        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|e| AppError::Storage(format!("Invalid content type: {}", e)))?;

        let form = self
            .signed_fields(public_id)
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Media upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Storage(format!("Media upload rejected with status {}", status.as_u16())));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("Unexpected media upload response: {}", e)))?;

        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| AppError::Storage("Media upload response had no URL".to_string()))?;

        tracing::debug!(key = %key, public_id = ?body.public_id, "Uploaded media to CDN");

        Ok(StoredAsset { key: key.to_string(), url })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let fields = self.signed_fields(public_id_for(key));

        let response = self
            .http
            .post(format!("{}/destroy", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .form(&fields)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Media delete failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "Media delete rejected with status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}
