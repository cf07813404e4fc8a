use anyhow::Result;
use serde::Serialize;
use std::{env, str::FromStr};

use crate::models::Plan;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub port: u16,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub max_upload_size: usize,
    pub allowed_mime_types: Vec<String>,
    pub image_gen_url: String,
    pub image_gen_api_key: Option<String>,
    pub variation_count: u32,
    pub transcribe_url: String,
    pub transcribe_api_key: Option<String>,
    pub storage: StorageConfig,
    pub generation_rate_limit: u32,
    pub generation_rate_window: u64,
    pub default_plan: Plan,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub upload_dir: String,
    pub public_base_url: String,
    pub cdn_url: Option<String>,
    pub cdn_api_key: Option<String>,
    pub cdn_api_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Cdn,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "cdn" => Ok(StorageBackend::Cdn),
            other => anyhow::bail!("Unsupported storage backend: {}", other),
        }
    }
}

/// Which secrets are configured. Values are never reported.
#[derive(Debug, Clone, Serialize)]
pub struct SecretPresence {
    pub jwt_secret: bool,
    pub image_gen_api_key: bool,
    pub transcribe_api_key: bool,
    pub media_cdn_credentials: bool,
}

const DEFAULT_JWT_SECRET: &str = "change-me";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse()?;

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/shortform_studio".to_string()),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            port,
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            bcrypt_cost: env::var("BCRYPT_COST")
                .map(|v| v.parse())
                .unwrap_or(Ok(bcrypt::DEFAULT_COST))?,
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "20971520".to_string()) // 20MB
                .parse()?,
            allowed_mime_types: env::var("ALLOWED_MIME_TYPES")
                .unwrap_or_else(|_| "image/jpeg,image/png,image/webp,video/mp4,video/quicktime".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            image_gen_url: env::var("IMAGE_GEN_URL")
                .unwrap_or_else(|_| "https://api.imagegen.example/v1/variations".to_string()),
            image_gen_api_key: env::var("IMAGE_GEN_API_KEY").ok().filter(|s| !s.is_empty()),
            variation_count: env::var("VARIATION_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,
            transcribe_url: env::var("TRANSCRIBE_URL")
                .unwrap_or_else(|_| "https://api.transcribe.example/v1/summarize".to_string()),
            transcribe_api_key: env::var("TRANSCRIBE_API_KEY").ok().filter(|s| !s.is_empty()),
            storage: StorageConfig {
                backend,
                upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{}", port)),
                cdn_url: env::var("MEDIA_CDN_URL").ok().filter(|s| !s.is_empty()),
                cdn_api_key: env::var("MEDIA_CDN_API_KEY").ok().filter(|s| !s.is_empty()),
                cdn_api_secret: env::var("MEDIA_CDN_API_SECRET").ok().filter(|s| !s.is_empty()),
            },
            generation_rate_limit: env::var("GENERATION_RATE_LIMIT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            generation_rate_window: env::var("GENERATION_RATE_WINDOW")
                .unwrap_or_else(|_| "3600".to_string()) // 1 hour
                .parse()?,
            default_plan: env::var("DEFAULT_PLAN")
                .unwrap_or_else(|_| "free".to_string())
                .parse()?,
        })
    }

    pub fn secret_presence(&self) -> SecretPresence {
        SecretPresence {
            jwt_secret: self.jwt_secret != DEFAULT_JWT_SECRET && !self.jwt_secret.is_empty(),
            image_gen_api_key: self.image_gen_api_key.is_some(),
            transcribe_api_key: self.transcribe_api_key.is_some(),
            media_cdn_credentials: self.storage.cdn_url.is_some()
                && self.storage.cdn_api_key.is_some()
                && self.storage.cdn_api_secret.is_some(),
        }
    }

    /// Settings for tests and local runs without any vendor configured.
    pub fn for_tests() -> Self {
        Config {
            database_url: "memory".to_string(),
            redis_url: None,
            port: 0,
            jwt_secret: "test-secret".to_string(),
            bcrypt_cost: 4,
            max_upload_size: 5 * 1024 * 1024,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "video/mp4".to_string(),
            ],
            image_gen_url: "http://127.0.0.1:9/generate".to_string(),
            image_gen_api_key: None,
            variation_count: 3,
            transcribe_url: "http://127.0.0.1:9/transcribe".to_string(),
            transcribe_api_key: None,
            storage: StorageConfig {
                backend: StorageBackend::Local,
                upload_dir: std::env::temp_dir()
                    .join("shortform-studio-tests")
                    .to_string_lossy()
                    .to_string(),
                public_base_url: "http://localhost".to_string(),
                cdn_url: None,
                cdn_api_key: None,
                cdn_api_secret: None,
            },
            generation_rate_limit: 30,
            generation_rate_window: 3600,
            default_plan: Plan::Free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_presence_reports_flags_only() {
        let mut config = Config::for_tests();
        config.image_gen_api_key = Some("sk-live".to_string());

        let presence = config.secret_presence();
        assert!(presence.jwt_secret);
        assert!(presence.image_gen_api_key);
        assert!(!presence.transcribe_api_key);
        assert!(!presence.media_cdn_credentials);

        let rendered = serde_json::to_string(&presence).unwrap();
        assert!(!rendered.contains("sk-live"));
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!(" CDN ".parse::<StorageBackend>().unwrap(), StorageBackend::Cdn);
        assert!("s3".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_jwt_secret_is_not_counted() {
        let mut config = Config::for_tests();
        config.jwt_secret = DEFAULT_JWT_SECRET.to_string();
        assert!(!config.secret_presence().jwt_secret);
    }
}
