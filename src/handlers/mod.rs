use std::{sync::Arc, time::Duration};

use crate::{
    compositor::Compositor,
    config::Config,
    database::SharedRepository,
    errors::{AppError, Result},
    services::{CreditService, ImageGenerator, MetricsService, RedisService, Transcriber},
    storage::{create_store, SharedMediaStore},
};

pub mod auth;
pub mod docs;
pub mod health;
pub mod metrics;
pub mod subscription;
pub mod transcribe;
pub mod upload;
pub mod variations;
pub mod videos;

#[derive(Clone)]
pub struct AppState {
    pub repository: SharedRepository,
    pub redis: Option<RedisService>,
    pub config: Config,
    pub metrics: Arc<MetricsService>,
    pub credits: CreditService,
    pub compositor: Compositor,
    pub image_generator: ImageGenerator,
    pub transcriber: Transcriber,
    pub media_store: SharedMediaStore,
}

impl AppState {
    pub fn new(
        config: Config,
        repository: SharedRepository,
        redis: Option<RedisService>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("shortform-studio/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        let metrics = MetricsService::new().map_err(|e| AppError::Internal(e.into()))?;
        let media_store = create_store(&config, http.clone())?;

        Ok(Self {
            credits: CreditService::new(repository.clone()),
            compositor: Compositor::new(http.clone()),
            image_generator: ImageGenerator::new(http.clone(), &config),
            transcriber: Transcriber::new(http, &config),
            metrics: Arc::new(metrics),
            media_store,
            repository,
            redis,
            config,
        })
    }
}
