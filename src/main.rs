use anyhow::Context;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shortform_studio::{
    config::Config, create_app, database, handlers::AppState, services::RedisService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortform_studio=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let presence = config.secret_presence();
    if !presence.jwt_secret {
        tracing::warn!("JWT_SECRET is not set; using an insecure default");
    }
    if !presence.image_gen_api_key {
        tracing::warn!("IMAGE_GEN_API_KEY is not set; variation generation will fail");
    }
    if !presence.transcribe_api_key {
        tracing::warn!("TRANSCRIBE_API_KEY is not set; transcription will fail");
    }

    let repository = database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let redis = match config.redis_url.as_deref() {
        Some(url) => Some(RedisService::new(url).await.context("Failed to connect to Redis")?),
        None => {
            tracing::warn!("REDIS_URL is not set; rate limiting is disabled");
            None
        }
    };

    let port = config.port;
    let state = AppState::new(config, repository, redis).context("Failed to build application state")?;
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Shortform studio listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
