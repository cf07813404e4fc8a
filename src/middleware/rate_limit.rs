use std::time::Duration;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    services::RateLimiter,
};

/// Per-user limits on the endpoints that call paid vendors.
pub struct EndpointRateLimiter;

impl EndpointRateLimiter {
    pub async fn check_generation_limit(state: &AppState, user_id: Uuid) -> Result<()> {
        Self::check(state, "generate", user_id).await
    }

    pub async fn check_transcription_limit(state: &AppState, user_id: Uuid) -> Result<()> {
        Self::check(state, "transcribe", user_id).await
    }

    async fn check(state: &AppState, scope: &str, user_id: Uuid) -> Result<()> {
        // Without Redis there is nothing to count against.
        let Some(redis) = state.redis.clone() else {
            return Ok(());
        };

        let limiter = RateLimiter::new(redis);
        let window = Duration::from_secs(state.config.generation_rate_window);
        match limiter
            .check(scope, user_id, state.config.generation_rate_limit, window)
            .await
        {
            Ok(result) if result.allowed => Ok(()),
            Ok(result) => {
                tracing::info!(
                    user_id = %user_id,
                    scope = scope,
                    current = result.current,
                    limit = result.limit,
                    "Rate limit exceeded"
                );
                Err(AppError::RateLimit)
            }
            Err(e) => {
                tracing::warn!("Rate limiter unavailable, allowing request: {}", e);
                Ok(())
            }
        }
    }
}
