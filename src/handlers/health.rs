use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{errors::Result, handlers::AppState};

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is up; lists which secrets are configured"))
)]
pub async fn liveness(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "secrets": state.config.secret_presence()
    })))
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies reachable"),
        (status = 503, description = "A dependency is down")
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_status = match state.repository.health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            "unhealthy"
        }
    };

    let redis_status = match &state.redis {
        None => "disabled",
        Some(redis) => match redis.ping().await {
            Ok(()) => "healthy",
            Err(e) => {
                tracing::warn!("Redis health check failed: {}", e);
                "unhealthy"
            }
        },
    };

    let ready = db_status == "healthy" && redis_status != "unhealthy";
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": {
                "database": db_status,
                "redis": redis_status
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
