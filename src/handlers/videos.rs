use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{
        AnalyticsSummary, CreateVideoRequest, DashboardResponse, Video, VideoListQuery,
        VideoStatus,
    },
    utils::crypto,
};

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;
const DASHBOARD_RECENT: i64 = 5;

async fn refund_credit(state: &AppState, user_id: Uuid) {
    if let Err(refund_err) = state.credits.refund_credit(user_id).await {
        tracing::error!("Failed to refund credit: {}", refund_err);
    }
}

/// Renders a variation, stores it as the thumbnail and records the video.
/// Costs one credit, refunded if any step fails; a stored asset is removed
/// again when the record cannot be written.
#[utoipa::path(
    post,
    path = "/api/v1/videos",
    tag = "videos",
    security(("bearer" = [])),
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video created", body = Video),
        (status = 402, description = "No credits left"),
        (status = 404, description = "Unknown variation")
    )
)]
pub async fn create_video(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let variation = state
        .repository
        .get_variation(user.id, request.variation_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let title = match request.title.as_deref().map(str::trim) {
        Some(t) if t.chars().count() > 200 => {
            return Err(AppError::Validation("Title is limited to 200 characters".to_string()))
        }
        Some(t) if !t.is_empty() => t.to_string(),
        _ => variation.overlay.text.trim().to_string(),
    };
    let title = if title.is_empty() { variation.phrase.clone() } else { title };

    state.credits.consume_credit(user.id).await?;

    let rendered = async {
        let composite = state
            .compositor
            .compose(&variation.image, &variation.overlay)
            .await?;
        let key = format!("videos/{}/{}.png", user.id.simple(), crypto::generate_asset_id());
        state.media_store.store(&key, composite.png, "image/png").await
    }
    .await;

    let asset = match rendered {
        Ok(asset) => asset,
        Err(e) => {
            refund_credit(&state, user.id).await;
            return Err(e);
        }
    };

    let video = Video {
        id: Uuid::new_v4(),
        owner_id: user.id,
        title,
        thumbnail_url: Some(asset.url.clone()),
        status: VideoStatus::Completed,
        created_at: Utc::now(),
    };
    if let Err(e) = state.repository.insert_video(&video).await {
        if let Err(delete_err) = state.media_store.delete(&asset.key).await {
            tracing::error!(key = %asset.key, "Failed to remove orphaned asset: {}", delete_err);
        }
        refund_credit(&state, user.id).await;
        return Err(e);
    }

    tracing::info!(user_id = %user.id, video_id = %video.id, "Video created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Video created",
            "data": video
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos",
    tag = "videos",
    security(("bearer" = [])),
    params(VideoListQuery),
    responses((status = 200, description = "Newest first", body = [Video]))
)]
pub async fn list_videos(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<VideoListQuery>,
) -> Result<Json<serde_json::Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let videos = state.repository.list_videos(user.id, limit).await?;
    Ok(Json(json!({ "data": videos })))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "videos",
    security(("bearer" = [])),
    responses((status = 200, description = "Usage, recent videos and analytics", body = DashboardResponse))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let subscription = state.credits.usage(user.id).await?;
    let recent_videos = state.repository.list_videos(user.id, DASHBOARD_RECENT).await?;

    let response = DashboardResponse {
        subscription: subscription.usage(),
        recent_videos,
        analytics: AnalyticsSummary::default(),
    };
    Ok(Json(json!({ "data": response })))
}
