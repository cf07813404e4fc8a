use axum::{extract::State, response::Json};
use serde_json::json;

use crate::{
    errors::Result, handlers::AppState, middleware::AuthenticatedUser, models::SubscriptionUsage,
};

#[utoipa::path(
    get,
    path = "/api/v1/subscription",
    tag = "subscription",
    security(("bearer" = [])),
    responses((status = 200, description = "Plan and usage for the current period", body = SubscriptionUsage))
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let subscription = state.credits.usage(user.id).await?;
    Ok(Json(json!({ "data": subscription.usage() })))
}

/// Explicit decrement-on-use for clients that charge outside a download.
#[utoipa::path(
    post,
    path = "/api/v1/credits/consume",
    tag = "subscription",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Credit consumed", body = SubscriptionUsage),
        (status = 402, description = "No credits left")
    )
)]
pub async fn consume_credit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let subscription = state.credits.consume_credit(user.id).await?;
    Ok(Json(json!({
        "message": "Credit consumed",
        "data": subscription.usage()
    })))
}
