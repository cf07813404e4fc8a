use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{
    auth::{JwtService, PasswordService},
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{
        AuthResponse, CreateUserRequest, LoginRequest, RefreshRequest, User, UserResponse,
    },
};

fn issue_tokens(state: &AppState, user: User) -> Result<AuthResponse> {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    Ok(AuthResponse {
        access_token: jwt_service.generate_access_token(user.id, &user.email)?,
        refresh_token: jwt_service.generate_refresh_token(user.id, &user.email)?,
        user: UserResponse::from(user),
    })
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("Invalid email format".to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid email, weak password or duplicate account")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let email = normalize_email(&request.email)?;
    PasswordService::validate_password_strength(&request.password)?;

    if state.repository.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Validation("User with this email already exists".to_string()));
    }

    let password = request.password;
    let cost = state.config.bcrypt_cost;
    let password_hash =
        tokio::task::spawn_blocking(move || PasswordService::hash_password(&password, cost))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

    let (user, subscription) = state
        .repository
        .create_account(&email, &password_hash, state.config.default_plan)
        .await?;

    tracing::info!(user_id = %user.id, plan = %subscription.plan, "User registered");

    let response = issue_tokens(&state, user)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "data": response
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let invalid = || AppError::Auth("Invalid email or password".to_string());

    let email = normalize_email(&request.email).map_err(|_| invalid())?;
    let user = state
        .repository
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    let password = request.password;
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || PasswordService::verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    if !valid {
        return Err(invalid());
    }

    let response = issue_tokens(&state, user)?;
    Ok(Json(json!({
        "message": "Login successful",
        "data": response
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token"),
        (status = 401, description = "Invalid refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>> {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = jwt_service.verify_refresh_token(&request.refresh_token)?;
    let user_id = claims.user_id()?;

    let user = state
        .repository
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Auth("User not found".to_string()))?;

    let access_token = jwt_service.generate_access_token(user.id, &user.email)?;

    Ok(Json(json!({
        "message": "Token refreshed successfully",
        "data": {
            "access_token": access_token,
            "user": UserResponse::from(user)
        }
    })))
}

/// Tokens are stateless; the client discards them.
pub async fn logout(_user: AuthenticatedUser) -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "message": "Logged out successfully"
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses((status = 200, description = "Current user", body = UserResponse))
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let user = state
        .repository
        .find_user_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(json!({ "data": UserResponse::from(user) })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email(" Maya@Example.com ").unwrap(), "maya@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@localhost").is_err());
    }
}
