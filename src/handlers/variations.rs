use axum::{
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::io::Cursor;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    handlers::{
        upload::{is_multipart, read_form},
        AppState,
    },
    middleware::{AuthenticatedUser, EndpointRateLimiter},
    models::{GenerateVariationsRequest, Variation, VariationUpdate, MAX_PROMPT_CHARS},
    services::GenerationRequest,
    utils::file,
};

struct GenerationInput {
    prompt: String,
    image: Option<(String, Vec<u8>)>,
}

async fn read_generation_input(state: &AppState, request: Request) -> Result<GenerationInput> {
    if is_multipart(request.headers()) {
        let mut form = read_form(state, request).await?;
        let prompt = form.fields.remove("prompt").unwrap_or_default();
        let image = form.files.remove("image").map(|f| (f.content_type, f.bytes));
        return Ok(GenerationInput { prompt, image });
    }

    let Json(body) = Json::<GenerateVariationsRequest>::from_request(request, state)
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?;

    let image = match body.image.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(payload) => Some(file::decode_image_payload(payload)?),
        None => None,
    };
    Ok(GenerationInput { prompt: body.prompt, image })
}

fn validate_prompt(prompt: &str) -> Result<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("Please describe the image you want".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(AppError::Validation(format!(
            "Prompt is limited to {} characters",
            MAX_PROMPT_CHARS
        )));
    }
    Ok(prompt.to_string())
}

/// Checks size, type and header of an input image and returns it as a data URL.
fn encode_input_image(state: &AppState, declared_mime: &str, bytes: &[u8]) -> Result<String> {
    if bytes.len() > state.config.max_upload_size {
        return Err(AppError::Validation(format!(
            "Image exceeds the {} MB upload limit",
            state.config.max_upload_size / (1024 * 1024)
        )));
    }
    if !declared_mime.starts_with("image/") {
        return Err(AppError::Validation("Input must be an image".to_string()));
    }

    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| AppError::Validation("Could not read image".to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| AppError::Validation("Unrecognized image format".to_string()))?;
    let mime_type = format.to_mime_type();
    file::validate_mime_type(mime_type, &state.config.allowed_mime_types)?;
    reader
        .into_dimensions()
        .map_err(|_| AppError::Validation("Image is corrupt or truncated".to_string()))?;

    Ok(file::encode_data_url(mime_type, bytes))
}

#[utoipa::path(
    post,
    path = "/api/v1/variations",
    tag = "variations",
    security(("bearer" = [])),
    request_body(
        content = GenerateVariationsRequest,
        description = "JSON, or multipart with a `prompt` field and optional `image` file"
    ),
    responses(
        (status = 201, description = "New variation set", body = [Variation]),
        (status = 402, description = "Monthly quota used up"),
        (status = 429, description = "Too many generations"),
        (status = 502, description = "Image generation failed")
    )
)]
pub async fn generate_variations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    request: Request,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let input = read_generation_input(&state, request).await?;
    let prompt = validate_prompt(&input.prompt)?;
    let image = match &input.image {
        Some((mime, bytes)) => Some(encode_input_image(&state, mime, bytes)?),
        None => None,
    };

    EndpointRateLimiter::check_generation_limit(&state, user.id).await?;
    state.credits.consume_quota(user.id).await?;

    let mut request = GenerationRequest::new(prompt, state.image_generator.count());
    if let Some(data_url) = image {
        request = request.with_input_image(data_url);
    }

    let generated = match state.image_generator.generate(&request).await {
        Ok(generated) => generated,
        Err(e) => {
            state.metrics.record_generation(false);
            if let Err(refund_err) = state.credits.refund_quota(user.id).await {
                tracing::error!("Failed to refund generation quota: {}", refund_err);
            }
            return Err(e);
        }
    };

    let variations: Vec<Variation> = generated
        .into_iter()
        .enumerate()
        .map(|(index, g)| Variation::new(user.id, index as i32, g.image, g.phrase))
        .collect();
    state.repository.replace_variations(user.id, &variations).await?;
    state.metrics.record_generation(true);

    tracing::info!(user_id = %user.id, count = variations.len(), "Variations generated");

    let usage = state.credits.usage(user.id).await?.usage();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Variations generated",
            "data": {
                "variations": variations,
                "subscription": usage
            }
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/variations",
    tag = "variations",
    security(("bearer" = [])),
    responses((status = 200, description = "Current variation set", body = [Variation]))
)]
pub async fn list_variations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let variations = state.repository.list_variations(user.id).await?;
    Ok(Json(json!({ "data": variations })))
}

async fn owned_variation(state: &AppState, user: &AuthenticatedUser, id: Uuid) -> Result<Variation> {
    state
        .repository
        .get_variation(user.id, id)
        .await?
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    patch,
    path = "/api/v1/variations/{id}",
    tag = "variations",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Variation id")),
    request_body = VariationUpdate,
    responses(
        (status = 200, description = "Updated overlay", body = Variation),
        (status = 400, description = "Invalid edit; nothing was changed"),
        (status = 404, description = "Unknown variation")
    )
)]
pub async fn update_variation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(update): Json<VariationUpdate>,
) -> Result<Json<serde_json::Value>> {
    let variation = state
        .repository
        .modify_variation(user.id, id, &|v: &mut Variation| v.apply(update.clone()))
        .await?;
    Ok(Json(json!({ "data": variation })))
}

#[utoipa::path(
    post,
    path = "/api/v1/variations/{id}/reset",
    tag = "variations",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Variation id")),
    responses((status = 200, description = "Overlay restored", body = Variation))
)]
pub async fn reset_variation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let variation = state
        .repository
        .modify_variation(user.id, id, &|v: &mut Variation| {
            v.reset();
            Ok(())
        })
        .await?;
    Ok(Json(json!({ "data": variation })))
}

/// Charges one credit, then returns the flattened PNG as an attachment.
/// The credit is given back if compositing fails.
#[utoipa::path(
    post,
    path = "/api/v1/variations/{id}/download",
    tag = "variations",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Variation id")),
    responses(
        (status = 200, description = "PNG attachment", content_type = "image/png"),
        (status = 402, description = "No credits left"),
        (status = 422, description = "Nothing could be rendered")
    )
)]
pub async fn download_variation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let variation = owned_variation(&state, &user, id).await?;
    let subscription = state.credits.consume_credit(user.id).await?;

    let composite = match state.compositor.compose(&variation.image, &variation.overlay).await {
        Ok(composite) => composite,
        Err(e) => {
            if let Err(refund_err) = state.credits.refund_credit(user.id).await {
                tracing::error!("Failed to refund credit: {}", refund_err);
            }
            return Err(e);
        }
    };
    state.metrics.record_download(composite.used_fallback);

    let headers = [
        ("content-type", "image/png".to_string()),
        (
            "content-disposition",
            format!("attachment; filename=\"variation-{}.png\"", variation.index + 1),
        ),
        ("x-composite-fallback", composite.used_fallback.to_string()),
        ("x-credits-remaining", subscription.credits_remaining().to_string()),
    ];
    Ok((headers, composite.png).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, database::MemoryRepository};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Config::for_tests(), Arc::new(MemoryRepository::new()), None).unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_prompt_validation() {
        assert_eq!(validate_prompt("  neon city  ").unwrap(), "neon city");
        assert!(validate_prompt("   ").is_err());
        assert!(validate_prompt(&"a".repeat(MAX_PROMPT_CHARS + 1)).is_err());
    }

    #[test]
    fn test_input_image_becomes_data_url() {
        let url = encode_input_image(&state(), "image/png", &png_bytes()).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_non_image_rejected() {
        let state = state();
        assert!(encode_input_image(&state, "video/mp4", &png_bytes()).is_err());
        assert!(encode_input_image(&state, "image/png", b"not an image at all").is_err());
    }

    #[test]
    fn test_oversized_image_rejected() {
        let mut config = Config::for_tests();
        config.max_upload_size = 8;
        let state = AppState::new(config, Arc::new(MemoryRepository::new()), None).unwrap();
        assert!(encode_input_image(&state, "image/png", &png_bytes()).is_err());
    }
}
