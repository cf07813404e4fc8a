use axum::{
    extract::{FromRequest, Request, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    errors::{AppError, Result},
    handlers::{
        upload::{is_multipart, read_form},
        AppState,
    },
    middleware::{AuthenticatedUser, EndpointRateLimiter},
    services::{TranscriptionSource, Transcript},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TranscribeUrlRequest {
    pub url: String,
}

async fn read_source(state: &AppState, request: Request) -> Result<TranscriptionSource> {
    if is_multipart(request.headers()) {
        let mut form = read_form(state, request).await?;
        if let Some(upload) = form.files.remove("file") {
            if !upload.content_type.starts_with("video/") && !upload.content_type.starts_with("audio/") {
                return Err(AppError::Validation("Please upload a video or audio file".to_string()));
            }
            return Ok(TranscriptionSource::File {
                file_name: upload.file_name.unwrap_or_else(|| "upload".to_string()),
                content_type: upload.content_type,
                bytes: upload.bytes,
            });
        }
        return match form.fields.remove("url") {
            Some(url) => TranscriptionSource::from_url(&url),
            None => Err(AppError::Validation("Provide a video file or URL".to_string())),
        };
    }

    let Json(body) = Json::<TranscribeUrlRequest>::from_request(request, state)
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?;
    TranscriptionSource::from_url(&body.url)
}

#[utoipa::path(
    post,
    path = "/api/v1/transcriptions",
    tag = "transcription",
    security(("bearer" = [])),
    request_body(
        content = TranscribeUrlRequest,
        description = "JSON with a video URL, or multipart with a `file` field"
    ),
    responses(
        (status = 200, description = "Transcript and summary", body = Transcript),
        (status = 400, description = "Bad URL or file"),
        (status = 502, description = "Transcription failed")
    )
)]
pub async fn transcribe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    request: Request,
) -> Result<Json<serde_json::Value>> {
    let source = read_source(&state, request).await?;
    EndpointRateLimiter::check_transcription_limit(&state, user.id).await?;

    let result = state.transcriber.transcribe(source).await;
    state.metrics.record_transcription(result.is_ok());
    let transcript = result?;

    Ok(Json(json!({ "data": transcript })))
}
