use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use serde_json::json;
use std::collections::HashMap;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    storage::StoredAsset,
    utils::{crypto, file},
};

pub(crate) struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields and files of a multipart body, keyed by field name.
#[derive(Default)]
pub(crate) struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

pub(crate) fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Reads every field. A part with a file name or a declared content type is a
/// file; everything else is text. Empty files are skipped.
pub(crate) async fn read_form(state: &AppState, request: Request) -> Result<FormData> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?;

    let mut form = FormData::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let declared = field.content_type().map(str::to_string);

        if file_name.is_some() || declared.is_some() {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            if bytes.len() > state.config.max_upload_size {
                return Err(AppError::Validation(format!(
                    "File exceeds the {} MB upload limit",
                    state.config.max_upload_size / (1024 * 1024)
                )));
            }
            if bytes.is_empty() {
                continue;
            }
            let content_type = file::resolve_mime_type(declared.as_deref(), file_name.as_deref());
            form.files.insert(
                name,
                UploadedFile { file_name, content_type, bytes: bytes.to_vec() },
            );
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    tag = "media",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Stored", body = StoredAsset),
        (status = 400, description = "Missing, oversized or unsupported file")
    )
)]
pub async fn upload_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    request: Request,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    if !is_multipart(request.headers()) {
        return Err(AppError::Validation("Expected a multipart/form-data body".to_string()));
    }

    let mut form = read_form(&state, request).await?;
    let upload = form
        .files
        .remove("file")
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    file::validate_mime_type(&upload.content_type, &state.config.allowed_mime_types)?;

    let sha256 = crypto::calculate_sha256(&upload.bytes);
    let key = format!(
        "uploads/{}/{}.{}",
        user.id.simple(),
        crypto::generate_asset_id(),
        file::get_file_extension(&upload.content_type)
    );
    let size = upload.bytes.len();

    let asset = state
        .media_store
        .store(&key, upload.bytes, &upload.content_type)
        .await?;

    tracing::info!(
        user_id = %user.id,
        key = %asset.key,
        size = size,
        original_name = ?upload.file_name,
        "Media uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "File uploaded successfully",
            "data": {
                "key": asset.key,
                "url": asset.url,
                "content_type": upload.content_type,
                "size": size,
                "sha256": sha256
            }
        })),
    ))
}
