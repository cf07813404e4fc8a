use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::errors::{AppError, Result};

pub fn validate_mime_type(mime_type: &str, allowed_types: &[String]) -> Result<()> {
    if !allowed_types.iter().any(|allowed| allowed == mime_type) {
        return Err(AppError::Validation(format!("Unsupported file type: {}", mime_type)));
    }
    Ok(())
}

pub fn get_file_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
}

/// Content type for an upload: the declared one, else a guess from the file name.
pub fn resolve_mime_type(declared: Option<&str>, file_name: Option<&str>) -> String {
    match declared {
        Some(declared) if declared != mime::APPLICATION_OCTET_STREAM.essence_str() => {
            declared.to_string()
        }
        _ => file_name
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string()),
    }
}

pub fn encode_data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
}

/// Decodes `data:<mime>;base64,<payload>` into its MIME type and bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| AppError::Validation("Not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::Validation("Malformed data URL".to_string()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| AppError::Validation("Only base64 data URLs are supported".to_string()))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::Validation("Invalid base64 image data".to_string()))?;

    let mime_type = if mime_type.is_empty() { "application/octet-stream" } else { mime_type };
    Ok((mime_type.to_string(), bytes))
}

/// Accepts either a data URL or bare base64 and returns bytes plus the sniffed image type.
pub fn decode_image_payload(payload: &str) -> Result<(String, Vec<u8>)> {
    let bytes = if payload.starts_with("data:") {
        decode_data_url(payload)?.1
    } else {
        STANDARD
            .decode(payload.trim())
            .map_err(|_| AppError::Validation("Invalid base64 image data".to_string()))?
    };

    let format = image::guess_format(&bytes)
        .map_err(|_| AppError::Validation("Could not determine image type".to_string()))?;
    let mime_type = format.to_mime_type().to_string();
    Ok((mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_round_trip() {
        let url = encode_data_url("image/png", b"\x89PNG");
        assert!(url.starts_with("data:image/png;base64,"));
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG");
    }

    #[test]
    fn test_malformed_data_urls() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png,rawtext").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_resolve_mime_type() {
        assert_eq!(resolve_mime_type(Some("image/png"), None), "image/png");
        assert_eq!(resolve_mime_type(None, Some("clip.mp4")), "video/mp4");
        assert_eq!(
            resolve_mime_type(Some("application/octet-stream"), Some("photo.jpg")),
            "image/jpeg"
        );
        assert_eq!(resolve_mime_type(None, None), "application/octet-stream");
    }

    #[test]
    fn test_mime_allow_list() {
        let allowed = vec!["image/png".to_string()];
        assert!(validate_mime_type("image/png", &allowed).is_ok());
        assert!(validate_mime_type("application/pdf", &allowed).is_err());
    }
}
