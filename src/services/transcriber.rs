use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

use crate::{
    config::Config,
    errors::{AppError, Result},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub enum TranscriptionSource {
    Url(String),
    File {
        bytes: Vec<u8>,
        file_name: String,
        content_type: String,
    },
}

impl TranscriptionSource {
    /// Only absolute http(s) links are forwarded to the vendor.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        let parsed = reqwest::Url::parse(url)
            .map_err(|_| AppError::Validation("Please provide a valid video URL".to_string()))?;
        match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some() => Ok(Self::Url(parsed.to_string())),
            _ => Err(AppError::Validation(
                "Only http and https video URLs are supported".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Transcript {
    pub transcript: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Clone)]
pub struct Transcriber {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl Transcriber {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            url: config.transcribe_url.clone(),
            api_key: config.transcribe_api_key.clone(),
        }
    }

    pub async fn transcribe(&self, source: TranscriptionSource) -> Result<Transcript> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Transcription is not configured".to_string()))?;

        let request = self.http.post(&self.url).bearer_auth(api_key).timeout(REQUEST_TIMEOUT);
        let request = match source {
            TranscriptionSource::Url(url) => {
                tracing::info!(url = %url, "Transcribing remote video");
                request.json(&serde_json::json!({ "url": url }))
            }
            TranscriptionSource::File { bytes, file_name, content_type } => {
                tracing::info!(file_name = %file_name, size = bytes.len(), "Transcribing uploaded video");
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|e| AppError::Validation(format!("Invalid content type: {}", e)))?;
                request.multipart(Form::new().part("file", part))
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Transcription failed");
            return Err(AppError::Upstream(format!(
                "Transcription failed with status {}",
                status.as_u16()
            )));
        }

        let transcript: Transcript = response.json().await?;
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, header, header_regex, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn transcriber(server: &MockServer) -> Transcriber {
        let mut config = Config::for_tests();
        config.transcribe_url = format!("{}/transcribe", server.uri());
        config.transcribe_api_key = Some("tk-test".to_string());
        Transcriber::new(reqwest::Client::new(), &config)
    }

    #[test]
    fn test_url_scheme_checked() {
        assert!(TranscriptionSource::from_url("https://videos.example/a.mp4").is_ok());
        assert!(TranscriptionSource::from_url("ftp://videos.example/a.mp4").is_err());
        assert!(TranscriptionSource::from_url("not a url").is_err());
        assert!(TranscriptionSource::from_url("file:///etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_url_transcription() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .and(header("authorization", "Bearer tk-test"))
            .and(body_json(json!({"url": "https://videos.example/a.mp4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transcript": "hello there",
                "summary": "a greeting"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = TranscriptionSource::from_url("https://videos.example/a.mp4").unwrap();
        let result = transcriber(&server).transcribe(source).await.unwrap();
        assert_eq!(result.transcript, "hello there");
        assert_eq!(result.summary, "a greeting");
    }

    #[tokio::test]
    async fn test_file_transcription_is_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transcript": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let source = TranscriptionSource::File {
            bytes: vec![0, 1, 2, 3],
            file_name: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
        };
        let result = transcriber(&server).transcribe(source).await.unwrap();
        assert_eq!(result.transcript, "ok");
        assert_eq!(result.summary, "");
    }

    #[tokio::test]
    async fn test_vendor_failure_surfaces_as_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = TranscriptionSource::from_url("https://videos.example/a.mp4").unwrap();
        let err = transcriber(&server).transcribe(source).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
