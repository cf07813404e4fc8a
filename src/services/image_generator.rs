use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    config::Config,
    errors::{AppError, Result},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// One generation call: the prompt, how many images, and an optional
/// reference image already encoded as a data URL.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, n: u32) -> Self {
        Self { prompt: prompt.into(), n, image: None }
    }

    pub fn with_input_image(mut self, data_url: String) -> Self {
        self.image = Some(data_url);
        self
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<GeneratedImage>,
    #[serde(default)]
    phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVariation {
    /// Remote URL or data URL.
    pub image: String,
    pub phrase: String,
}

/// Client for the hosted image-generation API.
#[derive(Clone)]
pub struct ImageGenerator {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    count: u32,
}

impl ImageGenerator {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            url: config.image_gen_url.clone(),
            api_key: config.image_gen_api_key.clone(),
            count: config.variation_count.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedVariation>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Image generation is not configured".to_string()))?;

        tracing::info!(
            prompt_len = request.prompt.len(),
            n = request.n,
            with_image = request.image.is_some(),
            "Requesting variations"
        );

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Image generation failed");
            return Err(AppError::Upstream(format!(
                "Image generation failed with status {}",
                status.as_u16()
            )));
        }

        let parsed: GenerationResponse = response.json().await?;
        let variations = pair_phrases(parsed, &request.prompt);
        if variations.is_empty() {
            return Err(AppError::Upstream("Image generation returned no images".to_string()));
        }

        Ok(variations)
    }
}

/// Images without a usable reference are dropped. Missing phrases fall back to the prompt.
fn pair_phrases(response: GenerationResponse, prompt: &str) -> Vec<GeneratedVariation> {
    let mut phrases = response.phrases.into_iter();

    response
        .images
        .into_iter()
        .filter_map(|img| match (img.url, img.b64_json) {
            (Some(url), _) if !url.is_empty() => Some(url),
            (_, Some(b64)) if !b64.trim().is_empty() => {
                Some(format!("data:image/png;base64,{}", b64.trim()))
            }
            _ => None,
        })
        .map(|image| {
            let phrase = phrases
                .next()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| prompt.to_string());
            GeneratedVariation { image, phrase }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn generator(server: &MockServer, key: Option<&str>) -> ImageGenerator {
        let mut config = Config::for_tests();
        config.image_gen_url = format!("{}/generate", server.uri());
        config.image_gen_api_key = key.map(str::to_string);
        ImageGenerator::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_generate_pairs_images_with_phrases() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"prompt": "sunset city", "n": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [
                    {"url": "https://img.example/1.png"},
                    {"b64_json": "iVBORw0KGgo="},
                    {"url": "https://img.example/3.png"}
                ],
                "phrases": ["Golden hour", "  "]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let variations = generator(&server, Some("sk-test"))
            .generate(&GenerationRequest::new("sunset city", 3))
            .await
            .unwrap();

        assert_eq!(variations.len(), 3);
        assert_eq!(variations[0].image, "https://img.example/1.png");
        assert_eq!(variations[0].phrase, "Golden hour");
        assert_eq!(variations[1].image, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(variations[1].phrase, "sunset city");
        assert_eq!(variations[2].phrase, "sunset city");
    }

    #[tokio::test]
    async fn test_vendor_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = generator(&server, Some("sk-test"))
            .generate(&GenerationRequest::new("x", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_empty_image_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": []})))
            .mount(&server)
            .await;

        assert!(generator(&server, Some("sk-test"))
            .generate(&GenerationRequest::new("x", 1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_calling_vendor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = generator(&server, None)
            .generate(&GenerationRequest::new("x", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
