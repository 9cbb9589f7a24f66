use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::logo::LogoRequest;

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

#[derive(Debug, Error)]
pub enum ImageApiError {
    #[error("image api rate limited the request")]
    RateLimited,
    #[error("image api rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to reach image api: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Remote logo image source.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &LogoRequest) -> Result<Vec<String>, ImageApiError>;
}

pub struct OpenAiImages {
    client: Client,
    api_key: String,
    variants: u8,
}

impl OpenAiImages {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            variants: 4,
        }
    }
}

#[derive(Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: String,
    size: &'a str,
    n: u8,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

pub fn build_prompt(request: &LogoRequest) -> String {
    let or = |value: &str, fallback: &'static str| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            fallback.to_string()
        } else {
            trimmed.to_string()
        }
    };
    format!(
        "Create a simple, clean logo for a small business.\n\n\
         Brand: {brand}\n\
         Slogan: {slogan}\n\
         Industry: {industry}\n\
         Style: {style}\n\
         Preferred Colors: {colors}\n\n\
         Guidelines:\n\
         - Flat vector style, centered on a solid background\n\
         - Balanced composition, crisp edges\n\
         - No small unreadable text, no text artifacts\n\
         - Suitable as a square app/logo mark\n",
        brand = request.brand_or_default(),
        slogan = request.slogan.trim(),
        industry = request.industry.trim(),
        style = or(&request.style, "Minimal"),
        colors = or(&request.colors, "brand-appropriate"),
    )
}

#[async_trait]
impl ImageGenerator for OpenAiImages {
    async fn generate(&self, request: &LogoRequest) -> Result<Vec<String>, ImageApiError> {
        let body = GenerationBody {
            model: "gpt-image-1",
            prompt: build_prompt(request),
            size: "1024x1024",
            n: self.variants,
        };

        let response = self
            .client
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ImageApiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| "image request failed".to_string());
            error!(status = status.as_u16(), %message, "image api returned an error");
            return Err(ImageApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerationResponse = response.json().await?;
        Ok(parsed
            .data
            .into_iter()
            .filter_map(|image| image.b64_json)
            .map(|b64| format!("data:image/png;base64,{b64}"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_fills_defaults() {
        let prompt = build_prompt(&LogoRequest::default());
        assert!(prompt.contains("Brand: My Brand"));
        assert!(prompt.contains("Style: Minimal"));
        assert!(prompt.contains("Preferred Colors: brand-appropriate"));
    }

    #[test]
    fn prompt_carries_request_fields() {
        let prompt = build_prompt(&LogoRequest {
            brand: "Bean There".to_string(),
            slogan: "Fresh daily".to_string(),
            industry: "Coffee".to_string(),
            style: "Bold".to_string(),
            colors: "#000, #fff".to_string(),
        });
        assert!(prompt.contains("Slogan: Fresh daily"));
        assert!(prompt.contains("Industry: Coffee"));
        assert!(prompt.contains("Preferred Colors: #000, #fff"));
    }
}
