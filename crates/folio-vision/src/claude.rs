//! Claude vision classifier on Anthropic's Messages API

use async_trait::async_trait;
use folio_core::models::{Classification, ImageAnalysis};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::classifier::{VisionClassifier, VisionError, VisionResult};
use crate::parse::{parse_analysis, parse_classification};

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

const ANALYSIS_PROMPT: &str = r#"Analyze this image from an art and tattoo studio portfolio.
Respond with JSON only, using exactly these fields:
{
  "tags": ["5 to 12 short lowercase descriptive tags"],
  "title": "a short title",
  "description": "one or two sentences describing the image",
  "alt_text": "concise accessibility text, under 125 characters"
}"#;

const CLASSIFICATION_PROMPT: &str = r#"Decide whether this image shows a tattoo (ink on skin) or an artwork (painting, drawing, print, flash sheet, digital art).
Respond with JSON only, using exactly these fields:
{
  "detected_type": "tattoo" | "artwork" | "unknown",
  "confidence": number between 0 and 1,
  "detections": {
    "tattoo": {"score": number between 0 and 1, "reasoning": "short explanation"},
    "artwork": {"score": number between 0 and 1, "reasoning": "short explanation"}
  },
  "suggested_tags": ["short lowercase tags"],
  "suggested_category": "optional portfolio category",
  "placement": "body placement if a tattoo, otherwise null",
  "style": "artistic style, e.g. traditional, fine line, watercolor"
}"#;

#[derive(Debug, Clone)]
pub struct ClaudeVisionConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Download the image and send it inline instead of passing the URL.
    pub inline_images: bool,
    pub api_base: String,
}

impl ClaudeVisionConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
            inline_images: false,
            api_base: API_BASE.to_string(),
        }
    }
}

// Messages API request/response structures
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<MessageParam>,
}

#[derive(Debug, Serialize)]
struct MessageParam {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImageSource {
    Url { url: String },
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlockResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlockResponse {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

pub struct ClaudeVisionClassifier {
    http_client: reqwest::Client,
    config: ClaudeVisionConfig,
}

impl Debug for ClaudeVisionClassifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ClaudeVisionClassifier")
            .field("model", &self.config.model)
            .finish()
    }
}

impl ClaudeVisionClassifier {
    pub fn new(config: ClaudeVisionConfig) -> VisionResult<Self> {
        if config.api_key.trim().len() < 10 {
            return Err(VisionError::NotConfigured);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VisionError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    async fn image_source(&self, image_url: &str) -> VisionResult<ImageSource> {
        if !self.config.inline_images {
            return Ok(ImageSource::Url {
                url: image_url.to_string(),
            });
        }

        let response = self
            .http_client
            .get(image_url)
            .send()
            .await
            .map_err(|e| VisionError::ImageFetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(VisionError::ImageFetch(format!(
                "{} returned {}",
                image_url,
                response.status()
            )));
        }
        let data = response
            .bytes()
            .await
            .map_err(|e| VisionError::ImageFetch(e.to_string()))?;

        use base64::Engine;
        Ok(ImageSource::Base64 {
            media_type: detect_media_type(&data).to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(&data),
        })
    }

    /// Send one image plus prompt and return the first text block of the reply.
    async fn ask(&self, image_url: &str, prompt: &str) -> VisionResult<String> {
        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![MessageParam {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Image {
                        source: self.image_source(image_url).await?,
                    },
                    ContentBlock::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let start = std::time::Instant::now();
        let response = self
            .http_client
            .post(format!("{}/messages", self.config.api_base.trim_end_matches('/')))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| VisionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;

        tracing::debug!(
            model = %self.config.model,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Claude vision request completed"
        );

        parsed
            .content
            .into_iter()
            .find_map(|b| match b {
                ContentBlockResponse::Text { text } => Some(text),
                ContentBlockResponse::Other => None,
            })
            .ok_or_else(|| VisionError::MalformedResponse("response has no text block".to_string()))
    }
}

#[async_trait]
impl VisionClassifier for ClaudeVisionClassifier {
    fn name(&self) -> &str {
        "claude_vision"
    }

    #[tracing::instrument(skip(self))]
    async fn analyze(&self, image_url: &str) -> VisionResult<ImageAnalysis> {
        let text = self.ask(image_url, ANALYSIS_PROMPT).await?;
        parse_analysis(&text)
    }

    #[tracing::instrument(skip(self))]
    async fn classify(&self, image_url: &str) -> VisionResult<Classification> {
        let text = self.ask(image_url, CLASSIFICATION_PROMPT).await?;
        parse_classification(&text)
    }
}

/// Detect media type from image data using magic numbers
fn detect_media_type(data: &[u8]) -> &'static str {
    if data.len() >= 8 && data[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return "image/png";
    }
    if data.len() >= 6 && &data[..3] == b"GIF" {
        return "image/gif";
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return "image/webp";
    }
    "image/jpeg"
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::models::MediaCategory;
    use mockito::Matcher;
    use serde_json::json;

    fn reply(text: &str) -> String {
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 10, "output_tokens": 20}
        })
        .to_string()
    }

    fn classifier(server: &mockito::ServerGuard, inline: bool) -> ClaudeVisionClassifier {
        let mut config = ClaudeVisionConfig::new("sk-ant-test-key-123", "claude-test");
        config.api_base = format!("{}/v1", server.url());
        config.inline_images = inline;
        ClaudeVisionClassifier::new(config).unwrap()
    }

    #[tokio::test]
    async fn classify_parses_fenced_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test-key-123")
            .match_header("anthropic-version", API_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-test",
                "messages": [{"role": "user", "content": [
                    {"type": "image", "source": {"type": "url", "url": "https://cdn.example/koi.jpg"}}
                ]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply(
                "```json\n{\"detected_type\": \"tattoo\", \"confidence\": 0.85, \"suggested_tags\": [\"koi\"]}\n```",
            ))
            .create_async()
            .await;

        let result = classifier(&server, false)
            .classify("https://cdn.example/koi.jpg")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.detected_type, MediaCategory::Tattoo);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.suggested_tags, vec!["koi"]);
    }

    #[tokio::test]
    async fn analyze_returns_typed_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(reply(
                r#"{"tags": ["sunset", "ocean"], "title": "Sunset", "description": "A sunset over the sea.", "alt_text": "Orange sunset over calm water"}"#,
            ))
            .create_async()
            .await;

        let analysis = classifier(&server, false)
            .analyze("https://cdn.example/sunset.jpg")
            .await
            .unwrap();

        assert_eq!(analysis.tags, vec!["sunset", "ocean"]);
        assert_eq!(analysis.alt_text, "Orange sunset over calm water");
    }

    #[tokio::test]
    async fn api_errors_surface_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type": "error", "error": {"type": "overloaded_error"}}"#)
            .create_async()
            .await;

        let err = classifier(&server, false)
            .classify("https://cdn.example/x.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, VisionError::Api { status: 529, .. }));
    }

    #[tokio::test]
    async fn prose_reply_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(reply("I think this is probably a tattoo."))
            .create_async()
            .await;

        let err = classifier(&server, false)
            .classify("https://cdn.example/x.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, VisionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn inline_mode_sends_base64() {
        let mut server = mockito::Server::new_async().await;
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        server
            .mock("GET", "/media/flash.png")
            .with_status(200)
            .with_body(png_magic)
            .create_async()
            .await;
        let api = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::PartialJson(json!({
                "messages": [{"content": [
                    {"type": "image", "source": {"type": "base64", "media_type": "image/png"}}
                ]}]
            })))
            .with_status(200)
            .with_body(reply(r#"{"detected_type": "artwork", "confidence": 0.7}"#))
            .create_async()
            .await;

        let url = format!("{}/media/flash.png", server.url());
        let result = classifier(&server, true).classify(&url).await.unwrap();

        api.assert_async().await;
        assert_eq!(result.detected_type, MediaCategory::Artwork);
    }

    #[test]
    fn rejects_placeholder_key() {
        let config = ClaudeVisionConfig::new("sk-ant-", "claude-test");
        assert!(matches!(
            ClaudeVisionClassifier::new(config),
            Err(VisionError::NotConfigured)
        ));
    }
}
