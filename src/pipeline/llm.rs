//! Vision model interaction: build the request and call the API.
//!
//! One call per submission, no retries, no history. Everything the model
//! needs travels in a single `generateContent` body:
//!
//! 1. **System instruction** — the fixed reporting rules
//! 2. **User turn** — the scan as an inline base64 part, then the prompt text
//!
//! Failures never escape as `Err` from here in a way that could crash the
//! session: every outcome of the HTTP exchange is mapped onto
//! [`AnalysisError`], which the orchestrator folds into an
//! [`crate::output::AnalysisResult`].

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ScanReportError};
use crate::pipeline::encode::encode_image;
use crate::pipeline::input::ImageAsset;
use crate::prompts::{user_prompt_for, DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_USER_PROMPT};
use chrono::{Local, NaiveDate};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

// ── Wire types ──────────────────────────────────────────────────────────

/// Content container used for the system instruction and the user turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// Text or inline-media content part.
///
/// Variant order matters for `#[serde(untagged)]` decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Base64 inline payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

/// Top-level `generateContent` request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

// ── Request assembly ────────────────────────────────────────────────────

/// One submission: the image plus the two fixed instruction strings.
///
/// Built fresh for every call and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    image: ImageAsset,
    system_instruction: String,
    user_prompt: String,
}

impl AnalysisRequest {
    /// Assemble a request dated today.
    pub fn new(image: ImageAsset, config: &AnalysisConfig) -> Self {
        Self::dated(image, config, Local::now().date_naive())
    }

    /// Assemble a request with an explicit date for the prompt's date line.
    pub fn dated(image: ImageAsset, config: &AnalysisConfig, date: NaiveDate) -> Self {
        let system_instruction = config
            .system_instruction
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
            .to_string();
        let template = config.user_prompt.as_deref().unwrap_or(DEFAULT_USER_PROMPT);

        Self {
            image,
            system_instruction,
            user_prompt: user_prompt_for(template, date),
        }
    }

    pub fn image(&self) -> &ImageAsset {
        &self.image
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    /// The JSON body for this request.
    pub fn to_body(&self, config: &AnalysisConfig) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: self.system_instruction.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::InlineData {
                        inline_data: encode_image(&self.image),
                    },
                    Part::Text {
                        text: self.user_prompt.clone(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: config.max_output_tokens,
                response_mime_type: "text/plain".to_string(),
            },
        }
    }
}

// ── Client seam ─────────────────────────────────────────────────────────

/// Anything that can turn an [`AnalysisRequest`] into report text.
///
/// [`GeminiClient`] is the production implementation; tests substitute
/// in-process fakes.
pub trait VisionClient: Send + Sync {
    fn generate<'a>(&'a self, request: &'a AnalysisRequest) -> BoxFuture<'a, Result<String, AnalysisError>>;
}

/// `generateContent` over HTTPS.
pub struct GeminiClient {
    http: reqwest::Client,
    config: AnalysisConfig,
}

impl GeminiClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, ScanReportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ScanReportError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// `{endpoint}/v1beta/models/{model}:generateContent`. The key is sent as
    /// a header, so this URL is safe to log.
    pub fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint, self.config.model
        )
    }

    async fn call(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let url = self.url();
        let body = request.to_body(&self.config);
        debug!("POST {} ({} image bytes)", url, request.image().len());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let detail = format!("HTTP {}: {}", status.as_u16(), api_error_message(&text));
            warn!("Analysis request failed — {}", detail);
            return Err(AnalysisError::Network { detail });
        }

        extract_text(&text)
    }

    fn transport_error(&self, e: reqwest::Error) -> AnalysisError {
        if e.is_timeout() {
            AnalysisError::Timeout {
                secs: self.config.api_timeout_secs,
            }
        } else {
            AnalysisError::Network {
                detail: error_chain(&e),
            }
        }
    }
}

impl VisionClient for GeminiClient {
    fn generate<'a>(&'a self, request: &'a AnalysisRequest) -> BoxFuture<'a, Result<String, AnalysisError>> {
        Box::pin(self.call(request))
    }
}

// ── Response handling ───────────────────────────────────────────────────

/// Pull `candidates[0].content.parts[0].text` out of a response body.
pub fn extract_text(body: &str) -> Result<String, AnalysisError> {
    let value: Value = serde_json::from_str(body).map_err(|e| AnalysisError::ResponseShape {
        detail: format!("body is not JSON: {e}"),
    })?;

    if let Some(text) = value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
    {
        return Ok(text.to_string());
    }

    let detail = match value.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        Some(reason) => format!("prompt blocked ({reason})"),
        None if value.get("candidates").is_none() => "missing 'candidates'".to_string(),
        None => match value.pointer("/candidates/0/finishReason").and_then(Value::as_str) {
            Some(reason) => format!("no text in first candidate (finishReason {reason})"),
            None => "missing 'candidates[0].content.parts[0].text'".to_string(),
        },
    };
    Err(AnalysisError::ResponseShape { detail })
}

/// Best-effort message from an error body, truncated for display.
fn api_error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    if message.chars().count() > 200 {
        let cut: String = message.chars().take(200).collect();
        format!("{cut}…")
    } else {
        message
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        source = s.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::test_support::png;

    fn config() -> AnalysisConfig {
        AnalysisConfig::builder().api_key("k").build().unwrap()
    }

    fn request() -> AnalysisRequest {
        let image = ImageAsset::from_bytes(png(4, 4)).unwrap();
        AnalysisRequest::dated(image, &config(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    }

    #[test]
    fn body_has_single_user_turn_with_image_then_text() {
        let body = serde_json::to_value(request().to_body(&config())).unwrap();

        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert!(body["contents"][0]["parts"][1]["text"]
            .as_str()
            .unwrap()
            .contains("Date: 2024-01-02"));
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            DEFAULT_SYSTEM_INSTRUCTION
        );
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["topK"], 64);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["responseMimeType"], "text/plain");
    }

    #[test]
    fn custom_prompts_used() {
        let config = AnalysisConfig::builder()
            .api_key("k")
            .system_instruction("sys")
            .user_prompt("look at {date}")
            .build()
            .unwrap();
        let image = ImageAsset::from_bytes(png(2, 2)).unwrap();
        let req = AnalysisRequest::dated(image, &config, NaiveDate::from_ymd_opt(2025, 5, 6).unwrap());
        assert_eq!(req.system_instruction(), "sys");
        assert_eq!(req.user_prompt(), "look at 2025-05-06");
    }

    #[test]
    fn url_has_model_and_no_key() {
        let client = GeminiClient::new(&config()).unwrap();
        let url = client.url();
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
        assert!(!url.contains("key="));
    }

    #[test]
    fn extract_text_happy_path() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"**Findings**\n- ok"}],"role":"model"}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "**Findings**\n- ok");
    }

    #[test]
    fn extract_text_preserves_whitespace_verbatim() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"  a  \n\n"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "  a  \n\n");
    }

    #[test]
    fn extract_text_missing_candidates() {
        let err = extract_text(r#"{"foo":1}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseShape { .. }));
        assert!(err.to_string().contains("candidates"));
    }

    #[test]
    fn extract_text_empty_candidates() {
        let err = extract_text(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseShape { .. }));
    }

    #[test]
    fn extract_text_blocked_prompt() {
        let err = extract_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn extract_text_not_json() {
        let err = extract_text("<html>oops</html>").unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseShape { .. }));
    }

    #[test]
    fn extract_text_non_string_text() {
        let err = extract_text(r#"{"candidates":[{"content":{"parts":[{"text":42}]}}]}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseShape { .. }));
    }

    #[test]
    fn api_error_message_prefers_json_message() {
        let body = r#"{"error":{"code":403,"message":"API key not valid"}}"#;
        assert_eq!(api_error_message(body), "API key not valid");
        assert_eq!(api_error_message("plain failure"), "plain failure");
    }

    #[test]
    fn api_error_message_truncates() {
        let long = "x".repeat(500);
        let msg = api_error_message(&long);
        assert_eq!(msg.chars().count(), 201);
    }
}
