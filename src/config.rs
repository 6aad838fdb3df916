//! Configuration types for scan analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. Prompt text and the model endpoint live here
//! rather than being baked into the request code, so one binary serves every
//! prompt/model variant.
//!
//! The API key is the only required setting. It is never hard-coded: it comes
//! from the caller, the `GEMINI_API_KEY` environment variable, or a secret
//! store the caller reads it from. `build()` fails with
//! [`ScanReportError::Configuration`] when it is missing.

use crate::error::ScanReportError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable overriding the model id.
pub const MODEL_ENV: &str = "SCANREPORT_MODEL";

/// Environment variable overriding the API base URL.
pub const ENDPOINT_ENV: &str = "SCANREPORT_ENDPOINT";

/// Default API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default multimodal model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Configuration for one analysis session.
///
/// Built via [`AnalysisConfig::builder()`] or [`AnalysisConfig::from_env()`].
///
/// # Example
/// ```rust
/// use scanreport::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .api_key("test-key")
///     .model("gemini-1.5-flash")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-1.5-flash");
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Credential for the generative API. Redacted from `Debug` output.
    pub api_key: String,

    /// API base URL, without a trailing slash. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model id used in the `models/{model}:generateContent` path.
    pub model: String,

    /// Custom system instruction. If None, uses
    /// [`crate::prompts::DEFAULT_SYSTEM_INSTRUCTION`].
    pub system_instruction: Option<String>,

    /// Custom user prompt. If None, uses
    /// [`crate::prompts::DEFAULT_USER_PROMPT`] stamped with today's date.
    pub user_prompt: Option<String>,

    /// Sampling temperature. Default: 1.0.
    pub temperature: f32,

    /// Nucleus sampling mass. Default: 0.95.
    pub top_p: f32,

    /// Top-k sampling cutoff. Default: 64.
    pub top_k: u32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// Reports with long recommendation sections run past 2 000 tokens;
    /// a low cap truncates mid-sentence without any error.
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Width of the embedded image in the exported document, in inches.
    /// Default: 6.0 (the printable width of a Letter page with 1" margins).
    pub image_width_inches: f32,

    /// Strip an outer code fence and invisible characters from the reply
    /// before transcribing it. Default: false, so the report is exactly
    /// `parse(result.text)`.
    pub sanitize_response: bool,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_instruction: None,
            user_prompt: None,
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            api_timeout_secs: 60,
            image_width_inches: 6.0,
            sanitize_response: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("system_instruction", &self.system_instruction.as_ref().map(|_| "<custom>"))
            .field("user_prompt", &self.user_prompt.as_ref().map(|_| "<custom>"))
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("image_width_inches", &self.image_width_inches)
            .field("sanitize_response", &self.sanitize_response)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a configuration from the process environment.
    ///
    /// Reads [`API_KEY_ENV`] (required), plus [`MODEL_ENV`] and
    /// [`ENDPOINT_ENV`] when set.
    pub fn from_env() -> Result<Self, ScanReportError> {
        Self::builder_from_env()?.build()
    }

    /// Like [`from_env`](Self::from_env) but returns the builder so callers
    /// can layer further overrides on top.
    pub fn builder_from_env() -> Result<AnalysisConfigBuilder, ScanReportError> {
        Self::builder_from_lookup(|name| std::env::var(name).ok())
    }

    /// Environment layering over an arbitrary variable source.
    pub(crate) fn builder_from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<AnalysisConfigBuilder, ScanReportError> {
        let key = lookup(API_KEY_ENV).ok_or_else(|| {
            ScanReportError::Configuration(format!(
                "{API_KEY_ENV} is not set.\nExport it in your shell or load it from your secret store."
            ))
        })?;

        let mut builder = Self::builder().api_key(key);
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            builder = builder.model(model);
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.trim().is_empty()) {
            builder = builder.endpoint(endpoint);
        }
        Ok(builder)
    }

    /// Image width converted to English Metric Units (914 400 per inch).
    pub fn image_width_emu(&self) -> u64 {
        (f64::from(self.image_width_inches) * 914_400.0).round() as u64
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.endpoint = url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn system_instruction(mut self, text: impl Into<String>) -> Self {
        self.config.system_instruction = Some(text.into());
        self
    }

    pub fn user_prompt(mut self, text: impl Into<String>) -> Self {
        self.config.user_prompt = Some(text.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.config.top_k = k.max(1);
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn image_width_inches(mut self, inches: f32) -> Self {
        self.config.image_width_inches = inches.clamp(1.0, 8.0);
        self
    }

    pub fn sanitize_response(mut self, on: bool) -> Self {
        self.config.sanitize_response = on;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, ScanReportError> {
        let c = &self.config;
        if c.api_key.trim().is_empty() {
            return Err(ScanReportError::Configuration(format!(
                "API key is empty. Set {API_KEY_ENV} or pass one explicitly."
            )));
        }
        if c.model.trim().is_empty() {
            return Err(ScanReportError::Configuration("Model id must not be empty".into()));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(ScanReportError::Configuration(format!(
                "Endpoint must be an HTTP(S) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(ScanReportError::Configuration(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(ScanReportError::Configuration(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
