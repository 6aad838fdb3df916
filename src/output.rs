//! Values produced by an analysis: the raw result, the derived report, and
//! the exported document.

use crate::error::{AnalysisError, ErrorKind};
use crate::pipeline::docx::{DOCX_MIME, DEFAULT_FILENAME};
use crate::pipeline::input::ImageAsset;
use crate::pipeline::postprocess::sanitize;
use crate::pipeline::transcribe::{parse, ReportBlock};
use serde::{Deserialize, Serialize};

/// Outcome of one submission.
///
/// Always well-formed: a failed call still yields an `AnalysisResult`, with
/// `text` empty and `error` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Response text exactly as the model returned it.
    pub text: String,

    /// Set when the remote call failed.
    pub error: Option<AnalysisError>,

    /// Fingerprint of the image this result belongs to.
    pub fingerprint: String,

    /// True when served from the orchestrator's memo without a network call.
    pub from_cache: bool,

    /// Wall-clock time spent on the remote call (0 for cache hits).
    pub duration_ms: u64,
}

impl AnalysisResult {
    pub fn succeeded(text: String, fingerprint: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            text,
            error: None,
            fingerprint: fingerprint.into(),
            from_cache: false,
            duration_ms,
        }
    }

    pub fn failed(error: AnalysisError, fingerprint: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            text: String::new(),
            error: Some(error),
            fingerprint: fingerprint.into(),
            from_cache: false,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Error category, `None` on success.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(AnalysisError::kind)
    }

    /// Human-readable error message, `None` on success.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Does this result belong to `image`?
    pub fn is_for(&self, image: &ImageAsset) -> bool {
        self.fingerprint == image.fingerprint()
    }
}

/// Structured report: ordered blocks plus the image they describe.
///
/// Derived from an [`AnalysisResult`] and its [`ImageAsset`]; never stored on
/// its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    blocks: Vec<ReportBlock>,
    image: ImageAsset,
}

impl Report {
    pub fn new(blocks: Vec<ReportBlock>, image: ImageAsset) -> Self {
        Self { blocks, image }
    }

    /// Transcribe model text as-is.
    pub fn from_text(text: &str, image: ImageAsset) -> Self {
        Self::new(parse(text), image)
    }

    /// The report for `result`, if it succeeded and was produced for `image`.
    pub fn from_result(result: &AnalysisResult, image: &ImageAsset) -> Option<Self> {
        (result.is_success() && result.is_for(image))
            .then(|| Self::from_text(&result.text, image.clone()))
    }

    /// Like [`from_result`](Self::from_result), with the reply passed through
    /// [`sanitize`] first.
    pub fn from_result_sanitized(result: &AnalysisResult, image: &ImageAsset) -> Option<Self> {
        (result.is_success() && result.is_for(image))
            .then(|| Self::from_text(&sanitize(&result.text), image.clone()))
    }

    pub fn blocks(&self) -> &[ReportBlock] {
        &self.blocks
    }

    pub fn image(&self) -> &ImageAsset {
        &self.image
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// A rendered document ready for download.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
}

impl ExportedDocument {
    /// Wrap DOCX bytes with the fixed filename and MIME type.
    pub fn docx(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: DEFAULT_FILENAME.to_string(),
            mime_type: DOCX_MIME,
        }
    }
}
