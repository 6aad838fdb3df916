//! Error types for the scanreport library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScanReportError`] — **Fatal** for the operation that raised it: the
//!   request cannot even be attempted (bad image, missing API key, another
//!   submission already in flight). Returned as `Err(ScanReportError)`.
//!
//! * [`AnalysisError`] — **Recovered**: the request went out but the remote
//!   side failed (transport error, timeout, unexpected payload). Stored inside
//!   [`crate::output::AnalysisResult`] so the session keeps running and the
//!   caller can show the message inline.
//!
//! [`ErrorKind`] flattens both into one small taxonomy for callers that only
//! want to branch on the category.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// The category of a failure, independent of which error type carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing, empty, or unsupported image.
    InvalidInput,
    /// Transport failure or non-success HTTP status.
    Network,
    /// The API answered but the payload did not have the expected shape.
    ResponseShape,
    /// The remote call did not finish within the configured timeout.
    Timeout,
    /// Missing or invalid configuration (e.g. no API key). Fatal at startup.
    Configuration,
    /// A submission was already in flight.
    Busy,
    /// Anything else (I/O while exporting, internal errors).
    Other,
}

/// All fatal errors returned by the scanreport library.
///
/// Remote failures use [`AnalysisError`] and are stored in
/// [`crate::output::AnalysisResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ScanReportError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A required setting is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The image bytes are empty or not a supported encoding.
    #[error("Invalid image: {reason}\nSupported formats: PNG, JPEG.")]
    InvalidInput { reason: String },

    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Session errors ────────────────────────────────────────────────────
    /// Another submission is still waiting for the remote service.
    #[error("An analysis request is already in progress; wait for it to finish")]
    Busy,

    /// `analyze` was called before any image was uploaded.
    #[error("No image uploaded")]
    NoImage,

    /// Export was requested but the session holds no successful report.
    #[error("No report available: {reason}")]
    NoReport { reason: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The document package could not be assembled.
    #[error("Failed to build document: {0}")]
    ExportFailed(String),

    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanReportError {
    /// The taxonomy category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanReportError::Configuration(_) => ErrorKind::Configuration,
            ScanReportError::InvalidInput { .. }
            | ScanReportError::FileNotFound { .. }
            | ScanReportError::PermissionDenied { .. }
            | ScanReportError::NoImage => ErrorKind::InvalidInput,
            ScanReportError::Busy => ErrorKind::Busy,
            ScanReportError::NoReport { .. }
            | ScanReportError::ExportFailed(_)
            | ScanReportError::OutputWriteFailed { .. }
            | ScanReportError::Internal(_) => ErrorKind::Other,
        }
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        ScanReportError::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// A recovered error from the remote call.
///
/// Stored in [`crate::output::AnalysisResult`] when a submission fails; the
/// session carries on and the user may re-trigger the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AnalysisError {
    /// The request never produced a usable HTTP response, or the status was
    /// not a success.
    #[error("Network error: {detail}")]
    Network { detail: String },

    /// The response body was not JSON or lacked
    /// `candidates[0].content.parts[0].text`.
    #[error("Unexpected response from the analysis service: {detail}")]
    ResponseShape { detail: String },

    /// The remote call exceeded the configured timeout.
    #[error("Analysis timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl AnalysisError {
    /// The taxonomy category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Network { .. } => ErrorKind::Network,
            AnalysisError::ResponseShape { .. } => ErrorKind::ResponseShape,
            AnalysisError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_display() {
        let e = ScanReportError::invalid_input("image is empty");
        let msg = e.to_string();
        assert!(msg.contains("image is empty"), "got: {msg}");
        assert!(msg.contains("PNG, JPEG"));
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn busy_kind() {
        assert_eq!(ScanReportError::Busy.kind(), ErrorKind::Busy);
    }

    #[test]
    fn configuration_kind() {
        let e = ScanReportError::Configuration("GEMINI_API_KEY is not set".into());
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn network_display_includes_cause() {
        let e = AnalysisError::Network {
            detail: "connection refused".into(),
        };
        assert!(e.to_string().contains("connection refused"));
        assert_eq!(e.kind(), ErrorKind::Network);
    }

    #[test]
    fn timeout_display() {
        let e = AnalysisError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
        assert_eq!(e.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn response_shape_kind() {
        let e = AnalysisError::ResponseShape {
            detail: "missing candidates".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ResponseShape);
    }
}
