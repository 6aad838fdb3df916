//! One-shot entry points: analyse a file, write the document.
//!
//! These wrap a [`Session`] for callers that just want "image in, report
//! out" without managing session state themselves, such as the CLI and batch
//! scripts.

use crate::config::AnalysisConfig;
use crate::error::ScanReportError;
use crate::orchestrator::RequestOrchestrator;
use crate::output::{AnalysisResult, ExportedDocument, Report};
use crate::pipeline::input::ImageAsset;
use crate::session::Session;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything one analysis produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// Present iff `result` succeeded.
    pub report: Option<Report>,
    /// Present iff `result` succeeded.
    pub document: Option<ExportedDocument>,
}

/// Analyse an image file and render its report.
///
/// # Returns
/// `Ok(AnalysisOutcome)` whenever the request could be made, including when
/// the remote call failed (check `outcome.result.error`).
///
/// # Errors
/// Returns `Err(ScanReportError)` only when the request could not be made:
/// unreadable or unsupported image, HTTP client construction failure.
pub async fn analyze_file(
    image_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, ScanReportError> {
    let image = ImageAsset::from_path(image_path.as_ref())?;
    analyze_image(image, config).await
}

/// Analyse an already captured image and render its report.
pub async fn analyze_image(
    image: ImageAsset,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, ScanReportError> {
    let orchestrator = Arc::new(RequestOrchestrator::new(config.clone())?);
    let mut session = Session::new(orchestrator);
    session.upload(image);

    let result = session.analyze().await?.clone();
    let (report, document) = if result.is_success() {
        (session.report(), Some(session.export_docx()?))
    } else {
        (None, None)
    };

    Ok(AnalysisOutcome {
        result,
        report,
        document,
    })
}

/// Synchronous wrapper around [`analyze_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_file_sync(
    image_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, ScanReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScanReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_file(image_path, config))
}

/// Write document bytes to `path`.
///
/// Uses an atomic write (temp file in the same directory, then rename) so a
/// crash never leaves a half-written `.docx` behind.
pub fn write_document(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), ScanReportError> {
    let path = path.as_ref();
    let write_err = |source: std::io::Error| ScanReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
