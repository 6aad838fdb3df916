//! One interactive session: the current image, the current result, and the
//! operations a front end triggers on them.
//!
//! The session is the only place "current" state lives. It upholds one
//! invariant: the result it holds always belongs to the image it holds. A new
//! upload (or [`Session::clear`]) drops the result and the orchestrator's memo
//! together, so a stale report can never be shown or exported next to a
//! different scan.

use crate::error::ScanReportError;
use crate::orchestrator::RequestOrchestrator;
use crate::output::{AnalysisResult, ExportedDocument, Report};
use crate::pipeline::docx::DocxRenderer;
use crate::pipeline::input::ImageAsset;
use crate::pipeline::render::{ReportRenderer, TextRenderer};
use std::sync::Arc;
use tracing::{debug, info};

pub struct Session {
    orchestrator: Arc<RequestOrchestrator>,
    image: Option<ImageAsset>,
    result: Option<AnalysisResult>,
}

impl Session {
    pub fn new(orchestrator: Arc<RequestOrchestrator>) -> Self {
        Self {
            orchestrator,
            image: None,
            result: None,
        }
    }

    /// Replace the current image. Invalidates the current result and cache.
    pub fn upload(&mut self, image: ImageAsset) {
        info!(
            "Uploaded {} ({}×{})",
            image.name().unwrap_or("image"),
            image.dimensions().0,
            image.dimensions().1
        );
        self.result = None;
        self.orchestrator.clear_cache();
        self.image = Some(image);
    }

    /// Validate and upload raw bytes. On error the session is left unchanged.
    pub fn upload_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> Result<(), ScanReportError> {
        let image = ImageAsset::from_bytes(bytes)?;
        self.upload(image);
        Ok(())
    }

    /// Run (or re-use) the analysis of the current image.
    ///
    /// # Errors
    /// [`ScanReportError::NoImage`] before any upload,
    /// [`ScanReportError::Busy`] if the shared orchestrator is occupied. In
    /// both cases the current result is left as it was.
    pub async fn analyze(&mut self) -> Result<&AnalysisResult, ScanReportError> {
        let image = self.image.as_ref().ok_or(ScanReportError::NoImage)?;
        let result = self.orchestrator.submit(image).await?;
        Ok(self.result.insert(result))
    }

    pub fn image(&self) -> Option<&ImageAsset> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// The structured report, present only after a successful analysis of
    /// the current image.
    pub fn report(&self) -> Option<Report> {
        match (&self.result, &self.image) {
            (Some(result), Some(image)) if self.orchestrator.config().sanitize_response => {
                Report::from_result_sanitized(result, image)
            }
            (Some(result), Some(image)) => Report::from_result(result, image),
            _ => None,
        }
    }

    /// Live text rendering of the current report.
    pub fn render_text(&self) -> Result<String, ScanReportError> {
        Ok(TextRenderer::default().render_string(&self.require_report()?))
    }

    /// Render the current report as a downloadable Word document.
    pub fn export_docx(&self) -> Result<ExportedDocument, ScanReportError> {
        let report = self.require_report()?;
        let renderer = DocxRenderer::from_config(self.orchestrator.config());
        let bytes = renderer.render(&report)?;
        debug!("Exported {} bytes", bytes.len());
        Ok(ExportedDocument::docx(bytes))
    }

    /// Forget the image, the result and the memoised response.
    pub fn clear(&mut self) {
        self.image = None;
        self.result = None;
        self.orchestrator.clear_cache();
        debug!("Session cleared");
    }

    fn require_report(&self) -> Result<Report, ScanReportError> {
        if let Some(report) = self.report() {
            return Ok(report);
        }
        let reason = match (&self.image, &self.result) {
            (None, _) => "no image uploaded".to_string(),
            (Some(_), None) => "image has not been analysed yet".to_string(),
            (Some(_), Some(r)) => r
                .error_message()
                .unwrap_or_else(|| "result does not match the current image".to_string()),
        };
        Err(ScanReportError::NoReport { reason })
    }
}
