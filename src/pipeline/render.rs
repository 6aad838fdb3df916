//! Report rendering: [`Report`] → bytes for a concrete output.
//!
//! Two renderers share the [`ReportRenderer`] seam:
//!
//! - [`crate::pipeline::docx::DocxRenderer`] — the downloadable Word document
//! - [`TextRenderer`] — the live terminal display
//!
//! Both emit a fixed title, then exactly one output element per block in
//! order, then the image section, so a report renders to the same number of
//! elements no matter which renderer or how many times.

use crate::error::ScanReportError;
use crate::output::Report;
use crate::pipeline::transcribe::ReportBlock;

/// Title emitted at the top of every rendered report.
pub const REPORT_TITLE: &str = "Medical Scan Analysis Report";

/// Heading of the section holding the uploaded image.
pub const IMAGE_SECTION_HEADING: &str = "Uploaded Image:";

/// Turns a report into an output artefact.
pub trait ReportRenderer {
    /// Render the whole report. Must succeed for a report with no blocks.
    fn render(&self, report: &Report) -> Result<Vec<u8>, ScanReportError>;
}

/// Plain-text rendering for terminals and logs.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    title: String,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
        }
    }
}

impl TextRenderer {
    /// Render to a `String`; [`ReportRenderer::render`] returns its UTF-8 bytes.
    pub fn render_string(&self, report: &Report) -> String {
        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        out.push_str(&"=".repeat(self.title.chars().count()));
        out.push('\n');

        for block in report.blocks() {
            match block {
                ReportBlock::Heading { level, text } => {
                    out.push('\n');
                    out.push_str(&"#".repeat(usize::from((*level).max(1))));
                    out.push(' ');
                    out.push_str(text);
                    out.push('\n');
                }
                ReportBlock::BulletItem { text } => {
                    out.push_str("  • ");
                    out.push_str(text);
                    out.push('\n');
                }
                ReportBlock::Paragraph { text } => {
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }

        let image = report.image();
        let (w, h) = image.dimensions();
        out.push('\n');
        out.push_str(IMAGE_SECTION_HEADING);
        out.push_str(&format!(
            " {} ({}, {}×{})\n",
            image.name().unwrap_or("scan"),
            image.mime_type(),
            w,
            h
        ));
        out
    }
}

impl ReportRenderer for TextRenderer {
    fn render(&self, report: &Report) -> Result<Vec<u8>, ScanReportError> {
        Ok(self.render_string(report).into_bytes())
    }
}
