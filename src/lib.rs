//! # scanreport
//!
//! Send a medical scan (ECG, X-ray, …) to a hosted vision model and turn the
//! answer into a structured report and a Word document.
//!
//! The model does all the reading. This crate handles everything around it:
//! validating the upload, making exactly one well-formed request, keeping at
//! most one request in flight, remembering the last answer, transcribing the
//! loosely formatted reply into typed blocks, and exporting those blocks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image bytes
//!  │
//!  ├─ 1. Input       PNG/JPEG sniff, dimensions, SHA-256 fingerprint
//!  ├─ 2. Orchestrate Busy guard, single-slot cache, timeout
//!  ├─ 3. Encode      bytes → base64 inline part
//!  ├─ 4. VLM         one generateContent call (system instruction + image + prompt)
//!  ├─ 5. Transcribe  text → Heading / BulletItem / Paragraph blocks
//!  └─ 6. Render      blocks + image → .docx bytes or terminal text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanreport::{analyze_file, write_document, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY; fails fast if it is missing.
//!     let config = AnalysisConfig::from_env()?;
//!     let outcome = analyze_file("ecg.png", &config).await?;
//!     match (&outcome.result.error, &outcome.document) {
//!         (None, Some(doc)) => write_document(&doc.filename, &doc.bytes)?,
//!         (Some(e), _) => eprintln!("analysis failed: {e}"),
//!         _ => {}
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive use
//!
//! Front ends hold a [`Session`]: `upload` an image, `analyze` it, then read
//! `report()` or `export_docx()`. A new upload invalidates the previous
//! result, so a report is never shown next to the wrong scan.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scanreport` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_file, analyze_file_sync, analyze_image, write_document, AnalysisOutcome};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, ErrorKind, ScanReportError};
pub use orchestrator::RequestOrchestrator;
pub use output::{AnalysisResult, ExportedDocument, Report};
pub use pipeline::docx::{DocxRenderer, DEFAULT_FILENAME, DOCX_MIME};
pub use pipeline::input::{ImageAsset, ImageKind};
pub use pipeline::llm::{AnalysisRequest, GeminiClient, VisionClient};
pub use pipeline::render::{ReportRenderer, TextRenderer};
pub use pipeline::transcribe::{parse, ReportBlock};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::Session;
