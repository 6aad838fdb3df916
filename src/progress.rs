//! Progress-callback trait for analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to hear about
//! each submission as the orchestrator handles it. The CLI uses this to drive
//! its spinner; a UI could forward the events to a status bar instead.
//!
//! # Example
//!
//! ```rust
//! use scanreport::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::Arc;
//!
//! struct LogCallback;
//!
//! impl AnalysisProgressCallback for LogCallback {
//!     fn on_complete(&self, text_len: usize, duration_ms: u64) {
//!         eprintln!("report ready: {text_len} chars in {duration_ms}ms");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .api_key("test-key")
//!     .progress_callback(Arc::new(LogCallback))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator while it handles a submission.
///
/// All methods default to no-ops so implementors override only what they
/// need. Implementations must be `Send + Sync`; the orchestrator may be
/// shared across tasks.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called just before the request is sent.
    ///
    /// # Arguments
    /// * `fingerprint` — image fingerprint
    /// * `image_bytes` — size of the upload in bytes
    fn on_submit(&self, fingerprint: &str, image_bytes: usize) {
        let _ = (fingerprint, image_bytes);
    }

    /// Called when a memoised result is returned without a network call.
    fn on_cache_hit(&self, fingerprint: &str) {
        let _ = fingerprint;
    }

    /// Called when the model returned text.
    ///
    /// # Arguments
    /// * `text_len`    — byte length of the response text
    /// * `duration_ms` — time spent waiting for the service
    fn on_complete(&self, text_len: usize, duration_ms: u64) {
        let _ = (text_len, duration_ms);
    }

    /// Called when the remote call failed.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
