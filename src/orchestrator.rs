//! Request orchestration: validate → guard → cache → call → result.
//!
//! [`RequestOrchestrator::submit`] is the only way a request reaches the
//! remote service. It enforces three things:
//!
//! 1. **Validation first.** Bad input fails with
//!    [`ScanReportError::InvalidInput`] before any network activity.
//! 2. **One request in flight.** A second submission while one is pending is
//!    rejected with [`ScanReportError::Busy`] rather than queued, so two
//!    writers can never race for the single cache slot.
//! 3. **Single-slot memo.** The last successful result is remembered by image
//!    fingerprint; asking again for the same image returns it without a call.
//!    A failed call or [`RequestOrchestrator::clear_cache`] empties the slot.
//!
//! Remote failures (transport, timeout, payload shape) come back as a failed
//! [`AnalysisResult`], never as `Err`.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ScanReportError};
use crate::output::AnalysisResult;
use crate::pipeline::input::ImageAsset;
use crate::pipeline::llm::{AnalysisRequest, GeminiClient, VisionClient};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct RequestOrchestrator {
    client: Arc<dyn VisionClient>,
    config: AnalysisConfig,
    in_flight: tokio::sync::Mutex<()>,
    cache: Mutex<Option<AnalysisResult>>,
}

impl RequestOrchestrator {
    /// Orchestrator backed by the HTTPS [`GeminiClient`].
    pub fn new(config: AnalysisConfig) -> Result<Self, ScanReportError> {
        let client = GeminiClient::new(&config)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Orchestrator backed by any [`VisionClient`].
    pub fn with_client(config: AnalysisConfig, client: Arc<dyn VisionClient>) -> Self {
        Self {
            client,
            config,
            in_flight: tokio::sync::Mutex::new(()),
            cache: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Is a submission currently waiting on the remote service?
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Validate raw bytes, then [`submit`](Self::submit) them.
    pub async fn submit_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<AnalysisResult, ScanReportError> {
        let image = ImageAsset::from_bytes(bytes)?;
        self.submit(&image).await
    }

    /// Analyse `image`, or return the memoised result for it.
    ///
    /// # Errors
    /// Only [`ScanReportError::Busy`]. Every remote outcome is an
    /// `Ok(AnalysisResult)`.
    pub async fn submit(&self, image: &ImageAsset) -> Result<AnalysisResult, ScanReportError> {
        let _guard = self.in_flight.try_lock().map_err(|_| {
            warn!("Rejected submission: another request is in flight");
            ScanReportError::Busy
        })?;

        if let Some(hit) = self.cached(image.fingerprint()) {
            debug!("Cache hit for {}", short(image.fingerprint()));
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_cache_hit(image.fingerprint());
            }
            return Ok(hit);
        }

        let request = AnalysisRequest::new(image.clone(), &self.config);
        info!(
            "Submitting {} image ({} bytes) to {}",
            image.mime_type(),
            image.len(),
            self.config.model
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_submit(image.fingerprint(), image.len());
        }

        let start = Instant::now();
        let timeout = Duration::from_secs(self.config.api_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.client.generate(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AnalysisError::Timeout {
                secs: self.config.api_timeout_secs,
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(text) => {
                info!("Analysis complete: {} chars in {}ms", text.len(), duration_ms);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_complete(text.len(), duration_ms);
                }
                AnalysisResult::succeeded(text, image.fingerprint(), duration_ms)
            }
            Err(e) => {
                warn!("Analysis failed after {}ms — {}", duration_ms, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_error(&e.to_string());
                }
                AnalysisResult::failed(e, image.fingerprint(), duration_ms)
            }
        };

        *self.slot() = result.is_success().then(|| result.clone());
        Ok(result)
    }

    /// The memoised result for `fingerprint`, marked as a cache hit.
    pub fn cached(&self, fingerprint: &str) -> Option<AnalysisResult> {
        self.slot()
            .as_ref()
            .filter(|r| r.fingerprint == fingerprint)
            .map(|r| AnalysisResult {
                from_cache: true,
                duration_ms: 0,
                ..r.clone()
            })
    }

    /// Forget the memoised result.
    pub fn clear_cache(&self) {
        if self.slot().take().is_some() {
            debug!("Result cache cleared");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<AnalysisResult>> {
        // The slot holds plain data; a panic elsewhere cannot leave it torn.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::input::test_support::png;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted client that counts calls.
    struct FakeClient {
        calls: AtomicUsize,
        reply: Result<String, AnalysisError>,
        delay: Duration,
    }

    impl FakeClient {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
            })
        }

        fn err(e: AnalysisError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Err(e),
                delay: Duration::ZERO,
            })
        }

        fn slow(text: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Ok(text.to_string()),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl VisionClient for FakeClient {
        fn generate<'a>(&'a self, _request: &'a AnalysisRequest) -> BoxFuture<'a, Result<String, AnalysisError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.reply.clone()
            })
        }
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig::builder().api_key("k").build().unwrap()
    }

    fn image(w: u32) -> ImageAsset {
        ImageAsset::from_bytes(png(w, 3)).unwrap()
    }

    #[tokio::test]
    async fn success_returns_text_verbatim() {
        let client = FakeClient::ok("  **Findings**\n- x\n");
        let orch = RequestOrchestrator::with_client(config(), client.clone());
        let result = orch.submit(&image(3)).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.text, "  **Findings**\n- x\n");
        assert!(!result.from_cache);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn second_submit_of_same_image_is_cached() {
        let client = FakeClient::ok("report");
        let orch = RequestOrchestrator::with_client(config(), client.clone());
        let img = image(3);
        orch.submit(&img).await.unwrap();
        let again = orch.submit(&img).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(again.text, "report");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn different_image_misses_cache() {
        let client = FakeClient::ok("report");
        let orch = RequestOrchestrator::with_client(config(), client.clone());
        orch.submit(&image(3)).await.unwrap();
        orch.submit(&image(4)).await.unwrap();
        assert_eq!(client.calls(), 2);
        // Slot holds only the latest image.
        assert!(orch.cached(image(3).fingerprint()).is_none());
        assert!(orch.cached(image(4).fingerprint()).is_some());
    }

    #[tokio::test]
    async fn clear_cache_forces_new_call() {
        let client = FakeClient::ok("report");
        let orch = RequestOrchestrator::with_client(config(), client.clone());
        let img = image(3);
        orch.submit(&img).await.unwrap();
        orch.clear_cache();
        let again = orch.submit(&img).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_results_and_not_cached() {
        let client = FakeClient::err(AnalysisError::Network {
            detail: "connection reset".into(),
        });
        let orch = RequestOrchestrator::with_client(config(), client.clone());
        let img = image(3);
        let result = orch.submit(&img).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.kind(), Some(ErrorKind::Network));
        assert!(result.error_message().unwrap().contains("connection reset"));
        assert!(orch.cached(img.fingerprint()).is_none());

        orch.submit(&img).await.unwrap();
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn invalid_bytes_never_reach_client() {
        let client = FakeClient::ok("unused");
        let orch = RequestOrchestrator::with_client(config(), client.clone());
        let err = orch.submit_bytes(Vec::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = orch.submit_bytes(b"%PDF-1.7".to_vec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_submission_is_busy() {
        let client = FakeClient::slow("late", Duration::from_millis(300));
        let orch = Arc::new(RequestOrchestrator::with_client(config(), client.clone()));

        let first = {
            let orch = Arc::clone(&orch);
            let img = image(3);
            tokio::spawn(async move { orch.submit(&img).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orch.is_busy());

        let err = orch.submit(&image(4)).await.unwrap_err();
        assert!(matches!(err, ScanReportError::Busy));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.text, "late");
        assert!(!orch.is_busy());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn slow_client_times_out() {
        let client = FakeClient::slow("never", Duration::from_secs(5));
        let config = AnalysisConfig::builder()
            .api_key("k")
            .api_timeout_secs(1)
            .build()
            .unwrap();
        let orch = RequestOrchestrator::with_client(config, client);
        let result = orch.submit(&image(3)).await.unwrap();
        assert_eq!(result.kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn progress_callback_sees_submit_and_hit() {
        use crate::progress::AnalysisProgressCallback;

        #[derive(Default)]
        struct Counter {
            submits: AtomicUsize,
            hits: AtomicUsize,
        }
        impl AnalysisProgressCallback for Counter {
            fn on_submit(&self, _: &str, _: usize) {
                self.submits.fetch_add(1, Ordering::SeqCst);
            }
            fn on_cache_hit(&self, _: &str) {
                self.hits.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter::default());
        let config = AnalysisConfig::builder()
            .api_key("k")
            .progress_callback(counter.clone())
            .build()
            .unwrap();
        let orch = RequestOrchestrator::with_client(config, FakeClient::ok("r"));
        let img = image(3);
        orch.submit(&img).await.unwrap();
        orch.submit(&img).await.unwrap();
        assert_eq!(counter.submits.load(Ordering::SeqCst), 1);
        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
    }
}
