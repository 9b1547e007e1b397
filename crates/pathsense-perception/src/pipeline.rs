//! [`ObstaclePipeline`] – the isolation boundary around frame analysis.
//!
//! Each call to [`ObstaclePipeline::detect`] runs, in order:
//!
//! 1. **Validate** – full decode of the frame ([`validate_image`]).
//! 2. **Throttle** – wait for the shared [`RequestThrottle`] slot.
//! 3. **Detect** – one outbound call through the [`DetectionBackend`].
//! 4. **Classify** – map raw detections onto obstacles ([`classify`]).
//!
//! Any failure along the way, including a panic inside the backend, is
//! turned into [`DetectionResult::Degraded`].  Callers never see an error
//! type or an unwinding panic, so a broken camera feed or an unreachable
//! detection service cannot take down anything else in the process.
//!
//! # Example
//!
//! ```rust,no_run
//! use pathsense_perception::pipeline::{ObstaclePipeline, PipelineConfig, DEFAULT_MAX_RESULTS};
//!
//! # async fn run(frame: Vec<u8>) {
//! let pipeline = ObstaclePipeline::from_config(&PipelineConfig {
//!     api_key: "my-api-key".into(),
//!     ..PipelineConfig::default()
//! });
//! let result = pipeline.detect(&frame, DEFAULT_MAX_RESULTS).await;
//! println!("{}", result.message());
//! # }
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use pathsense_types::{DetectionResult, Obstacle, PerceptionError};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::classifier::classify;
use crate::image_check::validate_image;
use crate::throttle::{MIN_REQUEST_INTERVAL, RequestThrottle};
use crate::vision_client::{
    DEFAULT_VISION_ENDPOINT, DetectionBackend, REQUEST_TIMEOUT, VisionClient,
};

/// Objects and labels requested per frame when the caller has no preference.
pub const DEFAULT_MAX_RESULTS: u32 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for a production pipeline backed by [`VisionClient`].
#[derive(Clone)]
pub struct PipelineConfig {
    /// Full URL of the annotate endpoint.
    pub vision_endpoint: String,
    /// Opaque credential appended as the `key` query parameter.
    pub api_key: String,
    /// Hard limit on one outbound call.
    pub request_timeout: Duration,
    /// Minimum spacing between outbound calls.
    pub min_request_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            api_key: String::new(),
            request_timeout: REQUEST_TIMEOUT,
            min_request_interval: MIN_REQUEST_INTERVAL,
        }
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("vision_endpoint", &self.vision_endpoint)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("request_timeout", &self.request_timeout)
            .field("min_request_interval", &self.min_request_interval)
            .finish()
    }
}

/// Result of [`ObstaclePipeline::health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineHealth {
    pub status: &'static str,
    pub api_key_configured: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// ObstaclePipeline
// ─────────────────────────────────────────────────────────────────────────────

/// The sole public entry point for frame analysis.
///
/// Cheap to share behind an [`Arc`]; every concurrent invocation paces its
/// outbound call through the same [`RequestThrottle`].
pub struct ObstaclePipeline<B = VisionClient> {
    backend: B,
    throttle: Arc<RequestThrottle>,
}

impl ObstaclePipeline<VisionClient> {
    /// Build a pipeline with its own throttle from `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let backend = VisionClient::new(&config.vision_endpoint, &config.api_key)
            .with_timeout(config.request_timeout);
        let throttle = Arc::new(RequestThrottle::new(config.min_request_interval));
        Self::new(backend, throttle)
    }
}

impl<B: DetectionBackend> ObstaclePipeline<B> {
    /// Wrap `backend`, pacing its calls through `throttle`.
    ///
    /// Pass the same throttle to every pipeline that talks to the same
    /// service quota.
    pub fn new(backend: B, throttle: Arc<RequestThrottle>) -> Self {
        Self { backend, throttle }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Analyse one frame.
    ///
    /// `max_results` caps both object and label results and must be at
    /// least 1.  Always returns; failures come back as
    /// [`DetectionResult::Degraded`] with a message naming the failure kind.
    #[instrument(
        name = "detect",
        skip(self, image),
        fields(frame_id = %Uuid::new_v4(), bytes = image.len())
    )]
    pub async fn detect(&self, image: &[u8], max_results: u32) -> DetectionResult {
        let outcome = AssertUnwindSafe(self.analyse(image, max_results))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PerceptionError::Unclassified(panic_message(&*panic))));

        match &outcome {
            Ok(obstacles) => info!(obstacles = obstacles.len(), "frame analysed"),
            Err(e) => warn!(error.kind = e.kind(), error = %e, "frame analysis degraded"),
        }
        DetectionResult::from(outcome)
    }

    /// Report whether the pipeline is usable without touching the network.
    pub fn health(&self) -> PipelineHealth {
        PipelineHealth {
            status: "healthy",
            api_key_configured: self.backend.is_configured(),
        }
    }

    async fn analyse(
        &self,
        image: &[u8],
        max_results: u32,
    ) -> Result<Vec<Obstacle>, PerceptionError> {
        if max_results == 0 {
            return Err(PerceptionError::InvalidRequest(
                "max_results must be at least 1".into(),
            ));
        }

        validate_image(image)?;
        self.throttle.acquire().await;

        let raw = self.backend.annotate(image, max_results).await?;
        debug!(
            objects = raw.objects.len(),
            labels = raw.labels.len(),
            "raw detections received"
        );
        Ok(classify(&raw))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "detection backend panicked".to_string()
    }
}
