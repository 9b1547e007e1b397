//! `pathsense-perception` – Obstacle Perception Pipeline.
//!
//! Turns one raw camera frame into a short list of classified, located
//! obstacles for a mobility-assistance client.  The pipeline is isolated: it
//! never returns an error type or lets a panic escape, so navigation and
//! routing code sharing the process is unaffected by anything that happens
//! here.
//!
//! # Modules
//!
//! - [`image_check`] – [`validate_image`][image_check::validate_image]:
//!   full structural decode of the submitted frame.
//! - [`throttle`] – [`RequestThrottle`][throttle::RequestThrottle]: shared
//!   single-slot pacing that keeps outbound calls at least one interval
//!   apart across all concurrent invocations.
//! - [`vision_client`] – [`VisionClient`][vision_client::VisionClient]: the
//!   object-localisation and label-detection HTTP client, behind the
//!   [`DetectionBackend`][vision_client::DetectionBackend] trait.
//! - [`classifier`] – keyword taxonomy, bounding-polygon position and the
//!   label-derived wall obstacle.
//! - [`pipeline`] – [`ObstaclePipeline`][pipeline::ObstaclePipeline]: the
//!   only entry point, returning a
//!   [`DetectionResult`][pathsense_types::DetectionResult] for every frame.
//! - [`alert`] – [`AlertGate`][alert::AlertGate]: per-client announcement
//!   filter with cooldown.

pub mod alert;
pub mod classifier;
pub mod image_check;
pub mod pipeline;
pub mod throttle;
pub mod vision_client;

pub use alert::AlertGate;
pub use pipeline::{DEFAULT_MAX_RESULTS, ObstaclePipeline, PipelineConfig, PipelineHealth};
pub use throttle::RequestThrottle;
pub use vision_client::{DetectionBackend, RawAnnotations, RawDetection, VisionClient};
