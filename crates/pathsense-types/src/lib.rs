use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Message attached to every successful [`DetectionResult`].
pub const ANALYSIS_COMPLETE: &str = "Analysis complete";

/// Semantic category of a detected obstacle.
///
/// The set is closed: new categories are introduced by adding a taxonomy
/// entry in `pathsense-perception`, never by free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleType {
    Human,
    Vehicle,
    StaticObstacle,
    /// Synthesised from scene labels ("wall", "corridor", "hallway").
    Wall,
    Unknown,
}

impl ObstacleType {
    /// Wire name, e.g. `"static_obstacle"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ObstacleType::Human => "human",
            ObstacleType::Vehicle => "vehicle",
            ObstacleType::StaticObstacle => "static_obstacle",
            ObstacleType::Wall => "wall",
            ObstacleType::Unknown => "unknown",
        }
    }

    /// Spoken form: underscores become spaces and each word is title-cased.
    pub fn title(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for ObstacleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an obstacle sits in the camera frame, from the wearer's viewpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Left,
    Right,
    Front,
    Unknown,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Left => "LEFT",
            Position::Right => "RIGHT",
            Position::Front => "FRONT",
            Position::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified, spatially-located obstacle.
///
/// The description is always derived from the type and position, so the
/// fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Obstacle {
    object_type: ObstacleType,
    confidence: f64,
    position: Position,
    description: String,
}

impl Obstacle {
    pub fn new(object_type: ObstacleType, confidence: f64, position: Position) -> Self {
        let description = format!(
            "{} detected {}",
            object_type.title(),
            position.as_str().to_lowercase()
        );
        Self {
            object_type,
            confidence,
            position,
            description,
        }
    }

    pub fn object_type(&self) -> ObstacleType {
        self.object_type
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Terminal value of one perception invocation.
///
/// Callers only ever see one of these two outcomes. `Degraded` means "no
/// obstacles available for this frame" and must never be treated as fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    /// Obstacles in output order: synthetic wall entry first, then per-object
    /// detections in the order the remote service reported them.
    Success(Vec<Obstacle>),
    /// Human-readable diagnostic naming the failure kind.
    Degraded(String),
}

impl DetectionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DetectionResult::Success(_))
    }

    /// Obstacles of a successful result; empty when degraded.
    pub fn obstacles(&self) -> &[Obstacle] {
        match self {
            DetectionResult::Success(obstacles) => obstacles,
            DetectionResult::Degraded(_) => &[],
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DetectionResult::Success(_) => ANALYSIS_COMPLETE,
            DetectionResult::Degraded(message) => message,
        }
    }
}

impl From<Result<Vec<Obstacle>, PerceptionError>> for DetectionResult {
    fn from(result: Result<Vec<Obstacle>, PerceptionError>) -> Self {
        match result {
            Ok(obstacles) => DetectionResult::Success(obstacles),
            Err(e) => DetectionResult::Degraded(e.to_string()),
        }
    }
}

/// Serialized as the client-facing envelope
/// `{"success": bool, "obstacles": [...], "message": "..."}`.
impl Serialize for DetectionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DetectionResult", 3)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("obstacles", self.obstacles())?;
        state.serialize_field("message", self.message())?;
        state.end()
    }
}

/// Every way a perception invocation can fail.
///
/// None of these reach callers directly: the pipeline boundary converts each
/// into [`DetectionResult::Degraded`] using the `Display` text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PerceptionError {
    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("Invalid detection request: {0}")]
    InvalidRequest(String),

    #[error("Vision API request timed out")]
    Timeout,

    #[error("Vision API request failed: {0}")]
    TransportFailure(String),

    #[error("Unexpected Vision API response format: {0}")]
    MalformedResponse(String),

    #[error("Unexpected error: {0}")]
    Unclassified(String),
}

impl PerceptionError {
    /// Stable tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PerceptionError::InvalidImage(_) => "invalid_image",
            PerceptionError::InvalidRequest(_) => "invalid_request",
            PerceptionError::Timeout => "timeout",
            PerceptionError::TransportFailure(_) => "transport_failure",
            PerceptionError::MalformedResponse(_) => "malformed_response",
            PerceptionError::Unclassified(_) => "unclassified",
        }
    }
}
