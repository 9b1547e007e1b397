//! [`AlertGate`] – decides what, if anything, to announce for a frame.
//!
//! Only confident obstacles straight ahead are worth interrupting the wearer
//! for.  The gate joins their descriptions into one sentence and suppresses
//! the same sentence if it was already spoken within the cooldown window, so
//! a person standing still in front of the camera is announced once rather
//! than every frame.
//!
//! Each client owns its own gate; it is not shared across connections.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use pathsense_perception::alert::AlertGate;
//! use pathsense_types::{Obstacle, ObstacleType, Position};
//!
//! let mut gate = AlertGate::default();
//! let obstacles = [Obstacle::new(ObstacleType::Human, 0.92, Position::Front)];
//!
//! let now = Instant::now();
//! assert_eq!(gate.announcement(&obstacles, now).as_deref(), Some("Human detected front"));
//! assert_eq!(gate.announcement(&obstacles, now), None); // repeated within cooldown
//! ```

use std::time::{Duration, Instant};

use pathsense_types::{Obstacle, Position};

/// Minimum confidence for an obstacle to be announced.
pub const ALERT_CONFIDENCE: f64 = 0.7;

/// How long an identical announcement stays suppressed.
pub const ANNOUNCEMENT_COOLDOWN: Duration = Duration::from_secs(5);

/// Per-client announcement filter.
#[derive(Debug, Clone)]
pub struct AlertGate {
    min_confidence: f64,
    cooldown: Duration,
    last: Option<(String, Instant)>,
}

impl AlertGate {
    pub fn new(min_confidence: f64, cooldown: Duration) -> Self {
        Self {
            min_confidence,
            cooldown,
            last: None,
        }
    }

    /// Return the sentence to speak for `obstacles`, if any.
    ///
    /// `now` is passed in so callers (and tests) control the clock.
    pub fn announcement(&mut self, obstacles: &[Obstacle], now: Instant) -> Option<String> {
        let critical: Vec<&str> = obstacles
            .iter()
            .filter(|o| o.confidence() >= self.min_confidence && o.position() == Position::Front)
            .map(|o| o.description())
            .collect();

        if critical.is_empty() {
            return None;
        }

        let sentence = critical.join(". ");
        if let Some((previous, spoken_at)) = &self.last
            && *previous == sentence
            && now.saturating_duration_since(*spoken_at) < self.cooldown
        {
            return None;
        }

        self.last = Some((sentence.clone(), now));
        Some(sentence)
    }
}

impl Default for AlertGate {
    fn default() -> Self {
        Self::new(ALERT_CONFIDENCE, ANNOUNCEMENT_COOLDOWN)
    }
}
