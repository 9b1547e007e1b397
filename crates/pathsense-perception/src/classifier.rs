//! Response Classifier.
//!
//! Maps [`RawAnnotations`] onto the [`Obstacle`] model along two independent
//! axes:
//!
//! - **Type** – a case-insensitive substring match of the object name against
//!   the ordered keyword [`TAXONOMY`]; the first matching category wins.
//! - **Position** – derived from the normalised bounding polygon.  The frame
//!   is split into thirds horizontally; a centred object whose lowest vertex
//!   sits in the bottom 40% of the frame is "near" and reported `FRONT`.
//!
//! ```text
//!   x:  0 ─── 0.33 ─── 0.66 ─── 1
//!       │ LEFT │ FRONT  │ RIGHT │
//! ```
//!
//! Scene labels ("wall", "corridor", "hallway") add at most one synthetic
//! `wall` obstacle ahead of the per-object detections.  The synthetic entry
//! bypasses the confidence threshold since it encodes an environmental
//! hazard rather than a detection score.

use pathsense_types::{Obstacle, ObstacleType, Position};

use crate::vision_client::{NormalizedVertex, RawAnnotations, RawDetection};

/// Per-object detections scoring below this are dropped.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Confidence assigned to the label-derived wall obstacle.
pub const SYNTHETIC_WALL_CONFIDENCE: f64 = 0.9;

/// Scene labels that indicate an enclosing wall ahead.
pub const WALL_LABELS: &[&str] = &["wall", "corridor", "hallway"];

/// Keyword taxonomy, checked top to bottom.
pub const TAXONOMY: &[(ObstacleType, &[&str])] = &[
    (
        ObstacleType::Human,
        &["person", "human", "pedestrian", "people", "man", "woman", "child"],
    ),
    (
        ObstacleType::Vehicle,
        &["car", "vehicle", "bicycle", "motorcycle", "truck", "bus", "van", "scooter"],
    ),
    (
        ObstacleType::StaticObstacle,
        &["pole", "sign", "bench", "tree", "building", "wall", "post", "barrier", "fence"],
    ),
];

const LEFT_BOUNDARY: f64 = 0.33;
const RIGHT_BOUNDARY: f64 = 0.66;
const NEAR_Y: f64 = 0.6;

/// Classify an object name by keyword.
pub fn classify_type(name: &str) -> ObstacleType {
    let name = name.to_lowercase();
    TAXONOMY
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(ObstacleType::Unknown)
}

/// Locate a detection from its normalised bounding polygon.
///
/// Missing x coordinates count as 0.5 and missing y coordinates as 0.
pub fn classify_position(vertices: &[NormalizedVertex]) -> Position {
    if vertices.is_empty() {
        return Position::Unknown;
    }

    let x_center =
        vertices.iter().map(|v| v.x.unwrap_or(0.5)).sum::<f64>() / vertices.len() as f64;
    let y_max = vertices
        .iter()
        .map(|v| v.y.unwrap_or(0.0))
        .fold(f64::MIN, f64::max);

    let centred = x_center > LEFT_BOUNDARY && x_center < RIGHT_BOUNDARY;
    if y_max > NEAR_Y && centred {
        Position::Front
    } else if x_center < LEFT_BOUNDARY {
        Position::Left
    } else if x_center > RIGHT_BOUNDARY {
        Position::Right
    } else {
        // Centred but distant, or exactly on a boundary: warn rather than
        // stay silent.
        Position::Front
    }
}

/// Build the obstacle for one detection that cleared the threshold.
pub fn classify_detection(detection: &RawDetection) -> Obstacle {
    Obstacle::new(
        classify_type(&detection.name),
        detection.score,
        classify_position(&detection.vertices),
    )
}

/// Whether any scene label names a wall, corridor or hallway.
pub fn has_wall_label(labels: &[String]) -> bool {
    labels
        .iter()
        .any(|label| WALL_LABELS.contains(&label.to_lowercase().as_str()))
}

/// Turn one raw response into the ordered obstacle list.
pub fn classify(raw: &RawAnnotations) -> Vec<Obstacle> {
    let mut obstacles = Vec::with_capacity(raw.objects.len() + 1);

    if has_wall_label(&raw.labels) {
        obstacles.push(Obstacle::new(
            ObstacleType::Wall,
            SYNTHETIC_WALL_CONFIDENCE,
            Position::Front,
        ));
    }

    obstacles.extend(
        raw.objects
            .iter()
            // NaN scores compare false and are dropped too.
            .filter(|d| d.score >= MIN_CONFIDENCE)
            .map(classify_detection),
    );

    obstacles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f64, y: f64) -> NormalizedVertex {
        NormalizedVertex {
            x: Some(x),
            y: Some(y),
        }
    }

    fn detection(name: &str, score: f64, vertices: Vec<NormalizedVertex>) -> RawDetection {
        RawDetection {
            name: name.to_string(),
            score,
            vertices,
        }
    }

    #[test]
    fn type_keywords_match_case_insensitively() {
        assert_eq!(classify_type("Person"), ObstacleType::Human);
        assert_eq!(classify_type("PEDESTRIAN"), ObstacleType::Human);
        assert_eq!(classify_type("Bicycle"), ObstacleType::Vehicle);
        assert_eq!(classify_type("Street sign"), ObstacleType::StaticObstacle);
        assert_eq!(classify_type("Coffee cup"), ObstacleType::Unknown);
        assert_eq!(classify_type(""), ObstacleType::Unknown);
    }

    #[test]
    fn type_matching_is_substring_and_priority_ordered() {
        // "woman" contains "man"; both are human keywords.
        assert_eq!(classify_type("Woman"), ObstacleType::Human);
        // Keywords inside longer words still match.
        assert_eq!(classify_type("Lamppost"), ObstacleType::StaticObstacle);
        assert_eq!(classify_type("Van"), ObstacleType::Vehicle);
        // A name hitting both human and vehicle keywords resolves to human.
        assert_eq!(classify_type("Man on scooter"), ObstacleType::Human);
        // Vehicle is checked before static: "Bus sign" -> vehicle.
        assert_eq!(classify_type("Bus sign"), ObstacleType::Vehicle);
    }

    #[test]
    fn near_centred_object_is_front() {
        assert_eq!(classify_position(&[vertex(0.5, 0.7)]), Position::Front);
        assert_eq!(
            classify_position(&[vertex(0.4, 0.2), vertex(0.6, 0.7)]),
            Position::Front
        );
    }

    #[test]
    fn distant_centred_object_still_reports_front() {
        assert_eq!(classify_position(&[vertex(0.5, 0.1)]), Position::Front);
    }

    #[test]
    fn left_and_right_thirds() {
        assert_eq!(classify_position(&[vertex(0.2, 0.1)]), Position::Left);
        assert_eq!(classify_position(&[vertex(0.2, 0.95)]), Position::Left);
        assert_eq!(classify_position(&[vertex(0.8, 0.1)]), Position::Right);
        assert_eq!(classify_position(&[vertex(0.8, 0.95)]), Position::Right);
    }

    #[test]
    fn empty_polygon_is_unknown() {
        assert_eq!(classify_position(&[]), Position::Unknown);
    }

    #[test]
    fn missing_coordinates_use_defaults() {
        // x defaults to the centre, y to the top edge.
        let vertices = [NormalizedVertex { x: None, y: None }];
        assert_eq!(classify_position(&vertices), Position::Front);

        // Mean x = (0.0 + 0.5) / 2 = 0.25 -> left.
        let vertices = [vertex(0.0, 0.9), NormalizedVertex { x: None, y: Some(0.9) }];
        assert_eq!(classify_position(&vertices), Position::Left);
    }

    #[test]
    fn person_scenario() {
        let raw = RawAnnotations {
            objects: vec![detection("person", 0.9, vec![vertex(0.5, 0.8)])],
            labels: vec![],
        };
        let obstacles = classify(&raw);
        assert_eq!(
            obstacles,
            vec![Obstacle::new(ObstacleType::Human, 0.9, Position::Front)]
        );
        assert_eq!(obstacles[0].description(), "Human detected front");
    }

    #[test]
    fn low_confidence_detections_are_dropped() {
        let raw = RawAnnotations {
            objects: vec![
                detection("Car", 0.49, vec![vertex(0.1, 0.1)]),
                detection("Tree", 0.5, vec![vertex(0.9, 0.1)]),
                detection("Person", f64::NAN, vec![vertex(0.5, 0.9)]),
            ],
            labels: vec![],
        };
        let obstacles = classify(&raw);
        assert_eq!(obstacles.len(), 1);
        assert_eq!(obstacles[0].object_type(), ObstacleType::StaticObstacle);
        assert_eq!(obstacles[0].position(), Position::Right);
        assert!(obstacles.iter().all(|o| o.confidence() >= MIN_CONFIDENCE));
    }

    #[test]
    fn corridor_label_adds_exactly_one_wall_first() {
        let raw = RawAnnotations {
            objects: vec![
                detection("Bench", 0.8, vec![vertex(0.1, 0.5)]),
                detection("Person", 0.6, vec![vertex(0.9, 0.5)]),
            ],
            labels: vec![
                "CORRIDOR".into(),
                "Hallway".into(),
                "wall".into(),
                "Floor".into(),
            ],
        };
        let obstacles = classify(&raw);

        let walls: Vec<_> = obstacles
            .iter()
            .filter(|o| o.object_type() == ObstacleType::Wall)
            .collect();
        assert_eq!(walls.len(), 1);

        let wall = &obstacles[0];
        assert_eq!(wall.object_type(), ObstacleType::Wall);
        assert_eq!(wall.position(), Position::Front);
        assert!((wall.confidence() - SYNTHETIC_WALL_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(wall.description(), "Wall detected front");

        assert_eq!(obstacles[1].object_type(), ObstacleType::StaticObstacle);
        assert_eq!(obstacles[2].object_type(), ObstacleType::Human);
    }

    #[test]
    fn wall_label_without_objects() {
        let raw = RawAnnotations {
            objects: vec![],
            labels: vec!["Wall".into()],
        };
        assert_eq!(classify(&raw).len(), 1);
    }

    #[test]
    fn wall_labels_match_whole_label_only() {
        assert!(!has_wall_label(&["Wallpaper".into(), "Brick".into()]));
        assert!(has_wall_label(&["HALLWAY".into()]));
        assert!(!has_wall_label(&[" Hallway ".into()]));
    }

    #[test]
    fn object_order_follows_service_order() {
        let raw = RawAnnotations {
            objects: vec![
                detection("Truck", 0.7, vec![vertex(0.9, 0.2)]),
                detection("Child", 0.8, vec![vertex(0.1, 0.2)]),
                detection("Lamp", 0.9, vec![]),
            ],
            labels: vec![],
        };
        let types: Vec<_> = classify(&raw).iter().map(|o| o.object_type()).collect();
        assert_eq!(
            types,
            vec![ObstacleType::Vehicle, ObstacleType::Human, ObstacleType::Unknown]
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let raw = RawAnnotations {
            objects: vec![detection("Fence", 0.77, vec![vertex(0.3, 0.4), vertex(0.5, 0.9)])],
            labels: vec!["corridor".into()],
        };
        assert_eq!(classify(&raw), classify(&raw));
    }
}
