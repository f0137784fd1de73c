//! Measurement Validator - Admission Rules for Raw Speed Estimates
//!
//! A raw speed becomes a measurement only after clearing five independent
//! admission rules evaluated in a fixed order with short-circuit semantics:
//! 1. Track age (freshly spawned trajectories are untrusted)
//! 2. Minimum displacement (stationary or jittering objects)
//! 3. Absolute speed bound (physically impossible estimates)
//! 4. Bbox stability (occlusion onset, id switches, partial detections)
//! 5. Detection confidence
//!
//! The validator is a pure predicate over a snapshot of track state plus the
//! current observation; it holds no mutable state. Callers only learn
//! pass/fail - the first failing rule is reported internally for logging.

use crate::estimator::SpeedConfig;

// ============================================================================
// OBSERVATION SNAPSHOT
// ============================================================================

/// Everything a single validation pass looks at, captured before any
/// measurement-side state is updated.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    /// Frames elapsed since the track was first sighted.
    pub age_frames: u64,

    /// Absolute world-space displacement across the position window, when the
    /// window holds at least two samples.
    pub displacement_m: Option<f64>,

    /// Raw (unsmoothed) speed computed for this call, in km/h.
    pub raw_speed_kmh: f64,

    /// Bbox area from the previous processed frame for this track. `None` on
    /// the first area check for a track, which always passes - the reference
    /// area defaults to the current one.
    pub previous_area: Option<f64>,

    /// Bbox area of the current detection.
    pub current_area: f64,

    /// Detection confidence of the current detection, nominally in [0, 1].
    pub confidence: f64,
}

// ============================================================================
// ADMISSION RULES
// ============================================================================

/// The five admission rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    TrackAge,
    MinDisplacement,
    SpeedBound,
    BboxStability,
    DetectionConfidence,
}

/// Fixed evaluation order of the admission gate.
pub const RULE_ORDER: [ValidationRule; 5] = [
    ValidationRule::TrackAge,
    ValidationRule::MinDisplacement,
    ValidationRule::SpeedBound,
    ValidationRule::BboxStability,
    ValidationRule::DetectionConfidence,
];

impl ValidationRule {
    /// Whether this single rule admits the observation.
    pub fn admits(&self, observation: &Observation, config: &SpeedConfig) -> bool {
        match self {
            ValidationRule::TrackAge => {
                observation.age_frames >= config.min_track_age_frames
            }
            ValidationRule::MinDisplacement => observation
                .displacement_m
                .map_or(true, |d| d >= config.min_world_displ_m),
            ValidationRule::SpeedBound => {
                observation.raw_speed_kmh > 0.0
                    && observation.raw_speed_kmh <= config.max_abs_kmh
            }
            ValidationRule::BboxStability => match observation.previous_area {
                Some(previous) if previous > 0.0 => {
                    observation.current_area / previous <= config.bbox_area_jump
                }
                _ => true,
            },
            ValidationRule::DetectionConfidence => {
                observation.confidence >= config.min_det_conf
            }
        }
    }
}

/// Run the gate in order and return the first failing rule, or `None` when
/// the observation is admitted.
pub fn first_rejection(
    observation: &Observation,
    config: &SpeedConfig,
) -> Option<ValidationRule> {
    RULE_ORDER
        .into_iter()
        .find(|rule| !rule.admits(observation, config))
}

/// Whether the observation clears all five rules.
pub fn validate(observation: &Observation, config: &SpeedConfig) -> bool {
    first_rejection(observation, config).is_none()
}

// ============================================================================
// TESTS
// ============================================================================
