//! Speed Estimator - Per-Track Kinematics and Lifecycle
//!
//! The engine that ties the pipeline together. For every detection it:
//! 1. Lazily creates per-track state on first sighting (recording the birth
//!    frame)
//! 2. Maps the image-space anchor point to the road plane via the calibrator
//! 3. Appends the world-space position to the track's bounded window
//! 4. Computes raw speed once the window is full
//! 5. Runs the admission gate and median-smooths accepted values
//!
//! Rejection and insufficient history are normal, frequent outcomes, not
//! errors: `process` returns `None` for them and `Some(SpeedMeasurement)`
//! only for an accepted, smoothed estimate. Track eviction is caller-driven;
//! no state ages out internally.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

use crate::calibration::ViewTransformer;
use crate::smoothing::MedianSmoother;
use crate::validation::{self, Observation};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the speed estimation pipeline.
///
/// Every option is independently overridable; unset fields fall back to the
/// defaults below when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Nominal frames per second of the stream; sets the position window
    /// length and the elapsed-time denominator (default: 25.0)
    pub video_fps: f64,

    /// Overspeed threshold in km/h (default: 60.0)
    pub speed_limit_kmh: f64,

    /// Minimum track age in frames before a measurement is trusted
    /// (default: 12, ~0.5s at 25 fps)
    pub min_track_age_frames: u64,

    /// Minimum world-space displacement across the window in metres
    /// (default: 0.5)
    pub min_world_displ_m: f64,

    /// Hard physical ceiling on accepted speed in km/h (default: 160.0)
    pub max_abs_kmh: f64,

    /// Maximum ratio of current to previous bbox area (default: 2.5)
    pub bbox_area_jump: f64,

    /// Minimum detection confidence to accept (default: 0.45)
    pub min_det_conf: f64,

    /// Number of accepted speeds smoothed together (default: 5)
    pub median_window: usize,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            video_fps: 25.0,
            speed_limit_kmh: 60.0,
            min_track_age_frames: 12,
            min_world_displ_m: 0.5,
            max_abs_kmh: 160.0,
            bbox_area_jump: 2.5,
            min_det_conf: 0.45,
            median_window: 5,
        }
    }
}

impl SpeedConfig {
    /// Position-history window length: one nominal second of frames,
    /// rounded, never below 1.
    pub fn history_window(&self) -> usize {
        (self.video_fps.round() as usize).max(1)
    }
}

// ============================================================================
// DETECTION (Input)
// ============================================================================

/// A single per-frame observation of one tracked object, as produced by the
/// upstream detector/tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Externally assigned track id, unique per physical object for the
    /// lifetime the upstream tracker considers it continuous.
    pub track_id: u64,

    /// Image-space anchor point [x, y], conventionally the bottom-center of
    /// the bounding box (the ground contact location).
    pub anchor: [f64; 2],

    /// Bounding-box area in image pixels.
    pub bbox_area: f64,

    /// Detection confidence in [0, 1].
    pub confidence: f64,

    /// Monotonically non-decreasing frame index.
    pub frame_number: u64,
}

// ============================================================================
// MEASUREMENT (Output)
// ============================================================================

/// An accepted, median-smoothed speed estimate for one track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedMeasurement {
    pub track_id: u64,

    /// Frame the measurement was computed on.
    pub frame_number: u64,

    /// Median-smoothed speed in km/h.
    pub speed_kmh: f64,

    /// Whether the smoothed speed exceeds the configured limit.
    pub is_overspeeding: bool,
}

// ============================================================================
// PER-TRACK STATE
// ============================================================================

/// All mutable state for one active track. Created on first sighting,
/// destroyed only by explicit eviction, so partial state cannot exist.
#[derive(Debug)]
struct TrackState {
    /// Frame index at which this id was first observed; immutable once set.
    birth_frame: u64,

    /// Bounded window of world-space Y positions, oldest first.
    positions: VecDeque<f64>,

    /// Bbox area from the previous processed full-window frame; `None` until
    /// the first area check, which therefore always passes.
    last_bbox_area: Option<f64>,

    /// Median filter over accepted raw speeds.
    smoother: MedianSmoother,

    /// Most recently emitted display string, e.g. "37.5 km/h".
    last_speed_text: Option<String>,

    /// Frame of the last valid measurement.
    last_update_frame: Option<u64>,
}

impl TrackState {
    fn new(birth_frame: u64, history_window: usize, median_window: usize) -> Self {
        Self {
            birth_frame,
            positions: VecDeque::with_capacity(history_window),
            last_bbox_area: None,
            smoother: MedianSmoother::new(median_window),
            last_speed_text: None,
            last_update_frame: None,
        }
    }

    /// Append a world-space position, evicting the oldest sample once the
    /// window is at capacity.
    fn push_position(&mut self, y_world: f64, capacity: usize) {
        self.positions.push_back(y_world);
        while self.positions.len() > capacity {
            self.positions.pop_front();
        }
    }

    /// Absolute straight-line displacement between the newest and oldest
    /// sample, when at least two are present.
    fn window_displacement_m(&self) -> Option<f64> {
        match (self.positions.front(), self.positions.back()) {
            (Some(oldest), Some(newest)) if self.positions.len() >= 2 => {
                Some((newest - oldest).abs())
            }
            _ => None,
        }
    }
}

// ============================================================================
// SPEED ESTIMATOR (The Engine)
// ============================================================================

/// Estimates real-world speeds for tracked objects in one calibrated view.
///
/// Single-threaded, call-by-call: the host drives it with one `process` call
/// per detection in frame order. Every operation is synchronous and bounded
/// by the configured windows. The embedded [`ViewTransformer`] is read-only
/// and safe to share; per-track state is not, so hosts parallelizing across
/// tracks must keep exclusive access per track id.
pub struct SpeedEstimator {
    transformer: ViewTransformer,
    config: SpeedConfig,

    /// Position window capacity, derived once from `video_fps`.
    history_window: usize,

    /// All active tracks, keyed by the external track id.
    tracks: HashMap<u64, TrackState>,
}

impl SpeedEstimator {
    /// Create an estimator for one calibrated view.
    pub fn new(transformer: ViewTransformer, config: SpeedConfig) -> Self {
        let history_window = config.history_window();
        Self {
            transformer,
            config,
            history_window,
            tracks: HashMap::new(),
        }
    }

    /// Create an estimator with the default configuration.
    pub fn with_defaults(transformer: ViewTransformer) -> Self {
        Self::new(transformer, SpeedConfig::default())
    }

    /// Process one detection and return a smoothed measurement if the track
    /// has enough admissible history, `None` otherwise.
    pub fn process(&mut self, detection: &Detection) -> Option<SpeedMeasurement> {
        let world = self
            .transformer
            .transform_point(Point2::new(detection.anchor[0], detection.anchor[1]));
        let y_world = world.y;

        let history_window = self.history_window;
        let median_window = self.config.median_window;
        let track = self.tracks.entry(detection.track_id).or_insert_with(|| {
            debug!(
                track_id = detection.track_id,
                birth_frame = detection.frame_number,
                "new track sighted"
            );
            TrackState::new(detection.frame_number, history_window, median_window)
        });

        track.push_position(y_world, history_window);

        // A full window of positions is required before any estimate.
        if track.positions.len() < history_window {
            return None;
        }

        let raw_speed_kmh = compute_raw_speed_kmh(&track.positions, self.config.video_fps);

        // The area check compares against the previous full-window frame;
        // the reference area is updated whether or not the gate admits.
        let previous_area = track.last_bbox_area.replace(detection.bbox_area);

        let observation = Observation {
            age_frames: detection.frame_number.saturating_sub(track.birth_frame),
            displacement_m: track.window_displacement_m(),
            raw_speed_kmh,
            previous_area,
            current_area: detection.bbox_area,
            confidence: detection.confidence,
        };

        if let Some(rule) = validation::first_rejection(&observation, &self.config) {
            trace!(
                track_id = detection.track_id,
                frame = detection.frame_number,
                rejected_by = ?rule,
                raw_speed_kmh,
                "measurement rejected"
            );
            return None;
        }

        let speed_kmh = track.smoother.push(raw_speed_kmh);
        let is_overspeeding = speed_kmh > self.config.speed_limit_kmh;

        track.last_speed_text = Some(format!("{speed_kmh:.1} km/h"));
        track.last_update_frame = Some(detection.frame_number);

        Some(SpeedMeasurement {
            track_id: detection.track_id,
            frame_number: detection.frame_number,
            speed_kmh,
            is_overspeeding,
        })
    }

    /// Atomically drop all state for a track. The caller is the sole
    /// authority on track end; a later detection with the same id starts a
    /// brand-new track.
    ///
    /// Returns `true` if the track existed.
    pub fn evict(&mut self, track_id: u64) -> bool {
        let existed = self.tracks.remove(&track_id).is_some();
        if existed {
            debug!(track_id, "track evicted");
        }
        existed
    }

    /// Display string of the most recent valid measurement for a track,
    /// e.g. "37.5 km/h", or `None` if the track has none yet.
    pub fn speed_text(&self, track_id: u64) -> Option<&str> {
        self.tracks
            .get(&track_id)?
            .last_speed_text
            .as_deref()
    }

    /// Frame of the most recent valid measurement for a track. Lets hosts
    /// age out stale overlay text between valid measurements.
    pub fn last_update_frame(&self, track_id: u64) -> Option<u64> {
        self.tracks.get(&track_id)?.last_update_frame
    }

    /// Number of currently active tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// The active configuration.
    pub fn config(&self) -> &SpeedConfig {
        &self.config
    }

    /// The shared calibrator.
    pub fn transformer(&self) -> &ViewTransformer {
        &self.transformer
    }
}

// ============================================================================
// KINEMATICS
// ============================================================================

/// Raw instantaneous speed over a position window, in km/h.
///
/// Distance is the straight-line displacement between the newest and oldest
/// sample, not cumulative path length. Elapsed time comes from discrete frame
/// counts at the nominal rate, not wall-clock gaps. A degenerate window of
/// length 1 (only possible when fps rounds to 1) yields zero rather than a
/// division by zero.
fn compute_raw_speed_kmh(positions: &VecDeque<f64>, video_fps: f64) -> f64 {
    let (Some(oldest), Some(newest)) = (positions.front(), positions.back()) else {
        return 0.0;
    };

    let distance_m = (newest - oldest).abs();
    let elapsed_s = (positions.len() - 1) as f64 / video_fps;
    if elapsed_s <= 0.0 {
        return 0.0;
    }

    // m/s to km/h
    distance_m / elapsed_s * 3.6
}

// ============================================================================
// TESTS
// ============================================================================
