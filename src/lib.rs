//! SpeedFlow Core - Roadside Vehicle Speed Estimation
//!
//! Turns a stream of per-frame, per-track detections into physically
//! plausible, smoothed real-world speeds:
//! 1. **Calibration**: a fixed 4-point planar homography maps image-space
//!    anchor points onto the metric road plane
//! 2. **Kinematics**: raw speed from a sliding one-second window of
//!    world-space positions
//! 3. **Admission**: five short-circuit rules reject implausible estimates
//!    (young tracks, jitter, impossible speeds, bbox jumps, low confidence)
//! 4. **Smoothing**: a running median over accepted raw speeds
//!
//! Detection, tracking, rendering, and transport are collaborator concerns;
//! this crate is a pure function of bounded per-track history.

pub mod calibration;
pub mod estimator;
pub mod smoothing;
pub mod validation;

// Re-export key types for convenience
pub use calibration::{CalibrationError, ViewTransformer};
pub use estimator::{Detection, SpeedConfig, SpeedEstimator, SpeedMeasurement};
pub use smoothing::MedianSmoother;
pub use validation::ValidationRule;
