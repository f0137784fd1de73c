//! Perspective Calibrator - Image Plane to Road Plane Mapping
//!
//! A fixed planar homography maps image-space pixels onto the metric road
//! plane, under the assumption that tracked objects move on that plane.
//! The mapping is constructed once from four calibration point pairs and is
//! immutable afterwards, so a single transformer can be shared read-only by
//! all per-track processing.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Number of point pairs a planar calibration requires.
pub const CALIBRATION_POINTS: usize = 4;

/// Errors that can occur while constructing a [`ViewTransformer`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum CalibrationError {
    #[error("expected exactly {CALIBRATION_POINTS} {side} points, got {count}")]
    PointCountMismatch { side: &'static str, count: usize },

    #[error("calibration points are degenerate (coincident or collinear)")]
    DegenerateGeometry,
}

/// Maps image-space points to world-space (metric) points through a fixed
/// 3×3 planar homography.
///
/// Construction fails if either point set does not have exactly four points
/// or if the points do not determine a unique projective transform. Once
/// built, the transform is a pure function of its matrix and is safe to
/// invoke concurrently from multiple readers.
#[derive(Debug, Clone)]
pub struct ViewTransformer {
    homography: Matrix3<f64>,
}

impl ViewTransformer {
    /// Build the transformer from four source (image) and four target (world)
    /// points.
    ///
    /// The homography H is the solution of the standard 8×8 linear system
    /// constraining H·sᵢ ~ tᵢ for each pair, with H₃₃ fixed to 1.
    pub fn new(
        source: &[Point2<f64>],
        target: &[Point2<f64>],
    ) -> Result<Self, CalibrationError> {
        if source.len() != CALIBRATION_POINTS {
            return Err(CalibrationError::PointCountMismatch {
                side: "source",
                count: source.len(),
            });
        }
        if target.len() != CALIBRATION_POINTS {
            return Err(CalibrationError::PointCountMismatch {
                side: "target",
                count: target.len(),
            });
        }

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, t)) in source.iter().zip(target.iter()).enumerate() {
            let (x, y) = (s.x, s.y);
            let (u, v) = (t.x, t.y);

            let rows = [
                [x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u],
                [0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v],
            ];
            for (j, row) in rows.iter().enumerate() {
                for (k, value) in row.iter().enumerate() {
                    a[(i * 2 + j, k)] = *value;
                }
            }
            b[i * 2] = u;
            b[i * 2 + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or(CalibrationError::DegenerateGeometry)?;

        #[rustfmt::skip]
        let homography = Matrix3::new(
            h[0], h[1], h[2],
            h[3], h[4], h[5],
            h[6], h[7], 1.0,
        );

        Ok(Self { homography })
    }

    /// Map a single image-space point to world space.
    pub fn transform_point(&self, point: Point2<f64>) -> Point2<f64> {
        let p = self.homography * Vector3::new(point.x, point.y, 1.0);
        Point2::new(p.x / p.z, p.y / p.z)
    }

    /// Map a batch of points with identical per-point semantics.
    ///
    /// An empty input yields an empty output, not an error.
    pub fn transform_points(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        points.iter().map(|p| self.transform_point(*p)).collect()
    }

    /// The underlying 3×3 homography matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.homography
    }
}

/// Rescale calibration points picked at one resolution to another.
///
/// Calibration clicks are typically taken on a reference still whose
/// resolution differs from the decoded stream; source points must be scaled
/// to the stream resolution before constructing the [`ViewTransformer`].
pub fn scale_points(
    points: &[Point2<f64>],
    from_resolution: (f64, f64),
    to_resolution: (f64, f64),
) -> Vec<Point2<f64>> {
    let scale_x = to_resolution.0 / from_resolution.0;
    let scale_y = to_resolution.1 / from_resolution.1;

    points
        .iter()
        .map(|p| Point2::new(p.x * scale_x, p.y * scale_y))
        .collect()
}
