//! Dominant surface orientation of a point set from its covariance spectrum.
//!
//! The covariance of the centered points is decomposed with
//! [`nalgebra::SymmetricEigen`]. The solver itself returns eigenpairs in no
//! guaranteed order, so they are re-ordered by **descending** eigenvalue
//! before selection. The orientation axis is always the eigenvector at
//! [`SELECTED_AXIS_INDEX`] of that ordering, i.e. the direction of least
//! spread (the surface normal of a patch). Changing either the ordering or
//! the index changes every published direction.

use crate::{
    constants::{EIGEN_RELATIVE_TOLERANCE, EPSILON, MIN_ORIENTATION_POINTS},
    deprojection::PointSet,
    frame::WindowKind,
};
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use thiserror::Error;

/// Index of the selected eigenvector in descending-eigenvalue order
pub const SELECTED_AXIS_INDEX: usize = 2;

/// Iteration cap for the symmetric eigen solver
const MAX_EIGEN_ITERATIONS: usize = 1000;

/// Oriented axis estimated for one sub-window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationEstimate {
    /// Mean of the window's points
    pub centroid: Point3<f64>,
    /// Signed axis, `z <= 0`, at the solver's native (unit) magnitude
    pub direction: Vector3<f64>,
    /// Window the estimate came from
    pub window: WindowKind,
}

impl OrientationEstimate {
    pub fn tag(&self) -> u8 {
        self.window.tag()
    }

    /// Arrow tip: centroid plus direction
    pub fn endpoint(&self) -> Point3<f64> {
        self.centroid + self.direction
    }
}

/// Reasons a window yields no orientation
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Degenerate {
    #[error("{count} points, need at least {required}")]
    TooFewPoints { count: usize, required: usize },

    #[error("covariance contains non-finite values")]
    NonFinite,

    #[error("points have no spread")]
    ZeroSpread,

    #[error("eigen decomposition did not converge")]
    DecompositionFailed,

    #[error("selected axis is not unique (eigenvalues {second:e} and {third:e})")]
    AmbiguousAxis { second: f64, third: f64 },
}

/// Eigen-decomposition of a covariance with pairs in descending eigenvalue order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedEigen {
    pub eigenvalues: [f64; 3],
    /// Eigenvectors as columns, matching `eigenvalues`
    pub eigenvectors: Matrix3<f64>,
}

impl OrderedEigen {
    /// Decompose `covariance`, or `None` if the solver does not converge
    pub fn decompose(covariance: Matrix3<f64>) -> Option<Self> {
        let eigen = SymmetricEigen::try_new(covariance, f64::EPSILON, MAX_EIGEN_ITERATIONS)?;

        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let eigenvalues = order.map(|i| eigen.eigenvalues[i]);
        let eigenvectors = Matrix3::from_columns(&order.map(|i| eigen.eigenvectors.column(i).into_owned()));

        Some(Self {
            eigenvalues,
            eigenvectors,
        })
    }

    /// Raw (unsigned) selected axis
    pub fn selected_axis(&self) -> Vector3<f64> {
        self.eigenvectors.column(SELECTED_AXIS_INDEX).into_owned()
    }
}

/// Mean of the points
pub fn centroid(points: &PointSet) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .points()
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Population covariance `(centeredᵗ · centered) / N` around `mean`
pub fn covariance(points: &PointSet, mean: &Point3<f64>) -> Matrix3<f64> {
    let scatter = points.points().iter().fold(Matrix3::zeros(), |acc, p| {
        let centered = p - mean;
        acc + centered * centered.transpose()
    });
    scatter / points.len().max(1) as f64
}

/// Camera-facing sign convention: a positive z flips the whole vector
pub fn resolve_sign(axis: Vector3<f64>) -> Vector3<f64> {
    if axis.z > 0.0 {
        -axis
    } else {
        axis
    }
}

/// Estimates orientation from deprojected window points
#[derive(Debug, Clone, Copy)]
pub struct OrientationEstimator {
    min_points: usize,
    tolerance: f64,
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new(MIN_ORIENTATION_POINTS, EIGEN_RELATIVE_TOLERANCE)
    }
}

impl OrientationEstimator {
    /// # Panics
    ///
    /// Panics if `min_points` is below 1 or `tolerance` is negative
    #[must_use]
    pub fn new(min_points: usize, tolerance: f64) -> Self {
        assert!(min_points >= 1, "Minimum point count must be at least 1");
        assert!(tolerance >= 0.0, "Tolerance must be non-negative");
        Self { min_points, tolerance }
    }

    /// Estimate the oriented axis of `points`
    ///
    /// # Errors
    ///
    /// Returns [`Degenerate`] when the points cannot determine a unique axis
    pub fn estimate(&self, points: &PointSet, window: WindowKind) -> Result<OrientationEstimate, Degenerate> {
        if points.len() < self.min_points {
            return Err(Degenerate::TooFewPoints {
                count: points.len(),
                required: self.min_points,
            });
        }

        let mean = centroid(points).ok_or(Degenerate::TooFewPoints {
            count: 0,
            required: self.min_points,
        })?;
        let cov = covariance(points, &mean);

        if !mean.coords.iter().chain(cov.iter()).all(|v| v.is_finite()) {
            return Err(Degenerate::NonFinite);
        }

        let spread = cov.trace();
        if spread <= EPSILON {
            return Err(Degenerate::ZeroSpread);
        }

        let eigen = OrderedEigen::decompose(cov).ok_or(Degenerate::DecompositionFailed)?;
        let [_, second, third] = eigen.eigenvalues;
        if (second - third).abs() <= self.tolerance * spread {
            return Err(Degenerate::AmbiguousAxis { second, third });
        }

        let axis = eigen.selected_axis();
        if !axis.iter().all(|v| v.is_finite()) {
            return Err(Degenerate::NonFinite);
        }

        Ok(OrientationEstimate {
            centroid: mean,
            direction: resolve_sign(axis),
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Planar grid through `center` with normal tilted `tilt` radians about the y axis
    fn tilted_plane(center: Point3<f64>, tilt: f64, extent: f64, steps: usize) -> PointSet {
        let in_plane_x = Vector3::new(tilt.cos(), 0.0, -tilt.sin());
        let in_plane_y = Vector3::y();
        let mut points = Vec::new();
        for i in 0..steps {
            for j in 0..steps {
                let u = extent * (i as f64 / (steps - 1) as f64 - 0.5);
                let v = extent * (j as f64 / (steps - 1) as f64 - 0.5);
                points.push(center + in_plane_x * u + in_plane_y * v);
            }
        }
        PointSet::new(points)
    }

    #[test]
    fn test_centroid_and_covariance() {
        let set = PointSet::new(vec![Point3::new(1.0, 0.0, 0.0), Point3::new(-1.0, 0.0, 0.0)]);
        let mean = centroid(&set).unwrap();
        assert_eq!(mean, Point3::origin());
        let cov = covariance(&set, &mean);
        assert_eq!(cov[(0, 0)], 1.0);
        assert_eq!(cov[(1, 1)], 0.0);
        assert_eq!(cov[(2, 2)], 0.0);
    }

    #[test]
    fn test_ordered_eigen_is_descending() {
        let cov = Matrix3::from_diagonal(&Vector3::new(0.5, 3.0, 1.0));
        let eigen = OrderedEigen::decompose(cov).unwrap();
        assert_eq!(eigen.eigenvalues, [3.0, 1.0, 0.5]);
        assert!((eigen.selected_axis().x.abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fronto_parallel_plane_points_at_camera() {
        let set = tilted_plane(Point3::new(0.0, 0.0, 1.0), 0.0, 0.2, 10);
        let estimate = OrientationEstimator::default().estimate(&set, WindowKind::Full).unwrap();
        assert!((estimate.direction.z + 1.0).abs() < 1e-9);
        assert!((estimate.centroid.z - 1.0).abs() < 1e-12);
        assert_eq!(estimate.tag(), 2);
    }

    #[test]
    fn test_tilted_plane_normal() {
        let tilt = 30f64.to_radians();
        let set = tilted_plane(Point3::new(0.1, -0.05, 1.2), tilt, 0.2, 15);
        let estimate = OrientationEstimator::default().estimate(&set, WindowKind::Upper).unwrap();

        let d = estimate.direction;
        let angle = (d.z.abs() / d.norm()).acos().to_degrees();
        assert!((angle - 30.0).abs() < 1e-6, "angle was {angle}");
        assert!(d.z < 0.0);
    }

    #[test]
    fn test_identical_points_are_degenerate() {
        let set = PointSet::new(vec![Point3::new(0.2, 0.1, 1.0); 50]);
        assert_eq!(
            OrientationEstimator::default().estimate(&set, WindowKind::Full),
            Err(Degenerate::ZeroSpread)
        );
    }

    #[test]
    fn test_too_few_points() {
        let set = PointSet::new(vec![Point3::new(0.0, 0.0, 1.0), Point3::new(0.1, 0.0, 1.0)]);
        assert!(matches!(
            OrientationEstimator::default().estimate(&set, WindowKind::Full),
            Err(Degenerate::TooFewPoints { count: 2, required: 3 })
        ));
        assert!(matches!(
            OrientationEstimator::default().estimate(&PointSet::default(), WindowKind::Full),
            Err(Degenerate::TooFewPoints { count: 0, .. })
        ));
    }

    #[test]
    fn test_collinear_points_are_ambiguous() {
        let set = PointSet::new((0..20).map(|i| Point3::new(f64::from(i) * 0.01, 0.0, 1.0)).collect());
        assert!(matches!(
            OrientationEstimator::default().estimate(&set, WindowKind::Upper),
            Err(Degenerate::AmbiguousAxis { .. })
        ));
    }

    #[test]
    fn test_non_finite_points() {
        let set = PointSet::new(vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(f64::NAN, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ]);
        assert_eq!(
            OrientationEstimator::default().estimate(&set, WindowKind::Upper),
            Err(Degenerate::NonFinite)
        );
    }

    #[test]
    fn test_resolve_sign() {
        assert_eq!(resolve_sign(Vector3::new(0.1, -0.2, 0.3)), Vector3::new(-0.1, 0.2, -0.3));
        assert_eq!(resolve_sign(Vector3::new(0.1, -0.2, -0.3)), Vector3::new(0.1, -0.2, -0.3));
        assert_eq!(resolve_sign(Vector3::new(0.1, 0.2, 0.0)), Vector3::new(0.1, 0.2, 0.0));
    }

    proptest! {
        #[test]
        fn prop_sign_law(coords in prop::collection::vec((-1.0..1.0f64, -1.0..1.0f64, 0.5..3.0f64), 8..40)) {
            let set = PointSet::new(coords.iter().map(|&(x, y, z)| Point3::new(x, y, z)).collect());
            let mean = centroid(&set).unwrap();
            let raw = OrderedEigen::decompose(covariance(&set, &mean)).unwrap().selected_axis();

            if let Ok(estimate) = OrientationEstimator::default().estimate(&set, WindowKind::Full) {
                let d = estimate.direction;
                prop_assert!(d.z <= 0.0);
                prop_assert!((d.norm() - raw.norm()).abs() < 1e-12);
                if raw.z > 0.0 {
                    prop_assert_eq!(d, -raw);
                } else {
                    prop_assert_eq!(d, raw);
                }
            }
        }
    }
}
