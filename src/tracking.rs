//! Optical-flow collaborator used to shift region boxes between frames.

use crate::{
    frame::{DepthFrame, Region},
    Error, Result,
};
use nalgebra::{Matrix2, Vector2};

/// Estimates the pixel displacement of a region between two depth frames
pub trait MotionTracker: Send {
    /// Displacement `(dx, dy)` of `region` from `prev` to `curr`
    ///
    /// # Errors
    ///
    /// Returns an error if the region carries no usable gradient
    fn track(&self, curr: &DepthFrame, prev: &DepthFrame, region: &Region) -> Result<(f64, f64)>;

    /// Tracker name for logging
    fn name(&self) -> &str;
}

/// Single-window Lucas-Kanade on depth gradients
#[derive(Debug, Clone, Copy)]
pub struct LucasKanade {
    /// Minimum determinant of the structure tensor
    min_determinant: f64,
}

impl Default for LucasKanade {
    fn default() -> Self {
        Self { min_determinant: 1e-6 }
    }
}

impl LucasKanade {
    #[must_use]
    pub fn new(min_determinant: f64) -> Self {
        Self { min_determinant }
    }
}

impl MotionTracker for LucasKanade {
    fn track(&self, curr: &DepthFrame, prev: &DepthFrame, region: &Region) -> Result<(f64, f64)> {
        if curr.width() != prev.width() || curr.height() != prev.height() {
            return Err(Error::Tracking(format!(
                "Frame sizes differ: {}x{} vs {}x{}",
                curr.width(),
                curr.height(),
                prev.width(),
                prev.height()
            )));
        }

        let rect = region.rect(curr.width(), curr.height());
        let mut tensor = Matrix2::<f64>::zeros();
        let mut mismatch = Vector2::<f64>::zeros();

        // Central differences need one pixel of margin
        let rows = rect.row_start.max(1)..rect.row_end.min(curr.height().saturating_sub(1));
        let cols = rect.col_start.max(1)..rect.col_end.min(curr.width().saturating_sub(1));

        for row in rows {
            for col in cols.clone() {
                let sample = |frame: &DepthFrame, r: usize, c: usize| frame.get(r, c).filter(|&d| d != 0).map(f64::from);
                let (Some(left), Some(right), Some(up), Some(down), Some(now), Some(before)) = (
                    sample(prev, row, col - 1),
                    sample(prev, row, col + 1),
                    sample(prev, row - 1, col),
                    sample(prev, row + 1, col),
                    sample(curr, row, col),
                    sample(prev, row, col),
                ) else {
                    continue;
                };

                let gradient = Vector2::new((right - left) / 2.0, (down - up) / 2.0);
                let temporal = now - before;
                tensor += gradient * gradient.transpose();
                mismatch += gradient * temporal;
            }
        }

        if tensor.determinant().abs() < self.min_determinant {
            return Err(Error::Tracking("Region has no usable depth gradient".to_string()));
        }
        let inverse = tensor
            .try_inverse()
            .ok_or_else(|| Error::Tracking("Structure tensor is singular".to_string()))?;
        let displacement = -(inverse * mismatch);

        Ok((displacement.x, displacement.y))
    }

    fn name(&self) -> &str {
        "LucasKanade"
    }
}
