//! Depth deprojection from pixel samples to camera-space points.

use crate::{
    constants::MILLIMETERS_TO_METERS,
    frame::{DepthFrame, PixelRect},
    Error, Result,
};
use nalgebra::Point3;

/// A camera-space point in meters
pub type PointSample = Point3<f64>;

/// Points deprojected from one sub-window. May be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<PointSample>,
}

impl PointSet {
    #[must_use]
    pub fn new(points: Vec<PointSample>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PointSample] {
        &self.points
    }

    pub fn into_points(self) -> Vec<PointSample> {
        self.points
    }
}

impl From<Vec<PointSample>> for PointSet {
    fn from(points: Vec<PointSample>) -> Self {
        Self::new(points)
    }
}

/// Fixed pinhole intrinsics of the depth sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// `0.001 / f`: converts millimeter depth times pixel offset to meters
    scale: f64,
    cx: f64,
    cy: f64,
}

impl Intrinsics {
    #[must_use]
    pub fn new(focal_length: f64, cx: f64, cy: f64) -> Self {
        Self {
            scale: MILLIMETERS_TO_METERS / focal_length,
            cx,
            cy,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Project a single sample. The caller is responsible for filtering
    /// invalid depths.
    pub fn project(&self, row: f64, col: f64, depth: f64) -> PointSample {
        Point3::new(
            depth * self.scale * (col - self.cx),
            depth * self.scale * (row - self.cy),
            depth * MILLIMETERS_TO_METERS,
        )
    }

    /// Deproject parallel arrays of rows, columns and millimeter depths.
    /// Samples whose depth is zero or non-finite are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the three arrays differ in length
    pub fn deproject(&self, rows: &[f64], cols: &[f64], depths: &[f64]) -> Result<PointSet> {
        if rows.len() != cols.len() || rows.len() != depths.len() {
            return Err(Error::InvalidInput(format!(
                "Deprojection arrays differ in length: {} rows, {} cols, {} depths",
                rows.len(),
                cols.len(),
                depths.len()
            )));
        }

        let points = rows
            .iter()
            .zip(cols)
            .zip(depths)
            .filter(|&(_, &depth)| depth.is_finite() && depth != 0.0)
            .map(|((&row, &col), &depth)| self.project(row, col, depth))
            .collect();

        Ok(PointSet::new(points))
    }

    /// Deproject every pixel of `rect` at unit stride, skipping zero depths
    pub fn deproject_window(&self, frame: &DepthFrame, rect: &PixelRect) -> PointSet {
        frame
            .view(rect)
            .indexed_iter()
            .filter(|&(_, &depth)| depth != 0)
            .map(|((row, col), &depth)| {
                self.project(
                    (rect.row_start + row) as f64,
                    (rect.col_start + col) as f64,
                    f64::from(depth),
                )
            })
            .collect::<Vec<_>>()
            .into()
    }
}
