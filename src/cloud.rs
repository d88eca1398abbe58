//! Per-frame point cloud aggregation and xyz32 packing.

use crate::deprojection::PointSet;
use nalgebra::Point3;
use std::time::SystemTime;

/// Bytes per packed point (three little-endian `f32`)
pub const POINT_STEP: usize = 12;

/// One named float32 field of the packed layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointField {
    pub name: &'static str,
    pub offset: usize,
}

/// Field layout of every published cloud
pub const XYZ32_FIELDS: [PointField; 3] = [
    PointField { name: "x", offset: 0 },
    PointField { name: "y", offset: 4 },
    PointField { name: "z", offset: 8 },
];

/// Unorganised cloud of every point deprojected in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub frame_id: String,
    pub stamp: SystemTime,
    points: Vec<Point3<f32>>,
}

impl PointCloud {
    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points; the cloud is a single row
    pub fn width(&self) -> usize {
        self.points.len()
    }

    pub fn height(&self) -> usize {
        1
    }

    pub fn row_step(&self) -> usize {
        POINT_STEP * self.width()
    }

    /// Packed little-endian x,y,z float32 buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.row_step());
        for point in &self.points {
            for value in point.coords.iter() {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }
        buffer
    }
}

/// Collects window point sets, in processing order, into one cloud
#[derive(Debug, Clone)]
pub struct CloudAggregator {
    frame_id: String,
    points: Vec<Point3<f32>>,
}

impl CloudAggregator {
    #[must_use]
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            points: Vec::new(),
        }
    }

    /// Append every point of `set`
    pub fn extend(&mut self, set: &PointSet) {
        self.points.reserve(set.len());
        self.points.extend(set.points().iter().map(|p| p.cast::<f32>()));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Package the collected points stamped with `stamp`
    pub fn finish(self, stamp: SystemTime) -> PointCloud {
        PointCloud {
            frame_id: self.frame_id,
            stamp,
            points: self.points,
        }
    }
}
