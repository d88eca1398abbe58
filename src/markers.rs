//! Bounded marker-slot lifecycle.
//!
//! Every frame republishes the whole pool: slots `1..=k` carry this frame's
//! `k` estimates in region-then-window order and the remaining slots are
//! parked at an off-screen sentinel. The marker transport has no delete
//! primitive, so moving a slot off-screen is how an arrow disappears.

use crate::{
    config::{CameraConfig, MarkerConfig},
    constants::{MARKER_SLOT_COUNT, RETIRED_DIRECTION, RETIRED_POSITION},
    orientation::OrientationEstimate,
};
use log::{debug, warn};
use nalgebra::{Point3, Vector3};

/// RGBA colour with channels in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const RED: Rgba = Rgba::opaque(1.0, 0.0, 0.0);
    pub const GREEN: Rgba = Rgba::opaque(0.0, 1.0, 0.0);
    pub const WHITE: Rgba = Rgba::opaque(1.0, 1.0, 1.0);

    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

/// What a slot shows this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Carries an estimate from the window with this tag
    Active { tag: u8 },
    /// Parked at the sentinel position
    Retired,
}

/// An arrow marker for one slot
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Slot id in `1..=24`
    pub id: u32,
    pub namespace: String,
    pub frame_id: String,
    /// Arrow tail
    pub start: Point3<f64>,
    /// Arrow tip
    pub end: Point3<f64>,
    pub scale: Vector3<f64>,
    pub color: Rgba,
    pub state: SlotState,
}

impl Marker {
    pub fn is_active(&self) -> bool {
        matches!(self.state, SlotState::Active { .. })
    }

    /// Tip minus tail
    pub fn direction(&self) -> Vector3<f64> {
        self.end - self.start
    }
}

/// Full slot occupancy for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerFrame {
    markers: Vec<Marker>,
    dropped: usize,
}

impl MarkerFrame {
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn active_count(&self) -> usize {
        self.markers.iter().filter(|m| m.is_active()).count()
    }

    pub fn retired_count(&self) -> usize {
        self.markers.len() - self.active_count()
    }

    /// Estimates that did not fit into the pool
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Maps per-frame estimates onto the fixed slot pool
#[derive(Debug, Clone)]
pub struct MarkerLifecycle {
    namespace: String,
    frame_id: String,
    scale: Vector3<f64>,
}

impl MarkerLifecycle {
    #[must_use]
    pub fn new(markers: &MarkerConfig, camera: &CameraConfig) -> Self {
        Self {
            namespace: markers.namespace.clone(),
            frame_id: camera.frame_id.clone(),
            scale: Vector3::repeat(markers.arrow_scale),
        }
    }

    pub const fn capacity(&self) -> usize {
        MARKER_SLOT_COUNT
    }

    /// Assign `estimates` (already in region-then-window order) to slots
    /// `1..=k` and retire the rest. Always yields exactly 24 markers.
    pub fn assign(&self, estimates: &[OrientationEstimate]) -> MarkerFrame {
        let dropped = estimates.len().saturating_sub(MARKER_SLOT_COUNT);
        if dropped > 0 {
            warn!(
                "{} estimates exceed the {} marker slots; dropping {}",
                estimates.len(),
                MARKER_SLOT_COUNT,
                dropped
            );
        }

        let mut markers = Vec::with_capacity(MARKER_SLOT_COUNT);
        for (id, estimate) in (1u32..).zip(estimates.iter().take(MARKER_SLOT_COUNT)) {
            debug!(
                "Slot {}: tag {} centroid ({:.3}, {:.3}, {:.3}) direction ({:.3}, {:.3}, {:.3})",
                id,
                estimate.tag(),
                estimate.centroid.x,
                estimate.centroid.y,
                estimate.centroid.z,
                estimate.direction.x,
                estimate.direction.y,
                estimate.direction.z
            );
            markers.push(self.active(id, estimate));
        }

        for id in (markers.len() + 1)..=MARKER_SLOT_COUNT {
            markers.push(self.retired(id as u32));
        }

        MarkerFrame { markers, dropped }
    }

    fn active(&self, id: u32, estimate: &OrientationEstimate) -> Marker {
        Marker {
            id,
            namespace: self.namespace.clone(),
            frame_id: self.frame_id.clone(),
            start: estimate.centroid,
            end: estimate.endpoint(),
            scale: self.scale,
            color: estimate.window.color(),
            state: SlotState::Active { tag: estimate.tag() },
        }
    }

    fn retired(&self, id: u32) -> Marker {
        let start = Point3::from(RETIRED_POSITION);
        Marker {
            id,
            namespace: self.namespace.clone(),
            frame_id: self.frame_id.clone(),
            start,
            end: start + Vector3::from(RETIRED_DIRECTION),
            scale: self.scale,
            color: Rgba::WHITE,
            state: SlotState::Retired,
        }
    }
}
