//! Frame and region types shared by every pipeline stage.

use crate::{config::WindowConfig, markers::Rgba, Error, Result};
use ndarray::{Array2, ArrayView2};
use std::time::SystemTime;

/// A depth image of 16-bit samples in millimeters. `0` means "no return".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFrame {
    samples: Array2<u16>,
}

impl DepthFrame {
    /// Wrap a `(height, width)` grid of samples
    #[must_use]
    pub fn new(samples: Array2<u16>) -> Self {
        Self { samples }
    }

    /// Build a frame from row-major samples
    ///
    /// # Errors
    ///
    /// Returns an error if `data.len() != width * height`
    pub fn from_vec(width: usize, height: usize, data: Vec<u16>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidInput(format!(
                "Depth buffer holds {} samples, expected {width}x{height}",
                data.len()
            )));
        }
        Ok(Self::new(Array2::from_shape_vec((height, width), data)?))
    }

    /// Frame filled with a single depth value
    #[must_use]
    pub fn filled(width: usize, height: usize, depth_mm: u16) -> Self {
        Self::new(Array2::from_elem((height, width), depth_mm))
    }

    pub fn width(&self) -> usize {
        self.samples.ncols()
    }

    pub fn height(&self) -> usize {
        self.samples.nrows()
    }

    /// Sample at `(row, col)`, if inside the frame
    pub fn get(&self, row: usize, col: usize) -> Option<u16> {
        self.samples.get((row, col)).copied()
    }

    /// Mutable access for building synthetic frames
    pub fn samples_mut(&mut self) -> &mut Array2<u16> {
        &mut self.samples
    }

    pub fn samples(&self) -> &Array2<u16> {
        &self.samples
    }

    /// View of the pixels covered by `rect`
    pub fn view(&self, rect: &PixelRect) -> ArrayView2<'_, u16> {
        self.samples
            .slice(ndarray::s![rect.row_start..rect.row_end, rect.col_start..rect.col_end])
    }
}

/// Metadata of an RGB frame. Only its size, encoding and arrival time are
/// used by the core; the pixels are never fused into the estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub stamp: SystemTime,
}

impl RgbFrame {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            encoding: "bgr8".to_string(),
            stamp: SystemTime::now(),
        }
    }
}

/// Axis-aligned region box in pixel space. Ordering is lexicographic on
/// `(x1, y1, x2, y2)`, which is the order regions are consumed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Same box with swapped corners put back in order
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    /// Box shifted by a pixel displacement
    #[must_use]
    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self {
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
            x2: self.x2.saturating_add(dx),
            y2: self.y2.saturating_add(dy),
        }
    }

    /// Clamp the box expanded by the given pads to a `width` x `height` frame
    pub fn padded_rect(&self, left_right: i32, top: i32, bottom: i32, width: usize, height: usize) -> PixelRect {
        let clamp = |value: i32, max: usize| -> usize {
            usize::try_from(value.max(0)).map_or(0, |v| v.min(max))
        };
        let row_start = clamp(self.y1.saturating_sub(top), height);
        let row_end = clamp(self.y2.saturating_add(bottom), height).max(row_start);
        let col_start = clamp(self.x1.saturating_sub(left_right), width);
        let col_end = clamp(self.x2.saturating_add(left_right), width).max(col_start);
        PixelRect {
            row_start,
            row_end,
            col_start,
            col_end,
        }
    }

    /// The unpadded box clamped to the frame
    pub fn rect(&self, width: usize, height: usize) -> PixelRect {
        self.padded_rect(0, 0, 0, width, height)
    }
}

/// Half-open pixel rectangle, already clamped to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl PixelRect {
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0 || self.cols() == 0
    }
}

/// The two padded crops taken from every region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// Padded above the box only; unaffected by lower-face occlusion
    Upper,
    /// Padded above and below the box
    Full,
}

impl WindowKind {
    /// Processing order within a region
    pub const ALL: [WindowKind; 2] = [WindowKind::Upper, WindowKind::Full];

    /// Numeric tag carried by estimates
    pub fn tag(self) -> u8 {
        match self {
            WindowKind::Upper => 1,
            WindowKind::Full => 2,
        }
    }

    /// Arrow colour for estimates of this window
    pub fn color(self) -> Rgba {
        match self {
            WindowKind::Upper => Rgba::RED,
            WindowKind::Full => Rgba::GREEN,
        }
    }

    /// Crop rectangle of this window for `region` inside a frame
    pub fn crop(self, region: &Region, pads: &WindowConfig, width: usize, height: usize) -> PixelRect {
        let bottom = match self {
            WindowKind::Upper => pads.upper_bottom_pad,
            WindowKind::Full => pads.full_bottom_pad,
        };
        region.padded_rect(pads.horizontal_pad, pads.top_pad, bottom, width, height)
    }
}
