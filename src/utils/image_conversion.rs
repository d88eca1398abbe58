//! Conversion between depth frames and 16-bit `image` buffers.

use super::safe_cast::{u32_to_usize, usize_to_u32};
use crate::{frame::DepthFrame, Error, Result};
use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::ArrayView2;

/// 16-bit single-channel image
pub type Depth16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Copy a (possibly non-contiguous) depth view into an image buffer
///
/// # Errors
///
/// Returns an error if the view dimensions exceed `u32`
pub fn view_to_luma16(view: &ArrayView2<'_, u16>) -> Result<Depth16Image> {
    let (rows, cols) = view.dim();
    let width = usize_to_u32(cols)?;
    let height = usize_to_u32(rows)?;
    let data: Vec<u16> = view.iter().copied().collect();

    ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| Error::InvalidInput(format!("Cannot build {width}x{height} image from depth view")))
}

/// Convert a whole depth frame into an image buffer
///
/// # Errors
///
/// Returns an error if the frame dimensions exceed `u32`
pub fn depth_frame_to_luma16(frame: &DepthFrame) -> Result<Depth16Image> {
    view_to_luma16(&frame.samples().view())
}

/// Build a depth frame from a 16-bit image
///
/// # Errors
///
/// Returns an error if the image dimensions do not fit in memory indices
pub fn luma16_to_depth_frame(image: Depth16Image) -> Result<DepthFrame> {
    let width = u32_to_usize(image.width())?;
    let height = u32_to_usize(image.height())?;
    DepthFrame::from_vec(width, height, image.into_raw())
}

/// Interpret a decoded image as millimeter depth
///
/// # Errors
///
/// Returns an error if the image is not single-channel 16-bit
pub fn dynamic_to_depth_frame(image: DynamicImage) -> Result<DepthFrame> {
    match image {
        DynamicImage::ImageLuma16(buffer) => luma16_to_depth_frame(buffer),
        other => Err(Error::InvalidInput(format!(
            "Depth image must be 16-bit grayscale, got {:?}",
            other.color()
        ))),
    }
}
