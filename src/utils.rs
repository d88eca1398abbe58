//! Utility functions for image conversion and safe numeric casts.

pub mod image_conversion;
pub mod safe_cast;
