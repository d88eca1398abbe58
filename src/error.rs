//! Error types for the gaze estimation library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Array construction failed because of a shape mismatch
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The region segmentation collaborator failed
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// The optical-flow collaborator failed
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// An output sink rejected a message
    #[error("Publish error: {0}")]
    Publish(String),
}

/// Application-specific error type (alias for main Error type)
pub type AppError = Error;

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
