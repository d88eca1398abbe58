//! Depth-based gaze estimation core.
//!
//! Each accepted depth frame is segmented into candidate face regions. Every
//! region is cut into an upper and a full sub-window, the windows' depth
//! pixels are deprojected into camera space, and the least-variance axis of
//! each window's point covariance gives a surface orientation. The results
//! are published as a fixed pool of 24 arrow markers plus one aggregated
//! point cloud per frame.
//!
//! The processing stages are:
//! 1. Frame gating to skip repeated depth frames
//! 2. Region segmentation through a [`segmentation::RegionProvider`]
//! 3. Sub-window cropping and deprojection
//! 4. Orientation estimation from the point covariance
//! 5. Marker slot assignment and cloud aggregation
//!
//! # Examples
//!
//! ```no_run
//! use gaze_estimation::{
//!     config::Config,
//!     frame::{DepthFrame, Region},
//!     pipeline::{GazePipeline, PipelineState},
//!     segmentation::FixedRegions,
//! };
//! use std::time::SystemTime;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut state = PipelineState::new(&config);
//! let provider = FixedRegions::new(vec![Region::new(280, 200, 360, 280)]);
//! let mut pipeline = GazePipeline::new(config, Box::new(provider))?;
//!
//! let depth = DepthFrame::filled(640, 480, 900);
//! if let Some(output) = pipeline.process_frame(&mut state, &depth, SystemTime::now())? {
//!     for estimate in output.estimates() {
//!         println!("{:?} -> {:?}", estimate.centroid, estimate.direction);
//!     }
//!     println!("{} cloud points, CPS {}", output.cloud.width(), output.cps);
//! }
//! # Ok(())
//! # }
//! ```

/// Node shell, publishers and replay source
pub mod app;

/// Per-frame point cloud aggregation
pub mod cloud;

/// Configuration file support
pub mod config;

/// Sensor, window and marker constants
pub mod constants;

/// Processing-rate meter
pub mod cps;

/// Pixel-to-camera-space deprojection
pub mod deprojection;

/// Error types
pub mod error;

/// Feature-vector logging
pub mod features;

/// Depth frames, regions and sub-windows
pub mod frame;

/// Repeated-frame rejection
pub mod frame_gate;

/// Fixed-size marker slot pool
pub mod markers;

/// Surface orientation from point covariance
pub mod orientation;

/// Per-frame pipeline
pub mod pipeline;

/// Region segmentation contract
pub mod segmentation;

/// Optical-flow region tracking
pub mod tracking;

/// Utility functions for conversions
pub mod utils;

// Re-export commonly used types
pub use error::{Error, Result};
