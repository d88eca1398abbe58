//! Configuration management for the gaze estimation node

use crate::{
    constants::{
        DEFAULT_ARROW_SCALE, DEFAULT_CLUSTER_COUNT, DEFAULT_CPS_WINDOW, DEFAULT_FOCAL_LENGTH, DEFAULT_HORIZONTAL_PAD,
        DEFAULT_MARKER_NAMESPACE, DEFAULT_PRINCIPAL_X, DEFAULT_PRINCIPAL_Y, DEFAULT_SEGMENTATION_STRIDE,
        DEFAULT_VERTICAL_PAD, FEATURE_PATCH_SIDE, MARKER_SLOT_COUNT, RGB_OPTICAL_FRAME,
    },
    deprojection::Intrinsics,
    frame::Region,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Depth sensor intrinsics and output frame
    pub camera: CameraConfig,

    /// Segmentation collaborator parameters
    pub segmentation: SegmentationConfig,

    /// Sub-window padding
    pub windows: WindowConfig,

    /// Marker publication
    pub markers: MarkerConfig,

    /// CPS diagnostics
    pub diagnostics: DiagnosticsConfig,

    /// Feature-vector log
    pub features: FeatureConfig,

    /// Optical-flow wiring
    pub tracking: TrackingConfig,
}

/// Pinhole intrinsics of the depth sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Focal length in pixels
    pub focal_length: f64,

    /// Principal point column
    pub principal_x: f64,

    /// Principal point row
    pub principal_y: f64,

    /// Frame id stamped on the cloud and markers
    pub frame_id: String,
}

/// Region segmentation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Cluster count used on a cold-start call
    pub cluster_count: usize,

    /// Pixel stride passed to the segmenter
    pub stride: usize,

    /// Fixed region boxes `[x1, y1, x2, y2]` used by the built-in provider
    pub regions: Vec<[i32; 4]>,
}

/// Padding of the two sub-windows around a region box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Left and right padding of both windows
    pub horizontal_pad: i32,

    /// Padding above the box, both windows
    pub top_pad: i32,

    /// Padding below the box for the upper window
    pub upper_bottom_pad: i32,

    /// Padding below the box for the full window
    pub full_bottom_pad: i32,
}

/// Marker publication parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Marker namespace
    pub namespace: String,

    /// Arrow scale on all three axes
    pub arrow_scale: f64,

    /// Number of slots published each frame (must be 24)
    pub slot_count: usize,
}

/// Diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Number of accepted frames averaged into the CPS report
    pub cps_window: usize,
}

/// Feature-vector log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Output file; logging is disabled when unset
    pub path: Option<PathBuf>,

    /// Side of the square resampled patch
    pub patch_side: u32,
}

/// Optical-flow tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Shift regions by the tracked displacement before windowing
    pub enabled: bool,

    /// Displacements larger than this (pixels) are discarded
    pub max_displacement: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            focal_length: DEFAULT_FOCAL_LENGTH,
            principal_x: DEFAULT_PRINCIPAL_X,
            principal_y: DEFAULT_PRINCIPAL_Y,
            frame_id: RGB_OPTICAL_FRAME.to_string(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            cluster_count: DEFAULT_CLUSTER_COUNT,
            stride: DEFAULT_SEGMENTATION_STRIDE,
            regions: Vec::new(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            horizontal_pad: DEFAULT_HORIZONTAL_PAD,
            top_pad: DEFAULT_VERTICAL_PAD,
            upper_bottom_pad: 0,
            full_bottom_pad: DEFAULT_VERTICAL_PAD,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_MARKER_NAMESPACE.to_string(),
            arrow_scale: DEFAULT_ARROW_SCALE,
            slot_count: MARKER_SLOT_COUNT,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            cps_window: DEFAULT_CPS_WINDOW,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            path: None,
            patch_side: FEATURE_PATCH_SIDE,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_displacement: 30.0,
        }
    }
}

impl CameraConfig {
    /// Deprojection intrinsics for this camera
    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics::new(self.focal_length, self.principal_x, self.principal_y)
    }
}

impl SegmentationConfig {
    /// Configured fixed boxes as regions
    pub fn fixed_regions(&self) -> Vec<Region> {
        self.regions
            .iter()
            .map(|&[x1, y1, x2, y2]| Region::new(x1, y1, x2, y2).normalized())
            .collect()
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Camera
        if !self.camera.focal_length.is_finite() || self.camera.focal_length <= 0.0 {
            return Err(Error::ConfigError("Focal length must be positive".to_string()));
        }
        if !self.camera.principal_x.is_finite() || !self.camera.principal_y.is_finite() {
            return Err(Error::ConfigError("Principal point must be finite".to_string()));
        }

        // Segmentation
        if self.segmentation.cluster_count == 0 {
            return Err(Error::ConfigError("Cluster count must be greater than 0".to_string()));
        }
        if self.segmentation.stride == 0 {
            return Err(Error::ConfigError("Segmentation stride must be greater than 0".to_string()));
        }

        // Windows
        let pads = &self.windows;
        if pads.horizontal_pad < 0 || pads.top_pad < 0 || pads.upper_bottom_pad < 0 || pads.full_bottom_pad < 0 {
            return Err(Error::ConfigError("Window pads must be non-negative".to_string()));
        }

        // Markers
        if self.markers.slot_count != MARKER_SLOT_COUNT {
            return Err(Error::ConfigError(format!(
                "Marker slot count is fixed at {MARKER_SLOT_COUNT}, got {}",
                self.markers.slot_count
            )));
        }
        if !self.markers.arrow_scale.is_finite() || self.markers.arrow_scale <= 0.0 {
            return Err(Error::ConfigError("Arrow scale must be positive".to_string()));
        }

        // Diagnostics and features
        if self.diagnostics.cps_window == 0 {
            return Err(Error::ConfigError("CPS window must be greater than 0".to_string()));
        }
        if self.features.patch_side == 0 {
            return Err(Error::ConfigError("Feature patch side must be greater than 0".to_string()));
        }

        if self.tracking.max_displacement < 0.0 {
            return Err(Error::ConfigError("Maximum displacement must be non-negative".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Gaze Estimation Configuration

# Depth sensor intrinsics
camera:
  focal_length: 575.8157348632812
  principal_x: 314.5
  principal_y: 235.5
  frame_id: "/camera_rgb_optical_frame"

# Region segmentation
segmentation:
  cluster_count: 3
  stride: 1
  regions:
    - [148, 140, 216, 224]
    - [276, 150, 350, 234]
    - [424, 166, 500, 238]

# Sub-window padding (pixels)
windows:
  horizontal_pad: 10
  top_pad: 40
  upper_bottom_pad: 0
  full_bottom_pad: 40

# Marker publication
markers:
  namespace: "gaze"
  arrow_scale: 0.1
  slot_count: 24

# Diagnostics
diagnostics:
  cps_window: 20

# Feature-vector log
features:
  path: "features.dat"
  patch_side: 20

# Optical-flow tracking
tracking:
  enabled: false
  max_displacement: 30.0
"#;
