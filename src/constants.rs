//! Constants used throughout the pipeline

/// Focal length (pixels) of the depth sensor at 640x480
pub const DEFAULT_FOCAL_LENGTH: f64 = 575.815_734_863_281_2;

/// Principal point column (pixels)
pub const DEFAULT_PRINCIPAL_X: f64 = 314.5;

/// Principal point row (pixels)
pub const DEFAULT_PRINCIPAL_Y: f64 = 235.5;

/// Millimeters to meters
pub const MILLIMETERS_TO_METERS: f64 = 0.001;

/// Optical frame the cloud and markers are expressed in
pub const RGB_OPTICAL_FRAME: &str = "/camera_rgb_optical_frame";

/// Size of the marker slot pool. Slot ids run from 1 to this value.
pub const MARKER_SLOT_COUNT: usize = 24;

/// Off-screen position used to retire unused marker slots
pub const RETIRED_POSITION: [f64; 3] = [-10.0, -10.0, -10.0];

/// Direction published with a retired slot
pub const RETIRED_DIRECTION: [f64; 3] = [1.0, 1.0, 1.0];

/// Arrow shaft/head scale for published markers
pub const DEFAULT_ARROW_SCALE: f64 = 0.1;

/// Namespace markers are published under
pub const DEFAULT_MARKER_NAMESPACE: &str = "gaze";

/// Default window sizes
pub const DEFAULT_HORIZONTAL_PAD: i32 = 10;
pub const DEFAULT_VERTICAL_PAD: i32 = 40;

/// Number of accepted frames averaged by the CPS meter
pub const DEFAULT_CPS_WINDOW: usize = 20;

/// Default cluster count for a cold-start segmentation call
pub const DEFAULT_CLUSTER_COUNT: usize = 3;

/// Pixel stride passed to the segmentation collaborator
pub const DEFAULT_SEGMENTATION_STRIDE: usize = 1;

/// Side of the square resampled depth patch written to the feature log
pub const FEATURE_PATCH_SIDE: u32 = 20;

/// Minimum number of points needed to fit an orientation
pub const MIN_ORIENTATION_POINTS: usize = 3;

/// Relative tolerance used to detect a degenerate covariance spectrum
pub const EIGEN_RELATIVE_TOLERANCE: f64 = 1e-9;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-12;
