//! Node shell: event handlers, publishing and the replay event source.

use crate::{
    cloud::PointCloud,
    config::Config,
    features::FeatureLog,
    frame::{DepthFrame, RgbFrame},
    markers::Marker,
    pipeline::{FrameOutput, GazePipeline, PipelineState},
    segmentation::RegionProvider,
    tracking::LucasKanade,
    utils::{image_conversion::dynamic_to_depth_frame, safe_cast::usize_to_u32},
    Error, Result,
};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Sink for the node's outputs
pub trait Publisher {
    /// Publish every marker slot for one frame
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the markers
    fn publish_markers(&mut self, markers: &[Marker]) -> Result<()>;

    /// Publish the aggregated cloud for one frame
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the cloud
    fn publish_cloud(&mut self, cloud: &PointCloud) -> Result<()>;
}

/// Publisher that only logs what would be sent
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish_markers(&mut self, markers: &[Marker]) -> Result<()> {
        let active = markers.iter().filter(|m| m.is_active()).count();
        debug!("Markers: {} active, {} retired", active, markers.len() - active);
        for marker in markers.iter().filter(|m| m.is_active()) {
            let d = marker.direction();
            debug!(
                "  #{} at ({:.3}, {:.3}, {:.3}) dir ({:.3}, {:.3}, {:.3})",
                marker.id, marker.start.x, marker.start.y, marker.start.z, d.x, d.y, d.z
            );
        }
        Ok(())
    }

    fn publish_cloud(&mut self, cloud: &PointCloud) -> Result<()> {
        info!("Cloud: {} points in {}", cloud.width(), cloud.frame_id);
        Ok(())
    }
}

/// Publisher that keeps what it was sent
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    /// Marker slots from the most recent publication
    pub markers: Vec<Marker>,
    /// Most recent cloud
    pub cloud: Option<PointCloud>,
    /// Number of marker publications (one per slot)
    pub marker_messages: usize,
    /// Number of cloud publications
    pub cloud_messages: usize,
}

impl Publisher for RecordingPublisher {
    fn publish_markers(&mut self, markers: &[Marker]) -> Result<()> {
        self.markers = markers.to_vec();
        self.marker_messages += markers.len();
        Ok(())
    }

    fn publish_cloud(&mut self, cloud: &PointCloud) -> Result<()> {
        self.cloud = Some(cloud.clone());
        self.cloud_messages += 1;
        Ok(())
    }
}

/// Counters for one node run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub depth_frames: usize,
    pub rgb_frames: usize,
    /// RGB ticks that produced a publication
    pub published: usize,
    /// RGB ticks skipped (no depth yet, or repeated depth)
    pub skipped: usize,
    /// RGB ticks dropped because a collaborator failed on the frame
    pub failed: usize,
}

/// The gaze node. Depth arrivals replace the stored frame; RGB arrivals
/// run the pipeline on it and publish.
pub struct GazeNode<P: Publisher> {
    pipeline: GazePipeline,
    state: PipelineState,
    publisher: P,
    latest_depth: Option<DepthFrame>,
    last_cps: u32,
}

impl<P: Publisher> GazeNode<P> {
    /// Build a node. Attaches the feature log and tracker the configuration
    /// asks for.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the feature log
    /// cannot be created
    pub fn new(config: Config, provider: Box<dyn RegionProvider>, publisher: P) -> Result<Self> {
        let state = PipelineState::new(&config);
        let feature_path = config.features.path.clone();
        let patch_side = config.features.patch_side;
        let tracking = config.tracking.enabled;

        let mut pipeline = GazePipeline::new(config, provider)?;
        if let Some(path) = feature_path {
            pipeline = pipeline.with_feature_log(FeatureLog::create(&path, patch_side)?.boxed());
        }
        if tracking {
            info!("Optical-flow tracking enabled");
            pipeline = pipeline.with_tracker(Box::new(LucasKanade::default()));
        }

        Ok(Self {
            pipeline,
            state,
            publisher,
            latest_depth: None,
            last_cps: 0,
        })
    }

    /// Store the newest depth frame
    pub fn on_depth(&mut self, frame: DepthFrame) {
        self.latest_depth = Some(frame);
    }

    /// Run the pipeline on the stored depth frame and publish the result.
    /// Returns the frame output, or `None` if nothing was published.
    ///
    /// # Errors
    ///
    /// Returns an error if segmentation or publishing fails
    pub fn on_rgb(&mut self, rgb: &RgbFrame) -> Result<Option<FrameOutput>> {
        let Some(depth) = self.latest_depth.as_ref() else {
            debug!("RGB frame {}x{} before any depth frame, skipping", rgb.width, rgb.height);
            return Ok(None);
        };

        let Some(output) = self.pipeline.process_frame(&mut self.state, depth, SystemTime::now())? else {
            return Ok(None);
        };

        self.publisher.publish_markers(output.markers.markers())?;
        self.publisher.publish_cloud(&output.cloud)?;

        if output.cps != self.last_cps {
            info!("CPS: {}", output.cps);
            self.last_cps = output.cps;
        }
        Ok(Some(output))
    }

    /// Drain a replay source through the handlers. A collaborator failure
    /// drops that tick only; the next tick retries the stored frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame fails to load or publishing fails
    pub fn run(&mut self, source: &ReplaySource, max_frames: Option<usize>) -> Result<RunStats> {
        info!("Starting replay of {} frames from {}", source.len(), source.directory().display());

        let mut stats = RunStats::default();
        for event in source.events() {
            match event? {
                ReplayEvent::Depth(frame) => {
                    stats.depth_frames += 1;
                    self.on_depth(frame);
                }
                ReplayEvent::Rgb(rgb) => {
                    stats.rgb_frames += 1;
                    match self.on_rgb(&rgb) {
                        Ok(Some(_)) => stats.published += 1,
                        Ok(None) => stats.skipped += 1,
                        Err(e @ (Error::Segmentation(_) | Error::Tracking(_))) => {
                            warn!("Dropping frame: {}", e);
                            stats.failed += 1;
                        }
                        Err(e) => return Err(e),
                    }
                    if max_frames.is_some_and(|max| stats.published >= max) {
                        info!("Reached frame limit of {}", stats.published);
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.pipeline.flush_features() {
            warn!("Failed to flush feature log: {}", e);
        }
        info!(
            "Replay finished: {} published, {} skipped, {} failed",
            stats.published, stats.skipped, stats.failed
        );
        Ok(stats)
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }
}

/// One replayed stream message
#[derive(Debug, Clone)]
pub enum ReplayEvent {
    Depth(DepthFrame),
    Rgb(RgbFrame),
}

#[derive(Debug, Clone, Default)]
struct ReplayEntry {
    depth: Option<PathBuf>,
    rgb: Option<PathBuf>,
}

/// Recorded frames in a directory: `depth_NNNN.png` (16-bit grayscale,
/// millimeters) and optional `rgb_NNNN.png`, replayed in index order
#[derive(Debug, Clone)]
pub struct ReplaySource {
    directory: PathBuf,
    entries: BTreeMap<u32, ReplayEntry>,
}

impl ReplaySource {
    /// Scan `directory` for frame files
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or holds no depth
    /// frames
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let mut entries: BTreeMap<u32, ReplayEntry> = BTreeMap::new();

        for item in std::fs::read_dir(&directory)? {
            let path = item?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match parse_frame_name(name) {
                Some((FrameFile::Depth, index)) => entries.entry(index).or_default().depth = Some(path),
                Some((FrameFile::Rgb, index)) => entries.entry(index).or_default().rgb = Some(path),
                None => debug!("Ignoring {}", name),
            }
        }

        let source = Self { directory, entries };
        if source.depth_count() == 0 {
            return Err(Error::InvalidInput(format!(
                "No depth_NNNN.png frames in {}",
                source.directory.display()
            )));
        }
        info!(
            "Found {} depth frames in {}",
            source.depth_count(),
            source.directory.display()
        );
        Ok(source)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of frame indices
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth_count(&self) -> usize {
        self.entries.values().filter(|e| e.depth.is_some()).count()
    }

    /// Events in index order. Each index yields its depth frame (if any)
    /// then an RGB tick; a missing RGB file becomes a tick sized like the
    /// depth frame.
    pub fn events(&self) -> ReplayEvents<'_> {
        ReplayEvents {
            entries: self.entries.values(),
            pending: None,
        }
    }
}

/// Iterator over replay events, loading files lazily
pub struct ReplayEvents<'a> {
    entries: std::collections::btree_map::Values<'a, u32, ReplayEntry>,
    pending: Option<RgbFrame>,
}

impl Iterator for ReplayEvents<'_> {
    type Item = Result<ReplayEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(rgb) = self.pending.take() {
            return Some(Ok(ReplayEvent::Rgb(rgb)));
        }
        let entry = self.entries.next()?;
        Some(load_entry(entry).map(|(depth, rgb)| match depth {
            Some(depth) => {
                self.pending = Some(rgb);
                ReplayEvent::Depth(depth)
            }
            None => ReplayEvent::Rgb(rgb),
        }))
    }
}

fn load_entry(entry: &ReplayEntry) -> Result<(Option<DepthFrame>, RgbFrame)> {
    let depth = entry
        .depth
        .as_ref()
        .map(|path| dynamic_to_depth_frame(image::open(path)?))
        .transpose()?;

    let (width, height) = match (&entry.rgb, &depth) {
        (Some(path), _) => image::image_dimensions(path)?,
        (None, Some(depth)) => (
            usize_to_u32(depth.width())?,
            usize_to_u32(depth.height())?,
        ),
        (None, None) => (0, 0),
    };

    Ok((depth, RgbFrame::new(width, height)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameFile {
    Depth,
    Rgb,
}

fn parse_frame_name(name: &str) -> Option<(FrameFile, u32)> {
    let stem = name.strip_suffix(".png")?;
    let (kind, index) = if let Some(index) = stem.strip_prefix("depth_") {
        (FrameFile::Depth, index)
    } else {
        (FrameFile::Rgb, stem.strip_prefix("rgb_")?)
    };
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    index.parse().ok().map(|i| (kind, i))
}
