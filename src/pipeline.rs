//! Per-frame processing: gate, segment, window, deproject, estimate, assign.

use crate::{
    cloud::{CloudAggregator, PointCloud},
    config::Config,
    cps::CpsMeter,
    deprojection::Intrinsics,
    features::FeatureLog,
    frame::{DepthFrame, Region, WindowKind},
    frame_gate::FrameGate,
    markers::{MarkerFrame, MarkerLifecycle},
    orientation::{Degenerate, OrientationEstimate, OrientationEstimator},
    segmentation::{RegionProvider, SeedSet},
    tracking::MotionTracker,
    utils::safe_cast::round_to_pixel,
    Error, Result,
};
use log::{debug, warn};
use std::io::Write;
use std::time::{Instant, SystemTime};

/// Feature log writing to any sendable sink
pub type DynFeatureLog = FeatureLog<Box<dyn Write + Send>>;

/// State carried from one frame to the next. Created once per run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Rejects repeated depth frames
    pub gate: FrameGate,
    /// Centroids returned by the last segmentation call
    pub seeds: Option<SeedSet>,
    /// Processing-rate diagnostics
    pub cps: CpsMeter,
    /// Last processed depth frame, kept only when tracking is enabled
    pub previous_depth: Option<DepthFrame>,
    /// Accepted frames so far
    pub frames_processed: u64,
}

impl PipelineState {
    pub fn new(config: &Config) -> Self {
        Self {
            gate: FrameGate::new(),
            seeds: None,
            cps: CpsMeter::new(config.diagnostics.cps_window),
            previous_depth: None,
            frames_processed: 0,
        }
    }
}

/// Outcome of one sub-window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    /// 1-based region index within the frame
    pub region_index: usize,
    pub window: WindowKind,
    /// Valid points deprojected from the window
    pub point_count: usize,
    pub outcome: std::result::Result<OrientationEstimate, Degenerate>,
}

/// Everything published for one accepted frame
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// Regions in processing order, after any tracking shift
    pub regions: Vec<Region>,
    pub windows: Vec<WindowResult>,
    pub markers: MarkerFrame,
    pub cloud: PointCloud,
    pub cps: u32,
}

impl FrameOutput {
    /// Successful estimates in region-then-window order
    pub fn estimates(&self) -> impl Iterator<Item = &OrientationEstimate> + '_ {
        self.windows.iter().filter_map(|w| w.outcome.as_ref().ok())
    }
}

/// The orientation pipeline and its collaborators
pub struct GazePipeline {
    config: Config,
    intrinsics: Intrinsics,
    estimator: OrientationEstimator,
    markers: MarkerLifecycle,
    provider: Box<dyn RegionProvider>,
    tracker: Option<Box<dyn MotionTracker>>,
    features: Option<DynFeatureLog>,
}

impl GazePipeline {
    /// Build a pipeline around a segmentation collaborator
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(config: Config, provider: Box<dyn RegionProvider>) -> Result<Self> {
        config.validate()?;
        log::info!("Initializing gaze pipeline with {} provider", provider.name());

        Ok(Self {
            intrinsics: config.camera.intrinsics(),
            estimator: OrientationEstimator::default(),
            markers: MarkerLifecycle::new(&config.markers, &config.camera),
            config,
            provider,
            tracker: None,
            features: None,
        })
    }

    /// Attach the optical-flow collaborator. It only runs when
    /// `tracking.enabled` is set.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Box<dyn MotionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Attach a feature-vector log
    #[must_use]
    pub fn with_feature_log(mut self, log: DynFeatureLog) -> Self {
        self.features = Some(log);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flush the feature log, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the log writer fails
    pub fn flush_features(&mut self) -> Result<()> {
        match self.features.as_mut() {
            Some(features) => features.flush(),
            None => Ok(()),
        }
    }

    /// Process one depth frame. Returns `None` when the frame gate rejects
    /// a repeat of the previous frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the segmentation collaborator fails. The frame is
    /// then not recorded by the gate, so the same bytes are processed again
    /// on the next call.
    pub fn process_frame(
        &mut self,
        state: &mut PipelineState,
        depth: &DepthFrame,
        stamp: SystemTime,
    ) -> Result<Option<FrameOutput>> {
        let start = Instant::now();

        if state.gate.is_repeat(depth) {
            debug!("Depth frame unchanged, skipping");
            return Ok(None);
        }

        // A frame the segmenter fails on stays eligible for the next tick
        let segmentation = self.provider.segment(
            depth,
            self.config.segmentation.cluster_count,
            state.seeds.as_ref(),
            self.config.segmentation.stride,
        )?;
        state.gate.commit(depth);

        let mut regions = segmentation.sorted_regions();
        if let Some(previous) = state.previous_depth.as_ref() {
            self.track_regions(&mut regions, depth, previous);
        }

        if let Some(features) = self.features.as_mut() {
            for (index, region) in (1..).zip(&regions) {
                if let Err(e) = features.record(index, depth, region) {
                    warn!("Failed to write feature vector for region {}: {}", index, e);
                }
            }
            if let Err(e) = features.flush() {
                warn!("Failed to flush feature log: {}", e);
            }
        }

        let mut aggregator = CloudAggregator::new(self.config.camera.frame_id.clone());
        let mut windows = Vec::with_capacity(regions.len() * WindowKind::ALL.len());

        for (region_index, region) in (1..).zip(&regions) {
            debug!(
                "Region {}: ({}, {}) - ({}, {})",
                region_index, region.x1, region.y1, region.x2, region.y2
            );
            for window in WindowKind::ALL {
                let rect = window.crop(region, &self.config.windows, depth.width(), depth.height());
                let points = self.intrinsics.deproject_window(depth, &rect);
                aggregator.extend(&points);

                let outcome = self.estimator.estimate(&points, window);
                if let Err(reason) = &outcome {
                    debug!("Region {} window {:?}: no orientation ({})", region_index, window, reason);
                }
                windows.push(WindowResult {
                    region_index,
                    window,
                    point_count: points.len(),
                    outcome,
                });
            }
        }

        let estimates: Vec<OrientationEstimate> = windows.iter().filter_map(|w| w.outcome.ok()).collect();
        let markers = self.markers.assign(&estimates);
        let cloud = aggregator.finish(stamp);

        state.seeds = Some(segmentation.centroids);
        if self.tracking_enabled() {
            state.previous_depth = Some(depth.clone());
        }
        state.frames_processed += 1;
        let cps = state.cps.record(start.elapsed());

        debug!(
            "Frame {}: {} regions, {} estimates, {} cloud points, CPS {}",
            state.frames_processed,
            regions.len(),
            estimates.len(),
            cloud.width(),
            cps
        );

        Ok(Some(FrameOutput {
            regions,
            windows,
            markers,
            cloud,
            cps,
        }))
    }

    fn tracking_enabled(&self) -> bool {
        self.config.tracking.enabled && self.tracker.is_some()
    }

    /// Shift each region by its tracked displacement; failures keep the box
    fn track_regions(&self, regions: &mut [Region], curr: &DepthFrame, prev: &DepthFrame) {
        let Some(tracker) = self.tracker.as_ref().filter(|_| self.config.tracking.enabled) else {
            return;
        };
        let limit = self.config.tracking.max_displacement;

        for region in regions.iter_mut() {
            let shift = tracker.track(curr, prev, region).and_then(|(dx, dy)| {
                if dx.hypot(dy) > limit {
                    return Err(Error::Tracking(format!(
                        "Displacement ({dx:.1}, {dy:.1}) exceeds {limit}"
                    )));
                }
                Ok((round_to_pixel(dx)?, round_to_pixel(dy)?))
            });
            match shift {
                Ok((dx, dy)) => {
                    debug!("{} moved region by ({}, {})", tracker.name(), dx, dy);
                    *region = region.translated(dx, dy);
                }
                Err(e) => debug!("Keeping region in place: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{FixedRegions, Segmentation};
    use crate::tracking::LucasKanade;
    use std::sync::{Arc, Mutex};

    /// Records the seeds passed on every call
    struct RecordingProvider {
        regions: Vec<Region>,
        calls: Arc<Mutex<Vec<Option<SeedSet>>>>,
    }

    impl RegionProvider for RecordingProvider {
        fn segment(
            &mut self,
            _depth: &DepthFrame,
            _cluster_count: usize,
            seeds: Option<&SeedSet>,
            _stride: usize,
        ) -> Result<Segmentation> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(seeds.cloned());
            let generation = calls.len() as f64;
            Ok(Segmentation {
                regions: self.regions.clone(),
                centroids: SeedSet::new(vec![nalgebra::Vector3::new(generation, 0.0, 0.0)]),
            })
        }

        fn name(&self) -> &str {
            "RecordingProvider"
        }
    }

    fn frame_with_patch(region: &Region, depth_mm: u16) -> DepthFrame {
        let mut frame = DepthFrame::filled(640, 480, 0);
        for row in (region.y1 - 40).max(0)..(region.y2 + 40) {
            for col in (region.x1 - 10).max(0)..(region.x2 + 10) {
                // Slanted surface so the covariance has a unique normal
                frame.samples_mut()[[row as usize, col as usize]] = depth_mm + col as u16;
            }
        }
        frame
    }

    #[test]
    fn test_seed_handshake() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let provider = RecordingProvider {
            regions: Vec::new(),
            calls: Arc::clone(&calls),
        };
        let config = Config::default();
        let mut state = PipelineState::new(&config);
        let mut pipeline = GazePipeline::new(config, Box::new(provider)).unwrap();

        pipeline
            .process_frame(&mut state, &DepthFrame::filled(8, 8, 1), SystemTime::now())
            .unwrap();
        pipeline
            .process_frame(&mut state, &DepthFrame::filled(8, 8, 2), SystemTime::now())
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], None);
        assert_eq!(calls[1].as_ref().map(|s| s.centroids()[0].x), Some(1.0));
        assert_eq!(state.seeds.as_ref().map(|s| s.centroids()[0].x), Some(2.0));
    }

    #[test]
    fn test_failed_segmentation_leaves_frame_eligible() {
        struct FailFirst {
            failed: bool,
        }

        impl RegionProvider for FailFirst {
            fn segment(&mut self, _: &DepthFrame, _: usize, _: Option<&SeedSet>, _: usize) -> Result<Segmentation> {
                if !self.failed {
                    self.failed = true;
                    return Err(Error::Segmentation("transient".to_string()));
                }
                Ok(Segmentation::default())
            }

            fn name(&self) -> &str {
                "FailFirst"
            }
        }

        let config = Config::default();
        let mut state = PipelineState::new(&config);
        let mut pipeline = GazePipeline::new(config, Box::new(FailFirst { failed: false })).unwrap();
        let frame = DepthFrame::filled(16, 16, 640);

        let first = pipeline.process_frame(&mut state, &frame, SystemTime::now());
        assert!(matches!(first, Err(Error::Segmentation(_))));
        assert_eq!(state.frames_processed, 0);
        assert!(state.seeds.is_none());

        assert!(pipeline.process_frame(&mut state, &frame, SystemTime::now()).unwrap().is_some());
        assert!(pipeline.process_frame(&mut state, &frame, SystemTime::now()).unwrap().is_none());
    }

    #[test]
    fn test_repeated_frame_produces_nothing() {
        let config = Config::default();
        let mut state = PipelineState::new(&config);
        let mut pipeline = GazePipeline::new(config, Box::new(FixedRegions::default())).unwrap();
        let frame = DepthFrame::filled(16, 16, 700);

        assert!(pipeline.process_frame(&mut state, &frame, SystemTime::now()).unwrap().is_some());
        assert!(pipeline.process_frame(&mut state, &frame, SystemTime::now()).unwrap().is_none());
        assert_eq!(state.frames_processed, 1);
        assert_eq!(state.cps.len(), 1);
    }

    #[test]
    fn test_windows_follow_region_order() {
        let left = Region::new(100, 100, 160, 160);
        let right = Region::new(400, 100, 460, 160);
        let mut frame = frame_with_patch(&left, 900);
        let other = frame_with_patch(&right, 1500);
        for ((row, col), &d) in other.samples().indexed_iter() {
            if d != 0 {
                frame.samples_mut()[[row, col]] = d;
            }
        }

        let config = Config::default();
        let mut state = PipelineState::new(&config);
        let provider = FixedRegions::new(vec![right, left]);
        let mut pipeline = GazePipeline::new(config, Box::new(provider)).unwrap();

        let output = pipeline.process_frame(&mut state, &frame, SystemTime::now()).unwrap().unwrap();
        assert_eq!(output.regions, vec![left, right]);
        assert_eq!(output.windows.len(), 4);
        assert_eq!(output.windows[0].window, WindowKind::Upper);
        assert_eq!(output.windows[1].window, WindowKind::Full);
        assert_eq!(output.windows[2].region_index, 2);

        // Left region is nearer, so its centroid has the smaller z
        let estimates: Vec<_> = output.estimates().collect();
        assert_eq!(estimates.len(), 4);
        assert!(estimates[0].centroid.z < estimates[2].centroid.z);
        assert_eq!(output.markers.active_count(), 4);
    }

    #[test]
    fn test_degenerate_window_leaves_slot_retired() {
        let region = Region::new(200, 200, 240, 240);
        // Constant depth over a single row: collinear points
        let mut frame = DepthFrame::filled(640, 480, 0);
        for col in 190..250 {
            frame.samples_mut()[[180, col]] = 1000;
        }

        let config = Config::default();
        let mut state = PipelineState::new(&config);
        let mut pipeline = GazePipeline::new(config, Box::new(FixedRegions::new(vec![region]))).unwrap();
        let output = pipeline.process_frame(&mut state, &frame, SystemTime::now()).unwrap().unwrap();

        assert_eq!(output.windows.len(), 2);
        assert!(output.windows.iter().all(|w| w.outcome.is_err()));
        assert_eq!(output.markers.active_count(), 0);
        assert_eq!(output.cloud.width(), 120);
    }

    #[test]
    fn test_tracking_shifts_regions_when_enabled() {
        let mut config = Config::default();
        config.tracking.enabled = true;
        let region = Region::new(100, 100, 140, 140);

        let bowl = |shift: f64| {
            let mut frame = DepthFrame::filled(320, 240, 0);
            for ((row, col), value) in frame.samples_mut().indexed_iter_mut() {
                let x = col as f64 - shift - 120.0;
                let y = row as f64 - 120.0;
                *value = (1000.0 + 0.5 * (x * x + y * y)) as u16;
            }
            frame
        };

        let mut state = PipelineState::new(&config);
        let mut pipeline = GazePipeline::new(config, Box::new(FixedRegions::new(vec![region])))
            .unwrap()
            .with_tracker(Box::new(LucasKanade::default()));

        let first = pipeline.process_frame(&mut state, &bowl(0.0), SystemTime::now()).unwrap().unwrap();
        assert_eq!(first.regions, vec![region]);
        assert!(state.previous_depth.is_some());

        let second = pipeline.process_frame(&mut state, &bowl(1.0), SystemTime::now()).unwrap().unwrap();
        assert_eq!(second.regions, vec![region.translated(1, 0)]);
    }

    #[test]
    fn test_feature_log_lines_per_region() {
        #[derive(Clone, Default)]
        struct SharedBuffer(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedBuffer {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = SharedBuffer::default();
        let config = Config::default();
        let mut state = PipelineState::new(&config);
        let provider = FixedRegions::new(vec![Region::new(50, 50, 90, 90), Region::new(10, 10, 30, 30)]);
        let mut pipeline = GazePipeline::new(config, Box::new(provider))
            .unwrap()
            .with_feature_log(FeatureLog::new(Box::new(buffer.clone()), 20));

        pipeline
            .process_frame(&mut state, &DepthFrame::filled(128, 128, 650), SystemTime::now())
            .unwrap();

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let indices: Vec<&str> = text.lines().map(|l| l.split('\t').next().unwrap_or("")).collect();
        assert_eq!(indices, vec!["1", "2"]);
    }
}
