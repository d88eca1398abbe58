//! Seed handshake with the region segmentation collaborator.
//!
//! The segmenter itself is opaque to the pipeline. It is called cold (no
//! seeds, configured cluster count) on the first frame and warm afterwards
//! with the centroids it returned last time, which it may use to keep its
//! clusters spatially continuous.

use crate::{
    frame::{DepthFrame, Region},
    Error, Result,
};
use log::debug;
use nalgebra::Vector3;

/// Centroid of one cluster in the segmenter's `(x, y, depth)` space
pub type Seed = Vector3<f64>;

/// Centroids round-tripped from one frame's segmentation into the next call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedSet {
    centroids: Vec<Seed>,
}

impl SeedSet {
    #[must_use]
    pub fn new(centroids: Vec<Seed>) -> Self {
        Self { centroids }
    }

    pub fn centroids(&self) -> &[Seed] {
        &self.centroids
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}

/// Output of one segmentation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub regions: Vec<Region>,
    pub centroids: SeedSet,
}

impl Segmentation {
    /// Regions in ascending lexicographic order of their box coordinates.
    /// This order, not any tracked identity, fixes marker-slot order.
    pub fn sorted_regions(&self) -> Vec<Region> {
        let mut regions = self.regions.clone();
        regions.sort();
        regions
    }
}

/// Contract with the region segmentation collaborator
pub trait RegionProvider: Send {
    /// Segment `depth` into candidate regions.
    ///
    /// `seeds` is `None` on a cold start and the previous frame's centroids
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the collaborator fails on this frame
    fn segment(
        &mut self,
        depth: &DepthFrame,
        cluster_count: usize,
        seeds: Option<&SeedSet>,
        stride: usize,
    ) -> Result<Segmentation>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Provider returning a fixed list of boxes, e.g. manual selections
#[derive(Debug, Clone, Default)]
pub struct FixedRegions {
    regions: Vec<Region>,
}

impl FixedRegions {
    #[must_use]
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Box centre plus the median valid depth sampled at `stride`
    fn centroid(depth: &DepthFrame, region: &Region, stride: usize) -> Seed {
        let rect = region.rect(depth.width(), depth.height());
        let mut samples: Vec<u16> = depth
            .view(&rect)
            .indexed_iter()
            .filter(|&((row, col), &d)| row % stride == 0 && col % stride == 0 && d != 0)
            .map(|(_, &d)| d)
            .collect();

        let median = if samples.is_empty() {
            0.0
        } else {
            let mid = samples.len() / 2;
            let (_, value, _) = samples.select_nth_unstable(mid);
            f64::from(*value)
        };

        Vector3::new(
            (f64::from(region.x1) + f64::from(region.x2)) / 2.0,
            (f64::from(region.y1) + f64::from(region.y2)) / 2.0,
            median,
        )
    }
}

impl RegionProvider for FixedRegions {
    fn segment(
        &mut self,
        depth: &DepthFrame,
        cluster_count: usize,
        seeds: Option<&SeedSet>,
        stride: usize,
    ) -> Result<Segmentation> {
        if stride == 0 {
            return Err(Error::Segmentation("Stride must be greater than 0".to_string()));
        }
        match seeds {
            Some(seeds) => debug!("Warm segmentation with {} seeds", seeds.len()),
            None => debug!("Cold segmentation, {} clusters requested", cluster_count),
        }

        let centroids = self
            .regions
            .iter()
            .map(|region| Self::centroid(depth, region, stride))
            .collect();

        Ok(Segmentation {
            regions: self.regions.clone(),
            centroids: SeedSet::new(centroids),
        })
    }

    fn name(&self) -> &str {
        "FixedRegions"
    }
}
