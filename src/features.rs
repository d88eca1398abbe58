//! Feature-vector log: one resampled depth patch per region per frame.
//!
//! Line format: the 1-based region index within the frame followed by the
//! `side * side` resampled depths, all tab-separated integers.

use crate::{
    frame::{DepthFrame, Region},
    utils::image_conversion::view_to_luma16,
    Result,
};
use image::imageops::{self, FilterType};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Resample the region's crop of `depth` to a `side` x `side` patch.
/// Returns `None` for an empty crop.
///
/// # Errors
///
/// Returns an error if the crop cannot be converted to an image
pub fn resample_patch(depth: &DepthFrame, region: &Region, side: u32) -> Result<Option<Vec<u16>>> {
    let rect = region.rect(depth.width(), depth.height());
    if rect.is_empty() {
        return Ok(None);
    }
    let crop = view_to_luma16(&depth.view(&rect))?;
    let patch = imageops::resize(&crop, side, side, FilterType::Triangle);
    Ok(Some(patch.into_raw()))
}

/// Appends feature lines to a writer
pub struct FeatureLog<W: Write> {
    writer: W,
    patch_side: u32,
    lines: usize,
}

impl FeatureLog<BufWriter<File>> {
    /// Create (truncate) a log file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created
    pub fn create<P: AsRef<Path>>(path: P, patch_side: u32) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        log::info!("Writing feature vectors to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file), patch_side))
    }
}

impl<W: Write> FeatureLog<W> {
    pub fn new(writer: W, patch_side: u32) -> Self {
        Self {
            writer,
            patch_side,
            lines: 0,
        }
    }

    /// Write the line for region `index` (1-based). Returns `false` if the
    /// region has no pixels inside the frame.
    ///
    /// # Errors
    ///
    /// Returns an error if resampling or writing fails
    pub fn record(&mut self, index: usize, depth: &DepthFrame, region: &Region) -> Result<bool> {
        let Some(patch) = resample_patch(depth, region, self.patch_side)? else {
            debug!("Region {} has an empty crop, no feature line", index);
            return Ok(false);
        };

        let mut line = index.to_string();
        for value in patch {
            line.push('\t');
            line.push_str(&value.to_string());
        }
        writeln!(self.writer, "{line}")?;
        self.lines += 1;
        Ok(true)
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// # Errors
    ///
    /// Returns an error if the underlying writer fails to flush
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Erase the writer type
    pub fn boxed(self) -> FeatureLog<Box<dyn Write + Send>>
    where
        W: Send + 'static,
    {
        FeatureLog {
            writer: Box::new(self.writer),
            patch_side: self.patch_side,
            lines: self.lines,
        }
    }
}
