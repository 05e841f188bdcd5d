//! Deterministic in-memory region source.
//!
//! Serves a fixed per-pixel pattern so assembled output can be checked
//! coordinate by coordinate. Doubles as the demo backend for
//! `synthetic:WxH` inputs and supports injecting per-patch failures.

use super::{FetchedRegion, PendingRegions, RegionSource, SourceError, SubImageKind};
use crate::plan::{DimensionRange, Patch};
use crate::raster::CHANNELS;
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::time::Duration;

pub struct SyntheticSource {
    width: u32,
    height: u32,
    pixel_spacing: (f64, f64),
    macro_jpeg: Option<Vec<u8>>,
    label_jpeg: Option<Vec<u8>>,
    failing: HashSet<(u32, u32)>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_spacing: (0.25, 0.25),
            macro_jpeg: None,
            label_jpeg: None,
            failing: HashSet::new(),
        }
    }

    /// Attach small generated macro and label payloads.
    pub fn with_auxiliary_images(mut self) -> Self {
        self.macro_jpeg = Some(encode_jpeg(384, 144, |x, _| Rgb([x as u8, 64, 160])));
        self.label_jpeg = Some(encode_jpeg(160, 144, |_, y| Rgb([200, y as u8, 32])));
        self
    }

    /// Regions for this grid cell come back undersized, which downstream
    /// assembly must treat as a failed tile.
    pub fn with_failing_patch(mut self, grid: (u32, u32)) -> Self {
        self.failing.insert(grid);
        self
    }

    pub fn with_pixel_spacing(mut self, spacing: (f64, f64)) -> Self {
        self.pixel_spacing = spacing;
        self
    }

    /// The reference pattern, addressed in level pixel coordinates.
    pub fn pattern(x: u32, y: u32) -> [u8; 3] {
        [x as u8, y as u8, (x ^ y) as u8]
    }
}

fn encode_jpeg(width: u32, height: u32, f: impl Fn(u32, u32) -> Rgb<u8>) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, f);
    let mut buf = Cursor::new(vec![]);
    image
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .expect("in-memory jpeg encode");
    buf.into_inner()
}

impl RegionSource for SyntheticSource {
    fn sub_images(&self) -> Vec<SubImageKind> {
        let mut kinds = vec![SubImageKind::Wsi];
        if self.macro_jpeg.is_some() {
            kinds.push(SubImageKind::Macro);
        }
        if self.label_jpeg.is_some() {
            kinds.push(SubImageKind::Label);
        }
        kinds
    }

    fn level_count(&self) -> u32 {
        let mut levels = 1;
        let (mut w, mut h) = (self.width, self.height);
        while w / 2 >= 512 && h / 2 >= 512 {
            w /= 2;
            h /= 2;
            levels += 1;
        }
        levels
    }

    fn dimension_ranges(&self, level: u32) -> Result<[DimensionRange; 2], SourceError> {
        if level >= self.level_count() {
            return Err(SourceError::Request(format!(
                "level {level} out of range (have {})",
                self.level_count()
            )));
        }
        Ok([
            DimensionRange::at_level(self.width >> level, level),
            DimensionRange::at_level(self.height >> level, level),
        ])
    }

    fn pixel_spacing(&self) -> (f64, f64) {
        self.pixel_spacing
    }

    fn request_regions(
        &self,
        patches: &[Patch],
        _fill: [u8; 3],
    ) -> Result<Box<dyn PendingRegions>, SourceError> {
        Ok(Box::new(SyntheticPending {
            queue: patches.to_vec(),
            failing: self.failing.clone(),
        }))
    }

    fn auxiliary_jpeg(&self, kind: SubImageKind) -> Result<Option<Vec<u8>>, SourceError> {
        match kind {
            SubImageKind::Macro => Ok(self.macro_jpeg.clone()),
            SubImageKind::Label => Ok(self.label_jpeg.clone()),
            SubImageKind::Wsi => Err(SourceError::MissingImage(kind)),
        }
    }
}

struct SyntheticPending {
    queue: Vec<Patch>,
    failing: HashSet<(u32, u32)>,
}

impl SyntheticPending {
    fn render(&self, patch: &Patch) -> FetchedRegion {
        let step = 1u32 << patch.level;
        let width = patch.pixel_width();
        let height = patch.pixel_height();
        let px0 = patch.x_start / step;
        let py0 = patch.y_start / step;
        let mut pixels = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for j in 0..height {
            for i in 0..width {
                pixels.extend_from_slice(&SyntheticSource::pattern(px0 + i, py0 + j));
            }
        }
        if self.failing.contains(&patch.grid) {
            // Damaged region: half the samples are missing
            pixels.truncate(pixels.len() / 2);
        }
        FetchedRegion {
            grid: patch.grid,
            width,
            height,
            pixels,
        }
    }
}

impl PendingRegions for SyntheticPending {
    fn remaining(&self) -> usize {
        self.queue.len()
    }

    fn wait_any(&mut self, _timeout: Duration) -> Result<Vec<FetchedRegion>, SourceError> {
        // Completion order is intentionally not request order
        let take = self.queue.len().min(3);
        let ready: Vec<Patch> = self.queue.split_off(self.queue.len() - take);
        Ok(ready.iter().rev().map(|p| self.render(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_patches;

    #[test]
    fn regions_carry_the_pattern() {
        let source = SyntheticSource::new(100, 80);
        let ranges = source.dimension_ranges(0).unwrap();
        let patches = plan_patches(&ranges, (64, 64)).unwrap();
        let mut pending = source.request_regions(&patches, [0; 3]).unwrap();

        let mut seen = 0;
        while pending.remaining() > 0 {
            for region in pending.wait_any(Duration::from_secs(1)).unwrap() {
                seen += 1;
                assert_eq!(
                    region.pixels.len(),
                    region.width as usize * region.height as usize * CHANNELS
                );
                // Spot-check the first pixel of the region
                let expected = SyntheticSource::pattern(
                    region.grid.0 * 64,
                    region.grid.1 * 64,
                );
                assert_eq!(&region.pixels[..3], &expected);
            }
        }
        assert_eq!(seen, patches.len());
    }

    #[test]
    fn failing_patch_regions_are_undersized() {
        let source = SyntheticSource::new(64, 64).with_failing_patch((0, 0));
        let ranges = source.dimension_ranges(0).unwrap();
        let patches = plan_patches(&ranges, (64, 64)).unwrap();
        let mut pending = source.request_regions(&patches, [0; 3]).unwrap();
        let ready = pending.wait_any(Duration::from_secs(1)).unwrap();
        assert_eq!(ready.len(), 1);
        assert!(ready[0].pixels.len() < 64 * 64 * CHANNELS);
    }
}
