//! Bounded region fetch scheduler.
//!
//! Drives the source's wait-for-ready protocol one batch at a time and
//! hands each ready region to a bounded pool of assembly workers. The
//! admission gate caps in-flight assembly at `max_workers`; submission
//! waits when the gate is saturated. A failed tile is logged and counted,
//! never fatal: its canvas rectangle keeps the fill color.

use crate::assemble;
use crate::plan::Patch;
use crate::raster::Raster;
use crate::source::{RegionSource, SourceError};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{debug, warn};

pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(120);

pub struct FetchScheduler {
    batch_size: usize,
    max_workers: usize,
    batch_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub fetched: usize,
    pub degraded: usize,
}

impl FetchScheduler {
    pub fn new(batch_size: usize, max_workers: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_workers: max_workers.max(1),
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Fetch every patch and place it into the canvas. Returns once all
    /// submitted assembly jobs have finished (or failed).
    pub async fn fetch(
        &self,
        source: &dyn RegionSource,
        patches: &[Patch],
        canvas: Arc<Mutex<Raster>>,
        tile_size: (u32, u32),
        fill: [u8; 3],
    ) -> Result<FetchStats, SourceError> {
        let gate = Arc::new(Semaphore::new(self.max_workers));
        let degraded = Arc::new(AtomicUsize::new(0));
        let mut jobs = vec![];

        for batch in patches.chunks(self.batch_size) {
            let mut pending = source.request_regions(batch, fill)?;
            let deadline = Instant::now() + self.batch_timeout;
            debug!("Requested batch of {} regions", batch.len());

            while pending.remaining() > 0 {
                let budget = deadline.saturating_duration_since(Instant::now());
                if budget.is_zero() {
                    return Err(SourceError::Timeout(self.batch_timeout));
                }

                // wait_any blocks on the source, so run it off the runtime
                let (ready, returned) = task::spawn_blocking(move || {
                    let ready = pending.wait_any(budget);
                    (ready, pending)
                })
                .await
                .map_err(|e| SourceError::Request(format!("wait task failed: {e}")))?;
                pending = returned;

                for region in ready? {
                    let permit = gate
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("admission gate closed unexpectedly");
                    let canvas = canvas.clone();
                    let degraded = degraded.clone();
                    jobs.push(task::spawn_blocking(move || {
                        let _permit = permit;
                        if let Err(e) = assemble::place_region(&canvas, &region, tile_size) {
                            warn!("Failed to assemble tile {:?}: {e:?}", region.grid);
                            degraded.fetch_add(1, Ordering::Relaxed);
                        }
                    }));
                }
            }
        }

        // Barrier: every submitted job completes before the stage does
        for result in join_all(jobs).await {
            if let Err(e) = result {
                warn!("Assembly worker did not finish: {e}");
                degraded.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(FetchStats {
            fetched: patches.len(),
            degraded: degraded.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{plan_patches, DimensionRange};
    use crate::raster::CHANNELS;
    use crate::source::{FetchedRegion, PendingRegions, SubImageKind, SyntheticSource};

    fn fetch_canvas(
        source: &SyntheticSource,
        width: u32,
        height: u32,
        tile: u32,
        scheduler: FetchScheduler,
    ) -> (Raster, FetchStats) {
        let ranges = [
            DimensionRange::contiguous(width),
            DimensionRange::contiguous(height),
        ];
        let patches = plan_patches(&ranges, (tile, tile)).unwrap();
        let canvas = Arc::new(Mutex::new(Raster::filled(width, height, [0; 3])));
        let stats = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(scheduler.fetch(source, &patches, canvas.clone(), (tile, tile), [0; 3]))
            .unwrap();
        let canvas = Arc::try_unwrap(canvas).unwrap().into_inner().unwrap();
        (canvas, stats)
    }

    #[test]
    fn assembles_the_full_pattern() {
        let source = SyntheticSource::new(150, 110);
        let scheduler = FetchScheduler::new(4, 2);
        let (canvas, stats) = fetch_canvas(&source, 150, 110, 64, scheduler);
        assert_eq!(stats, FetchStats { fetched: 6, degraded: 0 });
        for y in 0..110 {
            for x in 0..150 {
                assert_eq!(
                    canvas.pixel(x, y),
                    Some(SyntheticSource::pattern(x, y)),
                    "mismatch at ({x},{y})"
                );
            }
        }
    }

    #[test]
    fn narrow_gate_still_drains_every_patch() {
        // 1500x1100 at tile 1024 is a 2x2 grid; two workers, two per batch
        let source = SyntheticSource::new(1500, 1100);
        let scheduler = FetchScheduler::new(2, 2);
        let (canvas, stats) = fetch_canvas(&source, 1500, 1100, 1024, scheduler);
        assert_eq!(stats, FetchStats { fetched: 4, degraded: 0 });
        // Corner of the clipped (1,1) patch
        assert_eq!(
            canvas.pixel(1499, 1099),
            Some(SyntheticSource::pattern(1499, 1099))
        );
    }

    #[test]
    fn failed_tile_keeps_fill_and_is_counted() {
        let source = SyntheticSource::new(150, 110).with_failing_patch((1, 0));
        let scheduler = FetchScheduler::new(4, 2);
        let (canvas, stats) = fetch_canvas(&source, 150, 110, 64, scheduler);
        assert_eq!(stats, FetchStats { fetched: 6, degraded: 1 });
        for y in 0..110 {
            for x in 0..150 {
                let in_failed_tile = (64..128).contains(&x) && y < 64;
                let expected = if in_failed_tile {
                    [0, 0, 0]
                } else {
                    SyntheticSource::pattern(x, y)
                };
                assert_eq!(canvas.pixel(x, y), Some(expected), "mismatch at ({x},{y})");
            }
        }
    }

    struct StalledSource;

    struct StalledPending;

    impl PendingRegions for StalledPending {
        fn remaining(&self) -> usize {
            1
        }
        fn wait_any(&mut self, timeout: Duration) -> Result<Vec<FetchedRegion>, SourceError> {
            Err(SourceError::Timeout(timeout))
        }
    }

    impl RegionSource for StalledSource {
        fn sub_images(&self) -> Vec<SubImageKind> {
            vec![SubImageKind::Wsi]
        }
        fn level_count(&self) -> u32 {
            1
        }
        fn dimension_ranges(&self, _level: u32) -> Result<[DimensionRange; 2], SourceError> {
            Ok([
                DimensionRange::contiguous(64),
                DimensionRange::contiguous(64),
            ])
        }
        fn pixel_spacing(&self) -> (f64, f64) {
            (0.25, 0.25)
        }
        fn request_regions(
            &self,
            _patches: &[Patch],
            _fill: [u8; 3],
        ) -> Result<Box<dyn PendingRegions>, SourceError> {
            Ok(Box::new(StalledPending))
        }
        fn auxiliary_jpeg(&self, kind: SubImageKind) -> Result<Option<Vec<u8>>, SourceError> {
            Err(SourceError::MissingImage(kind))
        }
    }

    #[tokio::test]
    async fn unresponsive_source_times_out() {
        let ranges = [
            DimensionRange::contiguous(64),
            DimensionRange::contiguous(64),
        ];
        let patches = plan_patches(&ranges, (64, 64)).unwrap();
        let canvas = Arc::new(Mutex::new(Raster::filled(64, 64, [0; 3])));
        let scheduler =
            FetchScheduler::new(2, 2).with_batch_timeout(Duration::from_millis(50));
        let result = scheduler
            .fetch(&StalledSource, &patches, canvas, (64, 64), [0; 3])
            .await;
        assert!(matches!(result, Err(SourceError::Timeout(_))));
    }

    #[test]
    fn region_sizes_match_realized_ranges() {
        let source = SyntheticSource::new(100, 100);
        let ranges = source.dimension_ranges(0).unwrap();
        let patches = plan_patches(&ranges, (64, 64)).unwrap();
        let mut pending = source.request_regions(&patches, [0; 3]).unwrap();
        let mut widths = vec![];
        while pending.remaining() > 0 {
            for region in pending.wait_any(Duration::from_secs(1)).unwrap() {
                assert_eq!(
                    region.pixels.len(),
                    region.width as usize * region.height as usize * CHANNELS
                );
                widths.push((region.grid, region.width, region.height));
            }
        }
        widths.sort();
        assert_eq!(
            widths,
            vec![
                ((0, 0), 64, 64),
                ((0, 1), 64, 36),
                ((1, 0), 36, 64),
                ((1, 1), 36, 36),
            ]
        );
    }
}
