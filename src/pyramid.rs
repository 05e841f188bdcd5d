//! Pyramid level generation.
//!
//! Level 0 is the assembled canvas unmodified; each further level is a
//! half-resolution Lanczos resample of its predecessor, a strictly
//! sequential chain. Generation stops once the next level would drop
//! below the configured floor.

use crate::raster::Raster;
use tracing::debug;

/// Hard minimum for any generated level.
pub const MIN_LEVEL_SIZE: u32 = 256;

/// Stopping threshold used in practice.
pub const DEFAULT_LEVEL_FLOOR: u32 = 512;

/// Finest level first.
pub fn build_levels(base: Raster, floor: u32) -> Vec<Raster> {
    let floor = floor.max(MIN_LEVEL_SIZE);
    let mut levels = vec![base];
    loop {
        let current = &levels[levels.len() - 1];
        if current.width / 2 < floor || current.height / 2 < floor {
            break;
        }
        let next = current.halved();
        debug!(
            "Generated pyramid level {}: {}x{}",
            levels.len(),
            next.width,
            next.height
        );
        levels.push(next);
    }
    levels
}
