//! Dimension validation and tile grid planning.
//!
//! Source coordinates address samples at a resolution level where one
//! pixel spans `step = 2^level` coordinate units, and range ends are
//! inclusive of the last sample. Planned patches partition the level's
//! pixel extent exactly: no gaps, no overlap, edge tiles clipped to the
//! image boundary.

use std::fmt::Display;

#[derive(Debug)]
pub enum ConfigError {
    NonIntegerExtent(DimensionRange),
    ScaleMismatch { x_step: u32, y_step: u32 },
    BadScale(u32),
    ZeroTileSize,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NonIntegerExtent(range) => write!(
                f,
                "({} - {}) / {} leaves a remainder",
                range.end, range.start, range.step
            ),
            ConfigError::ScaleMismatch { x_step, y_step } => {
                write!(f, "axis scales disagree: x={x_step} y={y_step}")
            }
            ConfigError::BadScale(step) => write!(f, "scale {step} is not a power of two"),
            ConfigError::ZeroTileSize => write!(f, "tile size must be non-zero"),
        }
    }
}

/// One axis of a resolution level: (origin, step, end) in source
/// coordinate units, end exclusive of the final step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DimensionRange {
    pub start: u32,
    pub step: u32,
    pub end: u32,
}

impl DimensionRange {
    pub fn contiguous(length: u32) -> Self {
        Self {
            start: 0,
            step: 1,
            end: length,
        }
    }

    pub fn at_level(length: u32, level: u32) -> Self {
        let step = 1u32 << level;
        Self {
            start: 0,
            step,
            end: length * step,
        }
    }

    /// Length in pixels. The span must divide evenly by the step.
    pub fn pixel_length(&self) -> Result<u32, ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::BadScale(0));
        }
        let span = self
            .end
            .checked_sub(self.start)
            .ok_or(ConfigError::NonIntegerExtent(*self))?;
        if span % self.step != 0 {
            return Err(ConfigError::NonIntegerExtent(*self));
        }
        Ok(span / self.step)
    }
}

/// The resolution level both axes agree on: `log2(step)`.
pub fn level_of(ranges: &[DimensionRange; 2]) -> Result<u32, ConfigError> {
    let (x_step, y_step) = (ranges[0].step, ranges[1].step);
    if x_step != y_step {
        return Err(ConfigError::ScaleMismatch { x_step, y_step });
    }
    if x_step == 0 || !x_step.is_power_of_two() {
        return Err(ConfigError::BadScale(x_step));
    }
    Ok(x_step.trailing_zeros())
}

/// A rectangular region request in source coordinates, with inclusive
/// ends, plus its destination cell in the tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Patch {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
    pub level: u32,
    pub grid: (u32, u32),
}

impl Patch {
    /// Realized pixel width of the inclusive coordinate range.
    pub fn pixel_width(&self) -> u32 {
        1 + (self.x_end - self.x_start) / (1 << self.level)
    }

    pub fn pixel_height(&self) -> u32 {
        1 + (self.y_end - self.y_start) / (1 << self.level)
    }
}

/// Partition a level into an ordered row-major patch grid.
pub fn plan_patches(
    ranges: &[DimensionRange; 2],
    tile_size: (u32, u32),
) -> Result<Vec<Patch>, ConfigError> {
    if tile_size.0 == 0 || tile_size.1 == 0 {
        return Err(ConfigError::ZeroTileSize);
    }
    let level = level_of(ranges)?;
    let step = ranges[0].step;
    let width = ranges[0].pixel_length()?;
    let height = ranges[1].pixel_length()?;

    let tiles_x = width.div_ceil(tile_size.0);
    let tiles_y = height.div_ceil(tile_size.1);

    let span_x = tile_size.0 * step;
    let span_y = tile_size.1 * step;

    let mut patches = Vec::with_capacity(tiles_x as usize * tiles_y as usize);
    for y in 0..tiles_y {
        let y_start = ranges[1].start + y * span_y;
        // "- step" because range ends address the last included sample;
        // min clips the trailing row/column to the true image edge
        let y_end = (y_start + span_y - step).min(ranges[1].end - step);
        for x in 0..tiles_x {
            let x_start = ranges[0].start + x * span_x;
            let x_end = (x_start + span_x - step).min(ranges[0].end - step);
            patches.push(Patch {
                x_start,
                x_end,
                y_start,
                y_end,
                level,
                grid: (x, y),
            });
        }
    }
    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(width: u32, height: u32, tile: u32) -> Vec<Patch> {
        let ranges = [
            DimensionRange::contiguous(width),
            DimensionRange::contiguous(height),
        ];
        plan_patches(&ranges, (tile, tile)).unwrap()
    }

    /// Every pixel covered exactly once, no overrun past the extent.
    fn assert_exact_partition(patches: &[Patch], width: u32, height: u32) {
        let mut hits = vec![0u8; (width * height) as usize];
        for patch in patches {
            let w = patch.pixel_width();
            let h = patch.pixel_height();
            assert!(w > 0 && h > 0, "empty patch {:?}", patch.grid);
            for dy in 0..h {
                for dx in 0..w {
                    let x = patch.x_start + dx;
                    let y = patch.y_start + dy;
                    assert!(x < width && y < height, "overrun at ({x},{y})");
                    hits[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1), "coverage is not exact");
    }

    #[test]
    fn partitions_non_multiple_extents() {
        for (w, h, t) in [(100, 60, 32), (33, 33, 32), (7, 130, 16)] {
            assert_exact_partition(&coverage(w, h, t), w, h);
        }
    }

    #[test]
    fn exact_multiple_has_no_trailing_tile() {
        let patches = coverage(128, 64, 32);
        assert_eq!(patches.len(), 4 * 2);
        assert_exact_partition(&patches, 128, 64);
        let last = patches.last().unwrap();
        assert_eq!(last.grid, (3, 1));
        assert_eq!((last.pixel_width(), last.pixel_height()), (32, 32));
    }

    #[test]
    fn clips_the_final_row_and_column() {
        // 1500x1100 at tile 1024: 2x2 grid, corner patch is 476x76
        let patches = coverage(1500, 1100, 1024);
        assert_eq!(patches.len(), 4);
        let corner = patches.iter().find(|p| p.grid == (1, 1)).unwrap();
        assert_eq!(corner.pixel_width(), 476);
        assert_eq!(corner.pixel_height(), 76);
        assert_exact_partition(&patches, 1500, 1100);
    }

    #[test]
    fn planning_respects_level_steps() {
        let ranges = [
            DimensionRange::at_level(100, 2),
            DimensionRange::at_level(80, 2),
        ];
        let patches = plan_patches(&ranges, (64, 64)).unwrap();
        assert_eq!(patches.len(), 4);
        assert_eq!(patches[0].level, 2);
        assert_eq!(patches[0].x_end, 64 * 4 - 4);
        let corner = patches.iter().find(|p| p.grid == (1, 1)).unwrap();
        assert_eq!(corner.pixel_width(), 36);
        assert_eq!(corner.pixel_height(), 16);
    }

    #[test]
    fn mismatched_scales_are_rejected() {
        let ranges = [
            DimensionRange {
                start: 0,
                step: 2,
                end: 100,
            },
            DimensionRange {
                start: 0,
                step: 4,
                end: 100,
            },
        ];
        assert!(matches!(
            plan_patches(&ranges, (32, 32)),
            Err(ConfigError::ScaleMismatch { .. })
        ));
    }

    #[test]
    fn non_power_of_two_scale_is_rejected() {
        let ranges = [
            DimensionRange {
                start: 0,
                step: 3,
                end: 99,
            },
            DimensionRange {
                start: 0,
                step: 3,
                end: 99,
            },
        ];
        assert!(matches!(level_of(&ranges), Err(ConfigError::BadScale(3))));
    }

    #[test]
    fn non_integer_extent_is_rejected() {
        let range = DimensionRange {
            start: 0,
            step: 4,
            end: 10,
        };
        assert!(matches!(
            range.pixel_length(),
            Err(ConfigError::NonIntegerExtent(_))
        ));
    }
}
