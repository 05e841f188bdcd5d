//! Placement of fetched regions into the shared canvas.
//!
//! Every region lands at `grid * tile_size`; the planner's partition
//! guarantees destination rectangles are disjoint, so placement is
//! idempotent and position addressed, never order dependent. The copy is
//! clipped to both the region's realized extent and the canvas bounds
//! (trailing tiles are smaller than the nominal tile size).

use crate::raster::{Raster, CHANNELS};
use crate::source::FetchedRegion;
use std::sync::Mutex;

#[derive(Debug)]
pub enum AssembleError {
    BufferSize {
        grid: (u32, u32),
        expected: usize,
        actual: usize,
    },
    OutsideCanvas {
        grid: (u32, u32),
    },
    CanvasPoisoned,
}

pub fn place_region(
    canvas: &Mutex<Raster>,
    region: &FetchedRegion,
    tile_size: (u32, u32),
) -> Result<(), AssembleError> {
    let expected = region.width as usize * region.height as usize * CHANNELS;
    if region.pixels.len() != expected {
        return Err(AssembleError::BufferSize {
            grid: region.grid,
            expected,
            actual: region.pixels.len(),
        });
    }

    let dst_x = region.grid.0 * tile_size.0;
    let dst_y = region.grid.1 * tile_size.1;

    let mut canvas = canvas.lock().map_err(|_| AssembleError::CanvasPoisoned)?;
    if dst_x >= canvas.width || dst_y >= canvas.height {
        return Err(AssembleError::OutsideCanvas { grid: region.grid });
    }
    let copy_width = region.width.min(canvas.width - dst_x);
    let copy_height = region.height.min(canvas.height - dst_y);
    canvas.place(
        &region.pixels,
        region.width,
        dst_x,
        dst_y,
        copy_width,
        copy_height,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(grid: (u32, u32), width: u32, height: u32, value: u8) -> FetchedRegion {
        FetchedRegion {
            grid,
            width,
            height,
            pixels: vec![value; width as usize * height as usize * CHANNELS],
        }
    }

    #[test]
    fn places_at_grid_offset() {
        let canvas = Mutex::new(Raster::filled(8, 8, [0; 3]));
        place_region(&canvas, &region((1, 1), 4, 4, 7), (4, 4)).unwrap();
        let canvas = canvas.into_inner().unwrap();
        assert_eq!(canvas.pixel(3, 3), Some([0, 0, 0]));
        assert_eq!(canvas.pixel(4, 4), Some([7, 7, 7]));
        assert_eq!(canvas.pixel(7, 7), Some([7, 7, 7]));
    }

    #[test]
    fn clips_to_canvas_bounds() {
        // 6x6 canvas, tile 4: the (1,1) cell only has 2x2 left
        let canvas = Mutex::new(Raster::filled(6, 6, [0; 3]));
        place_region(&canvas, &region((1, 1), 4, 4, 9), (4, 4)).unwrap();
        let canvas = canvas.into_inner().unwrap();
        assert_eq!(canvas.pixel(4, 4), Some([9, 9, 9]));
        assert_eq!(canvas.pixel(5, 5), Some([9, 9, 9]));
        assert_eq!(canvas.pixel(3, 4), Some([0, 0, 0]));
    }

    #[test]
    fn short_buffer_is_an_error() {
        let canvas = Mutex::new(Raster::filled(8, 8, [0; 3]));
        let mut bad = region((0, 0), 4, 4, 1);
        bad.pixels.truncate(10);
        assert!(matches!(
            place_region(&canvas, &bad, (4, 4)),
            Err(AssembleError::BufferSize { .. })
        ));
        // Canvas untouched
        let canvas = canvas.into_inner().unwrap();
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0]));
    }

    #[test]
    fn grid_outside_canvas_is_an_error() {
        let canvas = Mutex::new(Raster::filled(8, 8, [0; 3]));
        assert!(matches!(
            place_region(&canvas, &region((4, 0), 4, 4, 1), (4, 4)),
            Err(AssembleError::OutsideCanvas { .. })
        ));
    }
}
