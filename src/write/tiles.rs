use crate::codec::{Codec, CodecError};
use crate::raster::Raster;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// Tile columns and rows covering a level.
pub fn tile_grid(level: &Raster, tile_size: (u32, u32)) -> (u32, u32) {
    (
        level.width.div_ceil(tile_size.0),
        level.height.div_ceil(tile_size.1),
    )
}

/// Extract and compress every tile of a level in row-major order.
/// Trailing tiles are padded to the full tile size with the fill color,
/// as the container's tile layout requires.
pub fn encode_tiles(
    level: &Raster,
    tile_size: (u32, u32),
    codec: Codec,
    quality: u8,
    fill: [u8; 3],
) -> Result<Vec<Vec<u8>>, CodecError> {
    let (cols, rows) = tile_grid(level, tile_size);
    let origins: Vec<(u32, u32)> = (0..rows)
        .flat_map(|row| (0..cols).map(move |col| (col * tile_size.0, row * tile_size.1)))
        .collect();

    origins
        .into_par_iter()
        .map(|(x0, y0)| {
            let block = level.extract_padded(x0, y0, tile_size.0, tile_size.1, fill);
            codec.encode(&block, tile_size.0, tile_size.1, quality)
        })
        .collect()
}
