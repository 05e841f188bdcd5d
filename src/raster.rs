use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::fmt::Display;

/// Canvas sample layout is fixed: interleaved 8-bit RGB.
pub const CHANNELS: usize = 3;

#[derive(Debug)]
pub enum RasterError {
    BufferSize {
        dimensions: (u32, u32),
        expected: usize,
        actual: usize,
    },
    ZeroDimension((u32, u32)),
}

/// An interleaved RGB8 raster. Used for the assembled canvas, pyramid
/// levels, and decoded auxiliary images.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    buffer: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, buffer: Vec<u8>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::ZeroDimension((width, height)));
        }
        let expected = width as usize * height as usize * CHANNELS;
        if buffer.len() != expected {
            return Err(RasterError::BufferSize {
                dimensions: (width, height),
                expected,
                actual: buffer.len(),
            });
        }
        Ok(Self {
            width,
            height,
            buffer,
        })
    }

    pub fn filled(width: u32, height: u32, fill: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut buffer = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            buffer.extend_from_slice(&fill);
        }
        Self {
            width,
            height,
            buffer,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([self.buffer[i], self.buffer[i + 1], self.buffer[i + 2]])
    }

    /// Copy a `copy_width` x `copy_height` pixel block from an interleaved
    /// source buffer of row width `src_width` into this raster at
    /// (`dst_x`, `dst_y`). Caller is responsible for clipping.
    pub fn place(
        &mut self,
        src: &[u8],
        src_width: u32,
        dst_x: u32,
        dst_y: u32,
        copy_width: u32,
        copy_height: u32,
    ) {
        let src_stride = src_width as usize * CHANNELS;
        let dst_stride = self.width as usize * CHANNELS;
        let row_bytes = copy_width as usize * CHANNELS;
        for row in 0..copy_height as usize {
            let src_start = row * src_stride;
            let dst_start =
                (dst_y as usize + row) * dst_stride + dst_x as usize * CHANNELS;
            self.buffer[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }
    }

    /// Extract a fixed-size block at (`x0`, `y0`), padding with `fill`
    /// where the block runs past the raster edge.
    pub fn extract_padded(
        &self,
        x0: u32,
        y0: u32,
        block_width: u32,
        block_height: u32,
        fill: [u8; 3],
    ) -> Vec<u8> {
        let mut block = Vec::with_capacity(block_width as usize * block_height as usize * CHANNELS);
        let stride = self.width as usize * CHANNELS;
        let covered_width = self.width.saturating_sub(x0).min(block_width) as usize;
        for row in 0..block_height {
            let sy = y0 + row;
            if sy < self.height && covered_width > 0 {
                let start = sy as usize * stride + x0 as usize * CHANNELS;
                block.extend_from_slice(&self.buffer[start..start + covered_width * CHANNELS]);
                for _ in covered_width..block_width as usize {
                    block.extend_from_slice(&fill);
                }
            } else {
                for _ in 0..block_width {
                    block.extend_from_slice(&fill);
                }
            }
        }
        block
    }

    /// Half-resolution resample (floor division) with a Lanczos3 kernel.
    pub fn halved(&self) -> Self {
        let target = (self.width / 2, self.height / 2);
        let image = DynamicImage::ImageRgb8(
            RgbImage::from_raw(self.width, self.height, self.buffer.clone())
                .expect("raster buffer matches dimensions"),
        );
        let resized = image
            .resize_exact(target.0, target.1, FilterType::Lanczos3)
            .into_rgb8();
        Self {
            width: target.0,
            height: target.1,
            buffer: resized.into_raw(),
        }
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        Self {
            width: rgb.width(),
            height: rgb.height(),
            buffer: rgb.into_raw(),
        }
    }

    pub fn megapixels(&self) -> f64 {
        (self.width as f64 * self.height as f64) / 1e6
    }
}

impl Display for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Raster({}x{}, RGB8, {} bytes)",
            self.width,
            self.height,
            self.buffer.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_sets_every_pixel() {
        let raster = Raster::filled(4, 3, [9, 8, 7]);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(raster.pixel(x, y), Some([9, 8, 7]));
            }
        }
        assert_eq!(raster.pixel(4, 0), None);
    }

    #[test]
    fn place_copies_a_block() {
        let mut canvas = Raster::filled(4, 4, [0, 0, 0]);
        // 2x2 source block with distinct pixels
        let src = vec![
            1, 1, 1, 2, 2, 2, //
            3, 3, 3, 4, 4, 4,
        ];
        canvas.place(&src, 2, 1, 2, 2, 2);
        assert_eq!(canvas.pixel(1, 2), Some([1, 1, 1]));
        assert_eq!(canvas.pixel(2, 2), Some([2, 2, 2]));
        assert_eq!(canvas.pixel(1, 3), Some([3, 3, 3]));
        assert_eq!(canvas.pixel(2, 3), Some([4, 4, 4]));
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(canvas.pixel(3, 3), Some([0, 0, 0]));
    }

    #[test]
    fn extract_padded_fills_past_the_edge() {
        let mut raster = Raster::filled(3, 3, [1, 1, 1]);
        raster.place(&[5, 5, 5], 1, 2, 2, 1, 1);
        let block = raster.extract_padded(2, 2, 2, 2, [0, 0, 0]);
        // Row 0: (2,2)=5s then padding; row 1: all padding
        assert_eq!(
            block,
            vec![
                5, 5, 5, 0, 0, 0, //
                0, 0, 0, 0, 0, 0,
            ]
        );
    }

    #[test]
    fn halved_floors_dimensions() {
        let raster = Raster::filled(5, 4, [100, 100, 100]);
        let half = raster.halved();
        assert_eq!((half.width, half.height), (2, 2));
        // Uniform input stays uniform through the kernel
        assert_eq!(half.pixel(0, 0), Some([100, 100, 100]));
    }
}
