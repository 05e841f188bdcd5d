//! Pyramidal container output.
//!
//! Directory order is the external convention consumers rely on: pyramid
//! levels finest first, then macro, then label. The base directory is
//! flagged full-resolution and every other directory reduced-resolution.
//! Pyramid directories are tiled and carry pixels-per-centimeter
//! resolution tags; auxiliary directories are single-strip thumbnails
//! with a descriptive tag and no resolution metadata.

use crate::codec::{Codec, CodecError};
use crate::raster::Raster;
use crate::source::SubImageKind;
use crate::tiff::{
    Endian, Ifd, TagData, TagId, TiffVariant, TiffWriter, RESOLUTION_UNIT_CM, SUBFILE_FULL,
    SUBFILE_REDUCED,
};
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;
use tracing::{info, warn};

mod tiles;

const PHOTOMETRIC_RGB: u16 = 2;
const PHOTOMETRIC_YCBCR: u16 = 6;

#[derive(Debug)]
pub enum WriteError {
    NoLevels,
    Codec(CodecError),
    IoError(io::Error),
}

impl From<CodecError> for WriteError {
    fn from(e: CodecError) -> Self {
        WriteError::Codec(e)
    }
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        WriteError::IoError(e)
    }
}

/// A decoded macro or label image, appended after the pyramid.
#[derive(Clone, Debug)]
pub struct AuxiliaryImage {
    pub kind: SubImageKind,
    pub raster: Raster,
}

impl AuxiliaryImage {
    fn description(&self) -> &'static str {
        match self.kind {
            SubImageKind::Macro => "Macro",
            SubImageKind::Label => "Label",
            SubImageKind::Wsi => "WSI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub directories: usize,
    pub fallback: bool,
}

#[derive(Clone, Debug)]
pub struct PyramidalWriter {
    tile_size: (u32, u32),
    codec: Codec,
    quality: u8,
    pixel_spacing: (f64, f64),
    fill: [u8; 3],
    endian: Endian,
    variant: TiffVariant,
}

impl Default for PyramidalWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PyramidalWriter {
    pub fn new() -> Self {
        Self {
            tile_size: (1024, 1024),
            codec: Codec::Jpeg,
            quality: 80,
            pixel_spacing: (0.25, 0.25),
            fill: [0; 3],
            endian: Endian::Little,
            variant: TiffVariant::Big,
        }
    }

    pub fn with_tile_size(mut self, pixels: u32) -> Self {
        self.tile_size = (pixels, pixels);
        self
    }

    pub fn with_codec(mut self, codec: Codec, quality: u8) -> Self {
        self.codec = codec;
        self.quality = quality;
        self
    }

    /// Micrometers per pixel at the base level.
    pub fn with_pixel_spacing(mut self, spacing: (f64, f64)) -> Self {
        self.pixel_spacing = spacing;
        self
    }

    pub fn with_fill(mut self, fill: [u8; 3]) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_big_tiff(mut self, big: bool) -> Self {
        self.variant = if big {
            TiffVariant::Big
        } else {
            TiffVariant::Normal
        };
        self
    }

    /// Write the full multi-directory container.
    pub fn write<W: Write + Seek>(
        &self,
        stream: W,
        levels: &[Raster],
        aux: &[AuxiliaryImage],
    ) -> Result<usize, WriteError> {
        if levels.is_empty() {
            return Err(WriteError::NoLevels);
        }
        let mut writer = TiffWriter::new(stream, self.endian, self.variant)?;
        for (index, level) in levels.iter().enumerate() {
            self.append_level(&mut writer, index, level)?;
        }
        for image in aux {
            self.append_auxiliary(&mut writer, image)?;
        }
        let directories = writer.directory_count();
        writer.finish()?.flush()?;
        Ok(directories)
    }

    /// Single-directory output: the base level alone, tiled.
    pub fn write_base_only<W: Write + Seek>(
        &self,
        stream: W,
        base: &Raster,
    ) -> Result<usize, WriteError> {
        let mut writer = TiffWriter::new(stream, self.endian, self.variant)?;
        self.append_level(&mut writer, 0, base)?;
        let directories = writer.directory_count();
        writer.finish()?.flush()?;
        Ok(directories)
    }

    /// Write to a file, degrading to a base-level-only container if the
    /// multi-directory assembly fails.
    pub fn write_file(
        &self,
        path: &Path,
        levels: &[Raster],
        aux: &[AuxiliaryImage],
    ) -> Result<WriteSummary, WriteError> {
        let base = levels.first().ok_or(WriteError::NoLevels)?;
        match self.write(BufWriter::new(File::create(path)?), levels, aux) {
            Ok(directories) => Ok(WriteSummary {
                directories,
                fallback: false,
            }),
            Err(e) => {
                warn!(
                    "Multi-directory write of {} failed ({e:?}); \
                     falling back to a single-level pyramid file",
                    path.display()
                );
                let directories =
                    self.write_base_only(BufWriter::new(File::create(path)?), base)?;
                info!("Wrote single-level fallback {}", path.display());
                Ok(WriteSummary {
                    directories,
                    fallback: true,
                })
            }
        }
    }

    fn photometric(&self) -> u16 {
        // JFIF tile payloads are YCbCr transformed
        match self.codec {
            Codec::Jpeg => PHOTOMETRIC_YCBCR,
            _ => PHOTOMETRIC_RGB,
        }
    }

    fn append_level<W: Write + Seek>(
        &self,
        writer: &mut TiffWriter<W>,
        index: usize,
        level: &Raster,
    ) -> Result<(), WriteError> {
        let encoded = tiles::encode_tiles(level, self.tile_size, self.codec, self.quality, self.fill)?;
        let mut offsets = Vec::with_capacity(encoded.len());
        let mut counts = Vec::with_capacity(encoded.len());
        for tile in &encoded {
            offsets.push(writer.append_data(tile)?);
            counts.push(tile.len() as u32);
        }

        let endian = writer.endian;
        let subfile = if index == 0 {
            SUBFILE_FULL
        } else {
            SUBFILE_REDUCED
        };
        let (x_res, y_res) = self.level_resolution(index);

        let mut ifd = Ifd::new();
        ifd.set_tag(TagId::SubfileType, TagData::from_long(subfile), endian);
        ifd.set_tag(TagId::ImageWidth, TagData::from_long(level.width), endian);
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(level.height), endian);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![8, 8, 8]), endian);
        ifd.set_tag(
            TagId::Compression,
            TagData::from_short(self.codec.into()),
            endian,
        );
        ifd.set_tag(
            TagId::PhotometricInterpretation,
            TagData::from_short(self.photometric()),
            endian,
        );
        ifd.set_tag(TagId::SamplesPerPixel, TagData::from_short(3), endian);
        ifd.set_tag(TagId::PlanarConfiguration, TagData::from_short(1), endian);
        ifd.set_tag(
            TagId::TileWidth,
            TagData::from_short(self.tile_size.0 as u16),
            endian,
        );
        ifd.set_tag(
            TagId::TileLength,
            TagData::from_short(self.tile_size.1 as u16),
            endian,
        );
        ifd.set_tag(
            TagId::TileOffsets,
            writer.variant.offsets_tag(offsets),
            endian,
        );
        ifd.set_tag(TagId::TileByteCounts, TagData::Long(counts), endian);
        ifd.set_tag(
            TagId::XResolution,
            TagData::from_rational(x_res.0, x_res.1),
            endian,
        );
        ifd.set_tag(
            TagId::YResolution,
            TagData::from_rational(y_res.0, y_res.1),
            endian,
        );
        ifd.set_tag(
            TagId::ResolutionUnit,
            TagData::from_short(RESOLUTION_UNIT_CM),
            endian,
        );
        if index == 0 {
            ifd.set_tag(
                TagId::Software,
                TagData::from_string(concat!("slidetiff ", env!("CARGO_PKG_VERSION"))),
                endian,
            );
        }
        writer.append_ifd(&ifd)?;
        Ok(())
    }

    fn append_auxiliary<W: Write + Seek>(
        &self,
        writer: &mut TiffWriter<W>,
        image: &AuxiliaryImage,
    ) -> Result<(), WriteError> {
        let raster = &image.raster;
        let strip = self
            .codec
            .encode(raster.buffer(), raster.width, raster.height, self.quality)?;
        let offset = writer.append_data(&strip)?;

        let endian = writer.endian;
        let mut ifd = Ifd::new();
        ifd.set_tag(TagId::SubfileType, TagData::from_long(SUBFILE_REDUCED), endian);
        ifd.set_tag(TagId::ImageWidth, TagData::from_long(raster.width), endian);
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(raster.height), endian);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![8, 8, 8]), endian);
        ifd.set_tag(
            TagId::Compression,
            TagData::from_short(self.codec.into()),
            endian,
        );
        ifd.set_tag(
            TagId::PhotometricInterpretation,
            TagData::from_short(self.photometric()),
            endian,
        );
        ifd.set_tag(
            TagId::ImageDescription,
            TagData::from_string(image.description()),
            endian,
        );
        ifd.set_tag(TagId::SamplesPerPixel, TagData::from_short(3), endian);
        ifd.set_tag(TagId::PlanarConfiguration, TagData::from_short(1), endian);
        ifd.set_tag(TagId::RowsPerStrip, TagData::from_long(raster.height), endian);
        ifd.set_tag(
            TagId::StripOffsets,
            writer.variant.offsets_tag(vec![offset]),
            endian,
        );
        ifd.set_tag(
            TagId::StripByteCounts,
            TagData::Long(vec![strip.len() as u32]),
            endian,
        );
        writer.append_ifd(&ifd)?;
        Ok(())
    }

    /// Pixels per centimeter at a pyramid level, as a rational.
    fn level_resolution(&self, index: usize) -> ((u32, u32), (u32, u32)) {
        let scale = (1u64 << index) as f64;
        let rational = |spacing_um: f64| {
            let per_cm = 10000.0 / (spacing_um * scale);
            if per_cm.is_finite() && per_cm > 0.0 {
                ((per_cm * 100.0).round() as u32, 100)
            } else {
                (0, 1)
            }
        };
        (rational(self.pixel_spacing.0), rational(self.pixel_spacing.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid;
    use crate::tiff::Tiff;
    use std::io::Cursor;

    fn pattern_raster(width: u32, height: u32) -> Raster {
        let mut buffer = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                buffer.extend_from_slice(&[x as u8, y as u8, (x ^ y) as u8]);
            }
        }
        Raster::new(width, height, buffer).unwrap()
    }

    fn aux(kind: SubImageKind, width: u32, height: u32) -> AuxiliaryImage {
        AuxiliaryImage {
            kind,
            raster: Raster::filled(width, height, [90, 10, 10]),
        }
    }

    fn written_container(writer: &PyramidalWriter) -> Tiff {
        let levels = pyramid::build_levels(pattern_raster(600, 520), 256);
        assert_eq!(levels.len(), 2);
        let aux_images = vec![
            aux(SubImageKind::Macro, 96, 40),
            aux(SubImageKind::Label, 48, 40),
        ];
        let mut stream = Cursor::new(vec![]);
        let directories = writer.write(&mut stream, &levels, &aux_images).unwrap();
        assert_eq!(directories, 4);
        Tiff::open(&mut stream).unwrap()
    }

    #[test]
    fn directory_order_and_subfile_flags() {
        let writer = PyramidalWriter::new()
            .with_tile_size(256)
            .with_codec(Codec::Uncompressed, 80);
        let tiff = written_container(&writer);
        assert_eq!(tiff.ifds.len(), 4);

        let flags: Vec<u32> = tiff
            .ifds
            .iter()
            .map(|ifd| ifd.get_tag_value(TagId::SubfileType).unwrap())
            .collect();
        assert_eq!(flags, vec![SUBFILE_FULL, SUBFILE_REDUCED, SUBFILE_REDUCED, SUBFILE_REDUCED]);

        // Macro directly precedes label, label is last
        assert_eq!(
            tiff.ifds[2].get_tag(TagId::ImageDescription).unwrap().ascii(),
            Some("Macro".to_string())
        );
        assert_eq!(
            tiff.ifds[3].get_tag(TagId::ImageDescription).unwrap().ascii(),
            Some("Label".to_string())
        );
    }

    #[test]
    fn pyramid_directories_are_tiled_with_resolution() {
        let writer = PyramidalWriter::new()
            .with_tile_size(256)
            .with_codec(Codec::Uncompressed, 80)
            .with_pixel_spacing((0.25, 0.25));
        let tiff = written_container(&writer);

        for index in 0..2 {
            let ifd = &tiff.ifds[index];
            assert_eq!(ifd.get_tag_value::<u32>(TagId::TileWidth).unwrap(), 256);
            assert!(ifd.has_tag(TagId::TileOffsets));
            assert!(!ifd.has_tag(TagId::StripOffsets));
            assert_eq!(
                ifd.get_tag_value::<u16>(TagId::ResolutionUnit).unwrap(),
                RESOLUTION_UNIT_CM
            );
        }

        // 0.25 um/pixel is 40000 px/cm, halved per level
        let base = tiff.ifds[0].get_tag(TagId::XResolution).unwrap().rationals().unwrap()[0];
        let reduced = tiff.ifds[1].get_tag(TagId::XResolution).unwrap().rationals().unwrap()[0];
        assert_eq!(base, (4_000_000, 100));
        assert_eq!(reduced, (2_000_000, 100));

        // Level dimensions halve
        assert_eq!(tiff.ifds[0].get_tag_value::<u32>(TagId::ImageWidth).unwrap(), 600);
        assert_eq!(tiff.ifds[1].get_tag_value::<u32>(TagId::ImageWidth).unwrap(), 300);
    }

    #[test]
    fn auxiliary_directories_are_plain_strips() {
        let writer = PyramidalWriter::new()
            .with_tile_size(256)
            .with_codec(Codec::Uncompressed, 80);
        let tiff = written_container(&writer);

        for index in [2, 3] {
            let ifd = &tiff.ifds[index];
            assert!(ifd.has_tag(TagId::StripOffsets));
            assert!(ifd.has_tag(TagId::StripByteCounts));
            assert!(!ifd.has_tag(TagId::TileOffsets));
            assert!(!ifd.has_tag(TagId::TileWidth));
            assert!(!ifd.has_tag(TagId::XResolution));
            assert_eq!(
                ifd.get_tag_value::<u32>(TagId::RowsPerStrip).unwrap(),
                ifd.get_tag_value::<u32>(TagId::ImageHeight).unwrap()
            );
        }
    }

    #[test]
    fn base_tiles_round_trip() {
        let writer = PyramidalWriter::new()
            .with_tile_size(256)
            .with_codec(Codec::Deflate, 80);
        let level = pattern_raster(300, 280);
        let mut stream = Cursor::new(vec![]);
        writer.write(&mut stream, &[level.clone()], &[]).unwrap();
        let tiff = Tiff::open(&mut stream).unwrap();

        let ifd = &tiff.ifds[0];
        let offsets: Vec<u64> = ifd.get_tag_values(TagId::TileOffsets).unwrap();
        let counts: Vec<usize> = ifd.get_tag_values(TagId::TileByteCounts).unwrap();
        assert_eq!(offsets.len(), 4);

        let bytes = stream.into_inner();
        let first = &bytes[offsets[0] as usize..offsets[0] as usize + counts[0]];
        let decoded = Codec::Deflate.decode(first).unwrap();
        assert_eq!(decoded.len(), 256 * 256 * 3);
        // First row of the tile equals the first row of the level
        assert_eq!(&decoded[..256 * 3], &level.buffer()[..256 * 3]);
    }

    #[test]
    fn classic_variant_is_readable_too() {
        let writer = PyramidalWriter::new()
            .with_tile_size(256)
            .with_codec(Codec::Uncompressed, 80)
            .with_big_tiff(false);
        let mut stream = Cursor::new(vec![]);
        writer
            .write(&mut stream, &[pattern_raster(300, 300)], &[])
            .unwrap();
        let tiff = Tiff::open(&mut stream).unwrap();
        assert_eq!(tiff.variant, TiffVariant::Normal);
        assert_eq!(tiff.ifds.len(), 1);
    }

    #[test]
    fn oversized_auxiliary_falls_back_to_single_level() {
        // JPEG cannot encode a 70000 pixel wide strip, so the
        // multi-directory pass fails and the fallback path runs.
        let writer = PyramidalWriter::new()
            .with_tile_size(256)
            .with_codec(Codec::Jpeg, 80);
        let levels = vec![pattern_raster(300, 300)];
        let broken = vec![AuxiliaryImage {
            kind: SubImageKind::Macro,
            raster: Raster::filled(70_000, 2, [1; 3]),
        }];
        let path = std::env::temp_dir().join(format!(
            "slidetiff-fallback-{}.tiff",
            std::process::id()
        ));
        let summary = writer.write_file(&path, &levels, &broken).unwrap();
        assert_eq!(
            summary,
            WriteSummary {
                directories: 1,
                fallback: true
            }
        );
        let mut stream = File::open(&path).unwrap();
        let tiff = Tiff::open(&mut stream).unwrap();
        assert_eq!(tiff.ifds.len(), 1);
        assert_eq!(
            tiff.ifds[0].get_tag_value::<u32>(TagId::SubfileType).unwrap(),
            SUBFILE_FULL
        );
        std::fs::remove_file(&path).ok();
    }
}
