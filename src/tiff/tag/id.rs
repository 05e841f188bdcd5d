// https://www.loc.gov/preservation/digital/formats/content/tiff_tags.shtml

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, TryFromPrimitive, Eq, Hash)]
#[repr(u16)]
pub enum TagId {
    SubfileType = 0x00FE,
    ImageWidth = 0x0100,
    ImageHeight = 0x0101,
    BitsPerSample = 0x0102,
    Compression = 0x0103,
    PhotometricInterpretation = 0x0106,
    ImageDescription = 0x010E,
    StripOffsets = 0x0111,
    SamplesPerPixel = 0x0115,
    RowsPerStrip = 0x0116,
    StripByteCounts = 0x0117,
    XResolution = 0x011A,
    YResolution = 0x011B,
    PlanarConfiguration = 0x011C,
    ResolutionUnit = 0x0128,
    Software = 0x0131,
    Predictor = 0x013D,
    TileWidth = 0x0142,
    TileLength = 0x0143,
    TileOffsets = 0x0144,
    TileByteCounts = 0x0145,
    SampleFormat = 0x0153,
}

/// NewSubfileType bit 0: this directory is a reduced-resolution version
/// of another image in the file.
pub const SUBFILE_FULL: u32 = 0;
pub const SUBFILE_REDUCED: u32 = 1;

/// ResolutionUnit value for pixels per centimeter.
pub const RESOLUTION_UNIT_CM: u16 = 3;
