// https://en.wikipedia.org/wiki/TIFF#TIFF_Compression_Tag
// https://exiftool.org/TagNames/EXIF.html#Compression

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use num_enum::{FromPrimitive, IntoPrimitive};
use salzweg::decoder::{DecodingError, TiffStyleDecoder};
use salzweg::encoder::{EncodingError, TiffStyleEncoder};
use std::io::{self, Read, Write};

#[derive(Debug)]
pub enum CodecError {
    LzwDecode(DecodingError),
    LzwEncode(EncodingError),
    Jpeg(image::ImageError),
    IoError(io::Error),
    NotSupported(Codec),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        CodecError::IoError(e)
    }
}

impl From<image::ImageError> for CodecError {
    fn from(e: image::ImageError) -> Self {
        CodecError::Jpeg(e)
    }
}

/// Compression scheme for tile and strip payloads. Discriminants are the
/// TIFF Compression tag values.
#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Codec {
    Uncompressed = 1,
    Lzw = 5,
    Jpeg = 7,
    Deflate = 8,

    #[num_enum(default)]
    Unknown = 0,
}

impl Codec {
    /// Compress one RGB8 block. JPEG blocks are self-contained JFIF
    /// streams, which is what new-style TIFF JPEG directories expect.
    pub fn encode(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Uncompressed => Ok(rgb.to_vec()),
            Self::Lzw => TiffStyleEncoder::encode_to_vec(rgb).map_err(CodecError::LzwEncode),
            Self::Deflate => {
                let mut encoder = ZlibEncoder::new(vec![], flate2::Compression::default());
                encoder.write_all(rgb)?;
                Ok(encoder.finish()?)
            }
            Self::Jpeg => {
                let mut buf = vec![];
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                encoder.encode(rgb, width, height, ExtendedColorType::Rgb8)?;
                Ok(buf)
            }
            other => Err(CodecError::NotSupported(*other)),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Uncompressed => Ok(bytes.to_vec()),
            Self::Lzw => TiffStyleDecoder::decode_to_vec(bytes).map_err(CodecError::LzwDecode),
            Self::Deflate => {
                let mut buf = vec![];
                ZlibDecoder::new(bytes).read_to_end(&mut buf)?;
                Ok(buf)
            }
            Self::Jpeg => Ok(image::load_from_memory(bytes)?.into_rgb8().into_raw()),
            other => Err(CodecError::NotSupported(*other)),
        }
    }
}
