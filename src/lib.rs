//! Reconstruct a gigapixel raster from a tiled region source and
//! re-encode it as a pyramidal TIFF with embedded macro/label images.

mod assemble;
mod codec;
mod convert;
mod error;
mod fetch;
mod plan;
mod pyramid;
mod raster;
pub mod sidecar;
pub mod source;
pub mod tiff;
mod write;

pub use assemble::AssembleError;
pub use codec::{Codec, CodecError};
pub use convert::{ConvertOptions, ConvertReport, Converter};
pub use error::{ConvertError, ConvertResult};
pub use fetch::{FetchScheduler, FetchStats};
pub use plan::{level_of, plan_patches, ConfigError, DimensionRange, Patch};
pub use pyramid::{build_levels, DEFAULT_LEVEL_FLOOR, MIN_LEVEL_SIZE};
pub use raster::{Raster, RasterError, CHANNELS};
pub use write::{AuxiliaryImage, PyramidalWriter, WriteError, WriteSummary};
