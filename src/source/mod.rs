//! Region source capability layer.
//!
//! A [`RegionSource`] is the handle to an opened slide: it reports the
//! sub-images present, serves dimension ranges per resolution level, and
//! answers batched region requests through a wait-for-ready protocol.
//! Vendor SDK dialects (the legacy and current naming conventions) are
//! adapted behind this one trait at open time; nothing downstream
//! branches on dialect. The handle is released by `Drop` on every exit
//! path of a conversion run.

use crate::plan::{DimensionRange, Patch};
use std::fmt::Display;
use std::time::Duration;

mod synthetic;

pub use synthetic::SyntheticSource;

#[derive(Debug)]
pub enum SourceError {
    Open(String),
    Unsupported(String),
    Request(String),
    Timeout(Duration),
    MissingImage(SubImageKind),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Open(detail) => write!(f, "failed to open source: {detail}"),
            SourceError::Unsupported(spec) => write!(f, "no source backend for {spec:?}"),
            SourceError::Request(detail) => write!(f, "region request failed: {detail}"),
            SourceError::Timeout(limit) => {
                write!(f, "source produced no region within {limit:?}")
            }
            SourceError::MissingImage(kind) => write!(f, "source has no {kind:?} image"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubImageKind {
    Wsi,
    Macro,
    Label,
}

/// A completed region: the realized pixel extent (derived from the
/// source's inclusive coordinate range, which may differ from the
/// request) and its interleaved RGB samples.
#[derive(Clone, Debug)]
pub struct FetchedRegion {
    pub grid: (u32, u32),
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Outstanding regions of one batched request.
pub trait PendingRegions: Send {
    fn remaining(&self) -> usize;

    /// Block until at least one region is ready or the timeout expires.
    /// Ready regions are removed from the pending set; order is the
    /// source's completion order, not request order.
    fn wait_any(&mut self, timeout: Duration) -> Result<Vec<FetchedRegion>, SourceError>;
}

pub trait RegionSource: Send + Sync {
    fn sub_images(&self) -> Vec<SubImageKind>;

    fn level_count(&self) -> u32;

    fn dimension_ranges(&self, level: u32) -> Result<[DimensionRange; 2], SourceError>;

    /// Micrometers per pixel at full resolution.
    fn pixel_spacing(&self) -> (f64, f64);

    /// Issue one multi-region request. Pixels outside the source's data
    /// envelopes come back as `fill`.
    fn request_regions(
        &self,
        patches: &[Patch],
        fill: [u8; 3],
    ) -> Result<Box<dyn PendingRegions>, SourceError>;

    /// The embedded encoded payload (typically JPEG) of an auxiliary
    /// image, if the source carries one.
    fn auxiliary_jpeg(&self, kind: SubImageKind) -> Result<Option<Vec<u8>>, SourceError>;
}

/// Open a region source. `synthetic:WIDTHxHEIGHT` builds the in-crate
/// pattern source; anything else requires a vendor backend.
pub fn open(spec: &str) -> Result<Box<dyn RegionSource>, SourceError> {
    if let Some(dims) = spec.strip_prefix("synthetic:") {
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| SourceError::Open(format!("bad synthetic dimensions {dims:?}")))?;
        let width: u32 = w
            .parse()
            .map_err(|_| SourceError::Open(format!("bad synthetic width {w:?}")))?;
        let height: u32 = h
            .parse()
            .map_err(|_| SourceError::Open(format!("bad synthetic height {h:?}")))?;
        return Ok(Box::new(
            SyntheticSource::new(width, height).with_auxiliary_images(),
        ));
    }
    Err(SourceError::Unsupported(spec.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_parses_synthetic_specs() {
        let source = open("synthetic:640x480").unwrap();
        let ranges = source.dimension_ranges(0).unwrap();
        assert_eq!(ranges[0].pixel_length().unwrap(), 640);
        assert_eq!(ranges[1].pixel_length().unwrap(), 480);
    }

    #[test]
    fn open_rejects_foreign_paths() {
        assert!(matches!(
            open("slide.isyntax"),
            Err(SourceError::Unsupported(_))
        ));
        assert!(matches!(open("synthetic:axb"), Err(SourceError::Open(_))));
    }
}
