//! Conversion orchestration: plan, fetch, pyramid, write.

use crate::codec::Codec;
use crate::error::ConvertResult;
use crate::fetch::{FetchScheduler, DEFAULT_BATCH_TIMEOUT};
use crate::plan;
use crate::pyramid;
use crate::raster::Raster;
use crate::sidecar::{self, SidecarInfo};
use crate::source::{RegionSource, SubImageKind};
use crate::write::{AuxiliaryImage, PyramidalWriter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub tile_size: u32,
    pub max_workers: usize,
    pub batch_size: usize,
    pub fill_color: u8,
    pub codec: Codec,
    pub quality: u8,
    pub level_floor: u32,
    pub batch_timeout: Duration,
    /// Also save a 512-tile pyramid as a sibling artifact.
    pub pyramid_512: bool,
    /// Write a metadata sidecar document next to the output.
    pub sidecar: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            tile_size: 1024,
            max_workers: 4,
            batch_size: 250,
            fill_color: 0,
            codec: Codec::Jpeg,
            quality: 80,
            level_floor: pyramid::DEFAULT_LEVEL_FLOOR,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            pyramid_512: false,
            sidecar: false,
        }
    }
}

/// What a completed run produced. `degraded_tiles` distinguishes a clean
/// conversion from one with fill-colored holes.
#[derive(Debug)]
pub struct ConvertReport {
    pub width: u32,
    pub height: u32,
    pub tile_count: usize,
    pub degraded_tiles: usize,
    pub levels: usize,
    pub aux_written: usize,
    pub fallback: bool,
    pub secondary_output: Option<PathBuf>,
    pub sidecar_output: Option<PathBuf>,
}

pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Run one conversion. This call owns the source handle, so it is
    /// released on every exit path.
    pub async fn convert(
        &self,
        source: Box<dyn RegionSource>,
        input_name: &str,
        output: &Path,
    ) -> ConvertResult<ConvertReport> {
        let opts = &self.options;

        let ranges = source.dimension_ranges(0)?;
        let width = ranges[0].pixel_length()?;
        let height = ranges[1].pixel_length()?;
        let spacing = source.pixel_spacing();
        info!("Image dimensions: {width} x {height}");
        info!("Source pyramid levels: {}", source.level_count());
        info!("Pixel size: {} x {} µm", spacing.0, spacing.1);

        let tile = (opts.tile_size, opts.tile_size);
        let patches = plan::plan_patches(&ranges, tile)?;
        info!(
            "Processing {} x {} = {} tiles",
            width.div_ceil(opts.tile_size),
            height.div_ceil(opts.tile_size),
            patches.len()
        );

        let fill = [opts.fill_color; 3];
        let canvas = Arc::new(Mutex::new(Raster::filled(width, height, fill)));
        let scheduler = FetchScheduler::new(opts.batch_size, opts.max_workers)
            .with_batch_timeout(opts.batch_timeout);
        let stats = scheduler
            .fetch(source.as_ref(), &patches, canvas.clone(), tile, fill)
            .await?;
        if stats.degraded > 0 {
            warn!(
                "{} of {} tiles failed and keep the fill color",
                stats.degraded, stats.fetched
            );
        }

        let (aux_images, aux_payloads) = collect_auxiliaries(source.as_ref());

        let canvas = Arc::try_unwrap(canvas)
            .expect("assembly workers joined before the barrier returned")
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let levels = pyramid::build_levels(canvas, opts.level_floor);
        info!("Generated {} pyramid levels", levels.len());
        let level_dimensions: Vec<(u32, u32)> =
            levels.iter().map(|l| (l.width, l.height)).collect();

        let writer = PyramidalWriter::new()
            .with_tile_size(opts.tile_size)
            .with_codec(opts.codec, opts.quality)
            .with_pixel_spacing(spacing)
            .with_fill(fill);
        info!("Saving pyramidal TIFF {}", output.display());
        let summary = writer.write_file(output, &levels, &aux_images)?;

        let secondary_output = if opts.pyramid_512 {
            let path = sibling_path(output, "_512");
            let writer_512 = writer.clone().with_tile_size(512);
            writer_512.write_file(&path, &levels, &aux_images)?;
            info!("Saved secondary 512-tile pyramid {}", path.display());
            Some(path)
        } else {
            None
        };

        let sidecar_output = if opts.sidecar {
            let path = output.with_extension("xml");
            let find = |kind: SubImageKind| {
                aux_payloads
                    .iter()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, payload)| payload.as_slice())
            };
            let xml = sidecar::render(&SidecarInfo {
                source_name: input_name,
                width,
                height,
                pixel_spacing_um: spacing,
                level_dimensions: &level_dimensions,
                macro_jpeg: find(SubImageKind::Macro),
                label_jpeg: find(SubImageKind::Label),
            });
            fs::write(&path, xml)?;
            info!("Saved sidecar metadata {}", path.display());
            Some(path)
        } else {
            None
        };

        let aux_written = if summary.fallback { 0 } else { aux_images.len() };
        info!(
            "Conversion finished: {} levels, {} auxiliary images, {}/{} tiles intact{}",
            levels.len(),
            aux_written,
            stats.fetched - stats.degraded,
            stats.fetched,
            if summary.fallback {
                " (single-level fallback)"
            } else {
                ""
            }
        );

        Ok(ConvertReport {
            width,
            height,
            tile_count: stats.fetched,
            degraded_tiles: stats.degraded,
            levels: levels.len(),
            aux_written,
            fallback: summary.fallback,
            secondary_output,
            sidecar_output,
        })
    }
}

/// Decode macro and label images. A failing auxiliary image is omitted
/// with a warning; the main pyramid is unaffected.
fn collect_auxiliaries(
    source: &dyn RegionSource,
) -> (Vec<AuxiliaryImage>, Vec<(SubImageKind, Vec<u8>)>) {
    let kinds = source.sub_images();
    let mut images = vec![];
    let mut payloads = vec![];
    for kind in [SubImageKind::Macro, SubImageKind::Label] {
        if !kinds.contains(&kind) {
            continue;
        }
        match source.auxiliary_jpeg(kind) {
            Ok(Some(payload)) => match image::load_from_memory(&payload) {
                Ok(decoded) => {
                    images.push(AuxiliaryImage {
                        kind,
                        raster: Raster::from_image(&decoded),
                    });
                    payloads.push((kind, payload));
                }
                Err(e) => warn!("Failed to decode {kind:?} image, omitting it: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to read {kind:?} image, omitting it: {e}"),
        }
    }
    (images, payloads)
}

fn sanitize_stem(stem: &str) -> String {
    let mut cleaned = String::with_capacity(stem.len());
    for c in stem.chars() {
        let replaced = if "()[]{}<>|&;*?\"' ".contains(c) {
            '_'
        } else {
            c
        };
        if replaced == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(replaced);
    }
    cleaned.trim_matches('_').to_string()
}

fn sibling_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = output
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("tiff");
    output.with_file_name(format!("{}{suffix}.{extension}", sanitize_stem(stem)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_problem_characters() {
        assert_eq!(
            sanitize_stem("S114-99047-A-PAX8(MRQ50)"),
            "S114-99047-A-PAX8_MRQ50"
        );
        assert_eq!(sanitize_stem("a  b(c)[d]"), "a_b_c_d");
        assert_eq!(sanitize_stem("plain-name"), "plain-name");
    }

    #[test]
    fn sibling_paths_keep_directory_and_extension() {
        let path = Path::new("/data/out/slide (1).tiff");
        assert_eq!(
            sibling_path(path, "_512"),
            Path::new("/data/out/slide_1_512.tiff")
        );
    }
}
