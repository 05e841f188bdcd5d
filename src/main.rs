use clap::{Parser, ValueEnum};
use slidetiff::{source, Codec, ConvertOptions, Converter};
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument, Level};

#[derive(Debug, Clone, ValueEnum)]
enum CompressionArg {
    /// Lossy JPEG tiles
    Jpeg,
    /// Lossless LZW
    Lzw,
    /// Lossless zlib deflate
    Deflate,
    /// No compression
    None,
}

impl From<CompressionArg> for Codec {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Jpeg => Codec::Jpeg,
            CompressionArg::Lzw => Codec::Lzw,
            CompressionArg::Deflate => Codec::Deflate,
            CompressionArg::None => Codec::Uncompressed,
        }
    }
}

#[derive(Parser)]
#[command(name = "slidetiff")]
#[command(about = "Convert whole-slide region sources to pyramidal TIFF", long_about = None)]
struct Args {
    /// Input slide (vendor backends, or synthetic:WIDTHxHEIGHT)
    input: String,

    /// Output pyramidal TIFF path
    #[arg(required_unless_present = "describe")]
    output: Option<PathBuf>,

    /// Tile size for fetching and for the output layout
    #[arg(long, default_value = "1024")]
    tile_size: u32,

    /// Maximum number of concurrent tile assembly workers
    #[arg(long, default_value = "4")]
    max_workers: usize,

    /// Number of region requests per batch
    #[arg(long, default_value = "250")]
    batch_size: usize,

    /// Background color for missing tiles
    #[arg(long, default_value = "0")]
    fill_color: u8,

    /// Tile compression
    #[arg(long, value_enum, default_value = "jpeg")]
    compression: CompressionArg,

    /// JPEG quality 1-100
    #[arg(long, default_value = "80")]
    quality: u8,

    /// Also write a 512-tile pyramid alongside the main output
    #[arg(long)]
    pyramid_512: bool,

    /// Write a metadata sidecar document next to the output
    #[arg(long)]
    sidecar: bool,

    /// Dump the directory structure of an existing container and exit
    #[arg(long)]
    describe: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn describe(path: &str) -> i32 {
    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open {path}: {e}");
            return 1;
        }
    };
    match slidetiff::tiff::Tiff::open(&mut file) {
        Ok(tiff) => {
            println!("{tiff}");
            0
        }
        Err(e) => {
            error!("Failed to parse {path}: {e:?}");
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    if args.describe {
        process::exit(describe(&args.input));
    }
    let output = args.output.expect("clap enforces output unless --describe");

    let source = match source::open(&args.input) {
        Ok(source) => source,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let options = ConvertOptions {
        tile_size: args.tile_size,
        max_workers: args.max_workers,
        batch_size: args.batch_size,
        fill_color: args.fill_color,
        codec: args.compression.into(),
        quality: args.quality,
        pyramid_512: args.pyramid_512,
        sidecar: args.sidecar,
        ..ConvertOptions::default()
    };

    let t0 = Instant::now();
    let converter = Converter::new(options);
    let run = converter
        .convert(source, &args.input, &output)
        .instrument(info_span!("convert", input = %args.input));
    match run.await {
        Ok(report) => {
            info!(
                "Wrote {} in {:.1}s ({} degraded tiles)",
                output.display(),
                t0.elapsed().as_secs_f64(),
                report.degraded_tiles
            );
        }
        Err(e) => {
            error!("Conversion failed: {e}");
            process::exit(1);
        }
    }
}
