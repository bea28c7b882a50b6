//! sat2store command-line tool.
//!
//! Packs a directory of georeferenced rasters into a single array store,
//! writes store records back out as GeoTIFFs, and re-tiles stores into
//! fixed-size, optionally label-filtered tiles.

mod config;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use conversion::{IndexSelection, PackOptions, TileOptions};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::StoreArgs;

#[derive(Parser, Debug)]
#[command(name = "sat2store")]
#[command(about = "Pack, unpack and tile georeferenced raster datasets")]
struct Args {
    /// Log level, used when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack every matching raster below a root directory into one store
    #[command(name = "img_to_h5", visible_alias = "pack")]
    ImgToStore {
        /// Root directory searched recursively for images
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// Destination store, must not exist
        #[arg(short = 'd', long)]
        dst: PathBuf,

        /// Glob matched against image file names
        #[arg(short = 'f', long, default_value = "*.tif")]
        file_glob: String,

        /// Glob matching the label file in each image's directory
        #[arg(short = 'l', long)]
        label_glob: Option<String>,

        /// 1-based bands to keep, in order (default: all)
        #[arg(short = 'b', long, num_args = 1..)]
        bands: Vec<usize>,
    },

    /// Cut every record of a store into square tiles
    #[command(name = "tile_h5", visible_alias = "tile")]
    TileStore {
        /// Source store
        #[arg(short = 's', long)]
        src: PathBuf,

        /// Destination store, must not exist
        #[arg(short = 'd', long)]
        dst: PathBuf,

        /// Tile edge length in pixels
        #[arg(short = 't', long)]
        tile_size: usize,

        /// Pixels shared by neighbouring tiles
        #[arg(short = 'o', long, default_value_t = 0)]
        overlap: usize,

        /// Keep only tiles with at least this many positive label pixels
        #[arg(short = 'a', long)]
        target_size: Option<u64>,
    },

    /// Write store records back out as GeoTIFFs
    #[command(name = "h5_to_img", visible_alias = "unpack")]
    StoreToImg {
        /// Source store
        #[arg(short = 's', long)]
        src: PathBuf,

        /// Destination directory, created when missing
        #[arg(short = 'd', long)]
        dst: PathBuf,

        /// Record indices; negative values count from the end (default: all)
        #[arg(short = 'i', long, num_args = 1.., allow_negative_numbers = true)]
        index: Vec<i64>,

        /// Half-open range `start:end`; either side may be omitted
        #[arg(long, conflicts_with = "index", allow_hyphen_values = true)]
        range: Option<String>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    run(args)
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::ImgToStore {
            root,
            dst,
            file_glob,
            label_glob,
            bands,
        } => {
            let mut options = PackOptions::new(file_glob)
                .image_bands(bands)
                .config(args.store.load()?);
            if let Some(label_glob) = label_glob {
                options = options.label_glob(label_glob);
            }
            let summary = conversion::convert_img_to_store(&root, &dst, &options)
                .with_context(|| format!("Failed to pack {} into {}", root.display(), dst.display()))?;
            info!(
                store = %summary.destination.display(),
                records = summary.records,
                shape = %summary.shape,
                labels = summary.has_labels,
                means = ?summary.means,
                stds = ?summary.stds,
                "Done"
            );
        }
        Command::TileStore {
            src,
            dst,
            tile_size,
            overlap,
            target_size,
        } => {
            let mut options = TileOptions::new(tile_size, overlap).config(args.store.load()?);
            if let Some(target_size) = target_size {
                options = options.target_size(target_size);
            }
            let summary = conversion::tile_store(&src, &dst, &options)
                .with_context(|| format!("Failed to tile {} into {}", src.display(), dst.display()))?;
            info!(
                store = %summary.destination.display(),
                parents = summary.parents,
                records = summary.records,
                dropped = summary.dropped,
                "Done"
            );
        }
        Command::StoreToImg {
            src,
            dst,
            index,
            range,
        } => {
            let selection = selection(index, range.as_deref())?;
            let summary = conversion::convert_store_to_img(&src, &dst, &selection)
                .with_context(|| format!("Failed to unpack {}", src.display()))?;
            info!(
                destination = %dst.display(),
                files = summary.written.len(),
                "Done"
            );
        }
    }
    Ok(())
}

fn selection(index: Vec<i64>, range: Option<&str>) -> Result<IndexSelection> {
    if let Some(range) = range {
        return match IndexSelection::parse_range(range) {
            Some(selection) => Ok(selection),
            None => bail!("Invalid range '{}', expected start:end", range),
        };
    }
    Ok(match index.as_slice() {
        [] => IndexSelection::All,
        [single] => IndexSelection::Single(*single),
        _ => IndexSelection::List(index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use array_store::StoreCompression;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).expect("Failed to parse arguments")
    }

    #[test]
    fn test_command_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_pack() {
        let args = parse(&[
            "sat2store", "img_to_h5", "-r", "/data", "-d", "/out.zarr", "-f", "*_B.tif", "-l",
            "*mask*", "-b", "4", "3", "2",
        ]);
        match args.command {
            Command::ImgToStore {
                root,
                file_glob,
                label_glob,
                bands,
                ..
            } => {
                assert_eq!(root, PathBuf::from("/data"));
                assert_eq!(file_glob, "*_B.tif");
                assert_eq!(label_glob.as_deref(), Some("*mask*"));
                assert_eq!(bands, vec![4, 3, 2]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_tile_with_store_options() {
        let args = parse(&[
            "sat2store", "tile_h5", "-s", "in.zarr", "-d", "out.zarr", "-t", "256", "-o", "32",
            "-a", "50", "-c", "8", "--compression", "blosc_lz4",
        ]);
        assert_eq!(args.store.chunk_size, Some(8));
        assert_eq!(args.store.compression, Some(StoreCompression::BloscLz4));
        match args.command {
            Command::TileStore {
                tile_size,
                overlap,
                target_size,
                ..
            } => {
                assert_eq!((tile_size, overlap, target_size), (256, 32, Some(50)));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_unpack_negative_indices() {
        let args = parse(&["sat2store", "h5_to_img", "-s", "a.zarr", "-d", "out", "-i", "0", "-1"]);
        match args.command {
            Command::StoreToImg { index, range, .. } => {
                assert_eq!(index, vec![0, -1]);
                assert!(range.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_index_and_range_conflict() {
        let result = Args::try_parse_from([
            "sat2store", "h5_to_img", "-s", "a.zarr", "-d", "out", "-i", "1", "--range", "0:2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_selection() {
        assert_eq!(selection(vec![], None).unwrap(), IndexSelection::All);
        assert_eq!(selection(vec![-1], None).unwrap(), IndexSelection::Single(-1));
        assert_eq!(
            selection(vec![3, 1], None).unwrap(),
            IndexSelection::List(vec![3, 1])
        );
        assert_eq!(
            selection(vec![], Some("-2:")).unwrap(),
            IndexSelection::Range {
                start: -2,
                end: None
            }
        );
        assert!(selection(vec![], Some("bogus")).is_err());
    }
}
