#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the town map viewer.
//!
//! Loads the configured map layers through their source fallback chains,
//! reports which source each layer came from, and writes a ready-to-serve
//! view directory.

mod sink;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use geojson::FeatureCollection;
use town_viewer_extent::{BoundingBox, collections_bbox, feature_collection_bbox};
use town_viewer_layer::fetchers::{DEFAULT_TIMEOUT, HttpFetcher};
use town_viewer_layer::loader::{decode_collection, load_layer};
use town_viewer_layer::viewer::Viewer;
use town_viewer_layer::{LayerError, registry};
use town_viewer_layer_models::LayerConfig;

use crate::sink::DirectorySink;

#[derive(Parser)]
#[command(name = "town_viewer", about = "Town map layer loader")]
struct Cli {
    /// Layer configuration file (overrides the built-in layers)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory that local source paths are resolved against
    /// (default: `TOWN_VIEWER_DATA_DIR` or `data`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Per-source timeout in seconds (default: `TOWN_VIEWER_TIMEOUT_SECS` or 30)
    #[arg(long, global = true)]
    timeout: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured layers and their source chains
    Layers,
    /// Load a single layer and report which source was used
    Load {
        /// Layer identifier (e.g., "`zoning`")
        layer: String,
        /// Write the loaded `GeoJSON` to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compute the combined extent of local `GeoJSON` files
    Extent {
        /// `GeoJSON` `FeatureCollection` files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Load all layers and write a view directory
    View {
        /// Comma-separated list of layer IDs to load (overrides `TOWN_VIEWER_LAYERS` env var)
        #[arg(long)]
        layers: Option<String>,
        /// Output directory for layer files and `view.json`
        #[arg(long, default_value = "view")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => registry::load_config(path)?,
        None => registry::default_config(),
    };

    match args.command {
        Commands::Layers => {
            println!("{:<16} {:<24} SOURCES", "ID", "NAME");
            for layer in &config.layers {
                println!(
                    "{:<16} {:<24} {}",
                    layer.id,
                    layer.name,
                    layer.sources.len()
                );
                for (i, source) in layer.sources.iter().enumerate() {
                    println!("{:<16} {:<24}   {}. {source}", "", "", i + 1);
                }
            }
        }
        Commands::Load { layer, out } => {
            let fetcher = build_fetcher(args.data_dir.as_deref(), args.timeout, &config)?;
            let definition = config
                .layers
                .iter()
                .find(|l| l.id == layer)
                .ok_or_else(|| LayerError::Config {
                    message: format!("Unknown layer: {layer}"),
                })?;

            let start = Instant::now();
            let loaded = match load_layer(&fetcher, definition).await {
                Ok(loaded) => loaded,
                Err(LayerError::AllSourcesExhausted { layer, attempts }) => {
                    eprintln!("No data available for layer '{layer}':");
                    for attempt in &attempts {
                        eprintln!("  {attempt}");
                    }
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };

            println!(
                "{}: {} features from source {} ({}) in {:.1}s",
                loaded.id,
                loaded.feature_count(),
                loaded.source_index + 1,
                loaded.source,
                start.elapsed().as_secs_f64()
            );
            print_bounds(feature_collection_bbox(&loaded.collection));

            if let Some(path) = out {
                std::fs::write(&path, serde_json::to_string(&loaded.collection)?)?;
                log::info!("Wrote {}", path.display());
            }
        }
        Commands::Extent { files } => {
            let mut collections = Vec::with_capacity(files.len());
            for path in &files {
                let collection = read_collection(path)?;
                log::info!(
                    "{}: {} features",
                    path.display(),
                    collection.features.len()
                );
                collections.push(collection);
            }
            print_bounds(collections_bbox(&collections));
        }
        Commands::View { layers, out_dir } => {
            let fetcher = build_fetcher(args.data_dir.as_deref(), args.timeout, &config)?;

            let filter = layers.or_else(|| std::env::var("TOWN_VIEWER_LAYERS").ok());
            let selected = match filter {
                Some(filter_str) => {
                    let ids: Vec<&str> = filter_str.split(',').map(str::trim).collect();
                    registry::select_layers(config.layers, &ids)
                }
                None => config.layers,
            };

            let start = Instant::now();
            let viewer = Viewer::new(&fetcher, selected);
            let mut sink = DirectorySink::create(&out_dir)?;
            let report = viewer.run(&mut sink).await?;
            let manifest = sink.finish()?;

            for layer in &report.loaded {
                let fallback = if layer.source_index > 0 {
                    " (fallback)"
                } else {
                    ""
                };
                println!(
                    "  loaded   {:<16} {:>6} features  {}{fallback}",
                    layer.id, layer.feature_count, layer.source
                );
            }
            for layer in &report.omitted {
                println!("  omitted  {:<16} {}", layer.id, layer.reason);
            }
            print_bounds(report.fitted_bounds);

            log::info!(
                "View written to {} in {:.1}s",
                manifest.display(),
                start.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}

/// Builds the HTTP fetcher from CLI flags, environment and config.
fn build_fetcher(
    data_dir: Option<&Path>,
    timeout_secs: Option<u64>,
    config: &LayerConfig,
) -> Result<HttpFetcher, LayerError> {
    let data_dir = data_dir.map(Path::to_path_buf).unwrap_or_else(|| {
        std::env::var("TOWN_VIEWER_DATA_DIR").map_or_else(|_| PathBuf::from("data"), PathBuf::from)
    });

    let timeout = timeout_secs
        .or_else(|| {
            std::env::var("TOWN_VIEWER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

    let view_extent = config
        .view_extent
        .map(|[sw, ne]| BoundingBox::new(sw, ne));

    log::debug!(
        "data dir: {}, timeout: {timeout:?}, view extent: {view_extent:?}",
        data_dir.display()
    );

    Ok(HttpFetcher::new(data_dir, timeout)?.with_view_extent(view_extent))
}

/// Reads a local `GeoJSON` `FeatureCollection` file.
fn read_collection(path: &Path) -> Result<FeatureCollection, Box<dyn std::error::Error>> {
    let body = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&body)?;
    decode_collection(value).map_err(|e| format!("{}: {e}", path.display()).into())
}

fn print_bounds(bounds: Option<BoundingBox>) {
    match bounds {
        Some(b) => println!(
            "bounds: sw=({:.6}, {:.6}) ne=({:.6}, {:.6})",
            b.sw_lon, b.sw_lat, b.ne_lon, b.ne_lat
        ),
        None => println!("bounds: none (no polygon features)"),
    }
}
