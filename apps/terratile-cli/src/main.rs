use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

use terratile_assets::TerrainAssetStore;
use terratile_grid::{TileGrid, TileIndex, TileRange, TILES_X, TILES_Y};
use terratile_heightmap::{HeightGrid, DEFAULT_RESOLUTION, SEA_LEVEL};
use terratile_stream::{StreamConfig, TerrainStreamer};
use terratile_terrain::{NullSurfaceBuilder, ResolverConfig, TileCache, TileResolver};

#[derive(Parser)]
#[command(name = "terratile", about = "CLI tool for terrain tile operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Decode a raw elevation file and print summary statistics
    Inspect {
        /// Path to the raw elevation file
        file: PathBuf,
        /// Heightmap resolution of the file
        #[arg(short, long, default_value_t = DEFAULT_RESOLUTION)]
        resolution: usize,
    },
    /// Synthesize a raw elevation tile
    Gen {
        /// Output directory
        dir: PathBuf,
        /// Tile index as X,Y
        #[arg(short, long, value_parser = parse_tile)]
        tile: TileIndex,
        /// Heightmap resolution to synthesize
        #[arg(short, long, default_value_t = DEFAULT_RESOLUTION)]
        resolution: usize,
        /// Terrain profile
        #[arg(short, long, value_enum, default_value = "flat")]
        profile: Profile,
    },
    /// Batch-convert raw elevation files into a precomputed asset store
    Convert {
        /// Directory holding tile_X_Y.raw files
        src: PathBuf,
        /// Asset store root directory
        dest: PathBuf,
        /// Heightmap resolution of the raw files
        #[arg(short, long, default_value_t = DEFAULT_RESOLUTION)]
        resolution: usize,
        /// Only convert tiles at or after this index (X,Y)
        #[arg(long, value_parser = parse_tile)]
        min: Option<TileIndex>,
        /// Only convert tiles at or before this index (X,Y)
        #[arg(long, value_parser = parse_tile)]
        max: Option<TileIndex>,
    },
    /// Drive the streamer with a moving viewer and print per-tick stats
    Simulate {
        /// Number of streaming ticks to run
        #[arg(short, long, default_value = "20")]
        ticks: u64,
        /// Directory holding raw elevation files
        #[arg(long, default_value = "terrains")]
        raw_dir: PathBuf,
        /// Optional precomputed asset store to try first
        #[arg(long)]
        assets: Option<PathBuf>,
        /// Load radius in tiles (1-5)
        #[arg(short = 'r', long, default_value = "1")]
        radius: i32,
        /// Tile load budget per tick
        #[arg(short, long, default_value = "1")]
        budget: usize,
        /// Resolve loads in the same tick instead of staging them
        #[arg(long)]
        sync: bool,
        /// Viewer speed in tiles per tick (eastward)
        #[arg(short, long, default_value = "0.25")]
        speed: f32,
        /// Heightmap resolution of the dataset
        #[arg(long, default_value_t = DEFAULT_RESOLUTION)]
        resolution: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    /// Every sample at sea level
    Flat,
    /// Linear west-to-east ramp from 0 to 1
    Gradient,
    /// Radial bump peaking at the tile center
    Island,
}

fn parse_tile(s: &str) -> Result<TileIndex, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x: u32 = x.trim().parse().map_err(|_| format!("bad tile x '{x}'"))?;
    let y: u32 = y.trim().parse().map_err(|_| format!("bad tile y '{y}'"))?;
    if x >= TILES_X || y >= TILES_Y {
        return Err(format!(
            "tile ({x}, {y}) outside the {TILES_X}x{TILES_Y} grid"
        ));
    }
    Ok(TileIndex::new(x, y))
}

fn synthesize(profile: Profile, resolution: usize) -> HeightGrid {
    let r = resolution;
    match profile {
        Profile::Flat => HeightGrid::filled(r, SEA_LEVEL),
        Profile::Gradient => {
            let samples = (0..r * r).map(|i| (i % r) as f32 / (r - 1) as f32).collect();
            HeightGrid::from_samples(r, samples)
        }
        Profile::Island => {
            let center = (r - 1) as f32 / 2.0;
            let samples = (0..r * r)
                .map(|i| {
                    let row = (i / r) as f32;
                    let col = (i % r) as f32;
                    let d = ((row - center).powi(2) + (col - center).powi(2)).sqrt() / center;
                    (SEA_LEVEL + (1.0 - SEA_LEVEL) * (1.0 - d.min(1.0))).clamp(0.0, 1.0)
                })
                .collect();
            HeightGrid::from_samples(r, samples)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("terratile-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("grid: {}", terratile_grid::crate_info());
            println!("heightmap: {}", terratile_heightmap::crate_info());
            println!("terrain: {}", terratile_terrain::crate_info());
            println!("assets: {}", terratile_assets::crate_info());
            println!("stream: {}", terratile_stream::crate_info());
        }
        Commands::Inspect { file, resolution } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let grid = terratile_heightmap::decode(&bytes, resolution)
                .with_context(|| format!("decoding {}", file.display()))?;

            let r = grid.resolution();
            println!("{}: {r}x{r}, {} bytes", file.display(), bytes.len());
            println!(
                "heights: min={:.4} max={:.4} mean={:.4} (sea level {SEA_LEVEL:.4})",
                grid.min(),
                grid.max(),
                grid.mean()
            );
            // Row 0 of the decoded grid is the southern edge.
            println!(
                "corners: nw={:.4} ne={:.4} sw={:.4} se={:.4}",
                grid.get(r - 1, 0),
                grid.get(r - 1, r - 1),
                grid.get(0, 0),
                grid.get(0, r - 1)
            );
        }
        Commands::Gen {
            dir,
            tile,
            resolution,
            profile,
        } => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            let grid = synthesize(profile, resolution);
            let bytes = terratile_heightmap::encode(&grid);
            let path = dir.join(format!("{}.raw", tile.raw_stem()));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {} ({} bytes)", path.display(), bytes.len());
        }
        Commands::Convert {
            src,
            dest,
            resolution,
            min,
            max,
        } => {
            let range = match (min, max) {
                (None, None) => None,
                (min, max) => {
                    let full = TileRange::full();
                    Some(TileRange {
                        min: min.unwrap_or(full.min),
                        max: max.unwrap_or(full.max),
                    })
                }
            };
            let store = TerrainAssetStore::open(&dest)
                .with_context(|| format!("opening asset store at {}", dest.display()))?;
            let report =
                terratile_assets::convert_raw_directory(&src, &store, resolution, range)
                    .with_context(|| format!("converting {}", src.display()))?;
            println!(
                "converted {} / skipped {} / failed {} ({} files total)",
                report.converted,
                report.skipped,
                report.failed,
                report.total()
            );
        }
        Commands::Simulate {
            ticks,
            raw_dir,
            assets,
            radius,
            budget,
            sync,
            speed,
            resolution,
        } => {
            let grid = TileGrid::default();
            let mut resolver = TileResolver::new(
                ResolverConfig {
                    resolution,
                    raw_dir,
                    max_terrain_height: 1.0,
                },
                grid,
            );
            if let Some(root) = assets {
                let store = TerrainAssetStore::open(&root)
                    .with_context(|| format!("opening asset store at {}", root.display()))?;
                resolver = resolver.with_assets(Box::new(store));
            }

            let cache = TileCache::new(resolver, NullSurfaceBuilder::new());
            let config = StreamConfig {
                load_radius: radius,
                tick_interval: Duration::ZERO,
                max_tiles_per_tick: budget,
                async_loading: !sync,
            };
            let mut streamer = TerrainStreamer::new(config, grid, cache);

            let extent = grid.tile_extent();
            let start = grid.world_from_tile(TileIndex::new(0, TILES_Y / 2))
                + Vec3::new(0.5 * extent.x, 0.0, -0.5 * extent.y);

            println!(
                "simulating {ticks} ticks: radius={radius}, budget={budget}, mode={}, speed={speed} tiles/tick",
                if sync { "sync" } else { "async" }
            );
            for tick in 0..ticks {
                let viewer = start + Vec3::new(tick as f32 * speed * extent.x, 0.0, 0.0);
                streamer.set_viewer(viewer);
                streamer.on_tick(Duration::ZERO);

                let stats = streamer.stats();
                println!(
                    "tick {tick:>3}: tile={} loaded={} unloaded={} resident={} queued={}+{} staged={} ({:?})",
                    streamer
                        .current_tile()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".into()),
                    stats.tiles_loaded_this_tick,
                    stats.tiles_unloaded_this_tick,
                    stats.resident_tiles,
                    streamer.load_queue_len(),
                    streamer.unload_queue_len(),
                    streamer.staged_load_len(),
                    stats.tick_time
                );
            }
            streamer.release();
            println!("released: resident={}", streamer.resident_count());
        }
    }

    Ok(())
}
