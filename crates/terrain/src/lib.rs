//! Tile resolution and the resident-tile cache.
//!
//! The resolver turns a tile index into decoded terrain data via a two-tier
//! strategy: a precomputed-asset lookup first, raw elevation decode as the
//! always-available fallback. The cache owns the set of currently resident
//! tiles and the surface handles built for them.
//!
//! # Invariants
//! - At most one resident entry per tile index.
//! - Surface handles are owned exclusively by the cache; unloading releases
//!   them through the builder that issued them.
//! - Per-tile failures never escape as panics; callers get a
//!   [`TerrainError`] and decide what to log.

mod cache;
mod resolver;
mod surface;

pub use cache::{ResidentTile, TileCache};
pub use resolver::{asset_key, AssetSource, ResolvedTile, ResolverConfig, TileResolver};
pub use surface::{NullSurfaceBuilder, SurfaceBuilder, SurfaceHandle};

use terratile_grid::TileIndex;
use terratile_heightmap::DecodeError;

/// Errors from resolving or loading a single tile.
///
/// All of these are fatal to the one tile and harmless to the system; the
/// streaming loop logs and moves on. `Io` behaves like `NotFound` for
/// control flow but stays distinguishable in logs.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    #[error("no terrain data for tile {0}")]
    NotFound(TileIndex),
    #[error("raw decode failed for tile {index}: {source}")]
    Format {
        index: TileIndex,
        #[source]
        source: DecodeError,
    },
    #[error("IO error reading tile {index}: {source}")]
    Io {
        index: TileIndex,
        #[source]
        source: std::io::Error,
    },
}

pub fn crate_info() -> &'static str {
    "terratile-terrain v0.1.0"
}
