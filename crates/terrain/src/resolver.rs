use glam::Vec3;
use std::io;
use std::path::PathBuf;
use terratile_grid::{TileGrid, TileIndex};
use terratile_heightmap::{self as heightmap, HeightGrid};

use crate::TerrainError;

/// Logical lookup key for a tile's precomputed asset: `TerrainData_{x}_{y}`.
pub fn asset_key(index: TileIndex) -> String {
    format!("TerrainData_{}_{}", index.x, index.y)
}

/// The precomputed-asset collaborator: pre-decoded height grids looked up by
/// string key.
///
/// A corrupt or unreadable asset is reported as a miss (implementations log
/// the details), so the resolver always falls back to raw decode and the
/// asset tier can never make a tile less available than raw-only operation.
pub trait AssetSource {
    fn lookup(&self, key: &str) -> Option<HeightGrid>;
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Heightmap resolution of the raw dataset.
    pub resolution: usize,
    /// Directory holding the raw elevation files (`tile_{x}_{y}.raw`).
    pub raw_dir: PathBuf,
    /// Vertical extent of a tile in world units; raw sample 65535 maps to
    /// this height above the tile base.
    pub max_terrain_height: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolution: heightmap::DEFAULT_RESOLUTION,
            raw_dir: PathBuf::from("terrains"),
            max_terrain_height: 1.0,
        }
    }
}

/// A resolved tile: decoded heights plus world placement and sizing, ready
/// for a surface builder.
#[derive(Debug, Clone)]
pub struct ResolvedTile {
    pub height_grid: HeightGrid,
    /// World position of the tile's reference corner. The vertical component
    /// is the sea-level offset, so sample 32768 sits at world y = 0.
    pub placement: Vec3,
    /// World-unit extent: x = width, y = max terrain height, z = depth.
    pub size: Vec3,
}

/// Turns a tile index into loaded terrain data.
///
/// Two-tier policy, in this order:
/// 1. precomputed asset lookup by [`asset_key`] (skips raw decode);
/// 2. raw elevation file under `raw_dir`, decoded on the spot.
///
/// The ordering is a performance choice, not a correctness one: both tiers
/// produce the same placement and sizing.
pub struct TileResolver {
    config: ResolverConfig,
    grid: TileGrid,
    assets: Option<Box<dyn AssetSource>>,
}

impl TileResolver {
    pub fn new(config: ResolverConfig, grid: TileGrid) -> Self {
        Self {
            config,
            grid,
            assets: None,
        }
    }

    /// Attach a precomputed-asset source as the first resolution tier.
    pub fn with_assets(mut self, assets: Box<dyn AssetSource>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a tile index into terrain data.
    pub fn resolve(&self, index: TileIndex) -> Result<ResolvedTile, TerrainError> {
        if let Some(assets) = &self.assets {
            let key = asset_key(index);
            if let Some(height_grid) = assets.lookup(&key) {
                tracing::debug!(tile = %index, key, "resolved tile from precomputed asset");
                return Ok(self.place(index, height_grid));
            }
        }

        let path = self.config.raw_dir.join(format!("{}.raw", index.raw_stem()));
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TerrainError::NotFound(index));
            }
            Err(source) => return Err(TerrainError::Io { index, source }),
        };
        let height_grid = heightmap::decode(&bytes, self.config.resolution)
            .map_err(|source| TerrainError::Format { index, source })?;
        tracing::debug!(tile = %index, path = %path.display(), "resolved tile from raw elevation file");
        Ok(self.place(index, height_grid))
    }

    fn place(&self, index: TileIndex, height_grid: HeightGrid) -> ResolvedTile {
        let mut placement = self.grid.world_from_tile(index);
        placement.y = heightmap::sea_level_offset(self.config.max_terrain_height);
        let extent = self.grid.tile_extent();
        ResolvedTile {
            height_grid,
            placement,
            size: Vec3::new(extent.x, self.config.max_terrain_height, extent.y),
        }
    }
}
