use glam::Vec3;
use std::collections::BTreeMap;
use terratile_grid::TileIndex;

use crate::resolver::TileResolver;
use crate::surface::{SurfaceBuilder, SurfaceHandle};
use crate::TerrainError;

/// A tile currently resident in the cache.
///
/// The surface handle is owned exclusively by the cache; it is released
/// through the builder when the tile unloads and must not be retained past
/// that point.
#[derive(Debug, Clone)]
pub struct ResidentTile {
    pub index: TileIndex,
    pub surface: SurfaceHandle,
    pub placement: Vec3,
    pub size: Vec3,
}

/// Owner of the resident tile set.
///
/// `BTreeMap` keeps iteration deterministic. After any operation the map
/// holds at most one entry per tile index, and every entry's surface handle
/// is live in the builder.
pub struct TileCache<B: SurfaceBuilder> {
    resolver: TileResolver,
    builder: B,
    resident: BTreeMap<TileIndex, ResidentTile>,
}

impl<B: SurfaceBuilder> TileCache<B> {
    pub fn new(resolver: TileResolver, builder: B) -> Self {
        Self {
            resolver,
            builder,
            resident: BTreeMap::new(),
        }
    }

    /// Load a tile. No-op returning `Ok(false)` if it is already resident;
    /// a second call never triggers a second resolution attempt. On success
    /// the tile's surface is built and the entry inserted.
    pub fn load(&mut self, index: TileIndex) -> Result<bool, TerrainError> {
        if self.resident.contains_key(&index) {
            return Ok(false);
        }

        let resolved = self.resolver.resolve(index)?;
        let surface = self.builder.build(
            index,
            &resolved.height_grid,
            resolved.placement,
            resolved.size,
        );
        self.resident.insert(
            index,
            ResidentTile {
                index,
                surface,
                placement: resolved.placement,
                size: resolved.size,
            },
        );
        tracing::debug!(tile = %index, "tile loaded");
        Ok(true)
    }

    /// Unload a tile, releasing its surface. No-op returning `false` if the
    /// tile is not resident.
    pub fn unload(&mut self, index: TileIndex) -> bool {
        match self.resident.remove(&index) {
            Some(tile) => {
                self.builder.release(tile.surface);
                tracing::debug!(tile = %index, "tile unloaded");
                true
            }
            None => false,
        }
    }

    /// Release every resident tile. Used on full teardown.
    pub fn unload_all(&mut self) {
        let count = self.resident.len();
        for (_, tile) in std::mem::take(&mut self.resident) {
            self.builder.release(tile.surface);
        }
        tracing::debug!(count, "all tiles unloaded");
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn contains(&self, index: TileIndex) -> bool {
        self.resident.contains_key(&index)
    }

    pub fn get(&self, index: TileIndex) -> Option<&ResidentTile> {
        self.resident.get(&index)
    }

    /// Resident tile indices in deterministic order.
    pub fn resident_tiles(&self) -> Vec<TileIndex> {
        self.resident.keys().copied().collect()
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }
}
