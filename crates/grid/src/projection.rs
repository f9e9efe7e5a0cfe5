use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::index::{TileIndex, TILES_X, TILES_Y};

/// Degrees of longitude/latitude covered by one tile.
pub const TILE_DEGREES: f64 = 10.0;

/// Guards the floor against f32 round-off when a position sits exactly on a
/// tile corner. Shifts tile boundaries by ~1e-3 degrees (about 100 m).
const DEGREE_EPSILON: f64 = 1e-4;

/// Geographic coordinate: longitude in [-180, 180), latitude in (-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub longitude: f32,
    pub latitude: f32,
}

impl GeoCoord {
    pub fn new(longitude: f32, latitude: f32) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// The projection between tile indices, geographic coordinates, and world
/// positions.
///
/// Tile (0, 0) has its reference corner at 180 degrees west on the north
/// pole; each tile covers 10 degrees on both axes. World units follow the
/// original dataset: one 10-degree tile spans 1113 km (measured at the
/// equator) and 1 km maps to `world_scale` units, so the default tile is
/// 1.113 world units wide. The world origin sits at longitude 0, latitude 0.
///
/// All conversions are pure and total; out-of-range inputs saturate to the
/// nearest edge tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    /// East-west extent of one tile, in kilometers.
    pub tile_width_km: f32,
    /// North-south extent of one tile, in kilometers. Matches the width so
    /// tiles stay square in world space.
    pub tile_height_km: f32,
    /// World units per kilometer.
    pub world_scale: f32,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            tile_width_km: 1113.0,
            tile_height_km: 1113.0,
            world_scale: 0.001,
        }
    }
}

impl TileGrid {
    /// World-unit extent of one tile: x = east-west, y = north-south.
    pub fn tile_extent(&self) -> Vec2 {
        Vec2::new(
            self.tile_width_km * self.world_scale,
            self.tile_height_km * self.world_scale,
        )
    }

    /// Tile containing the given geographic coordinate, clamped to the grid.
    pub fn tile_from_geo(&self, geo: GeoCoord) -> TileIndex {
        let x = ((geo.longitude as f64 + 180.0) / TILE_DEGREES + DEGREE_EPSILON).floor() as i64;
        let y = ((90.0 - geo.latitude as f64) / TILE_DEGREES + DEGREE_EPSILON).floor() as i64;
        TileIndex::clamped(x, y)
    }

    /// Geographic coordinate of a tile's reference corner (west edge, north
    /// edge).
    pub fn geo_from_tile(&self, index: TileIndex) -> GeoCoord {
        GeoCoord {
            longitude: (-180.0 + index.x as f64 * TILE_DEGREES) as f32,
            latitude: (90.0 - index.y as f64 * TILE_DEGREES) as f32,
        }
    }

    /// World position of a tile's reference corner. The vertical component
    /// is zero; the sea-level offset is applied by the tile resolver when a
    /// tile is placed.
    pub fn world_from_tile(&self, index: TileIndex) -> Vec3 {
        let geo = self.geo_from_tile(index);
        self.world_from_geo(geo)
    }

    /// World position of a geographic coordinate at elevation zero.
    pub fn world_from_geo(&self, geo: GeoCoord) -> Vec3 {
        let extent = self.tile_extent();
        Vec3::new(
            (geo.longitude as f64 / TILE_DEGREES) as f32 * extent.x,
            0.0,
            (geo.latitude as f64 / TILE_DEGREES) as f32 * extent.y,
        )
    }

    /// Tile containing the given world position. Inverse of
    /// [`world_from_tile`](Self::world_from_tile) at tile granularity;
    /// round-tripping an arbitrary position through a tile index snaps to
    /// the containing 10-degree cell.
    pub fn tile_from_world(&self, position: Vec3) -> TileIndex {
        let extent = self.tile_extent();
        let longitude = (position.x as f64 / extent.x as f64) * TILE_DEGREES;
        let latitude = (position.z as f64 / extent.y as f64) * TILE_DEGREES;
        self.tile_from_geo(GeoCoord::new(longitude as f32, latitude as f32))
    }
}
