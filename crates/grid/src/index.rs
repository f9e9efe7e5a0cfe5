use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of tile columns covering 360 degrees of longitude.
pub const TILES_X: u32 = 36;
/// Number of tile rows covering 180 degrees of latitude.
pub const TILES_Y: u32 = 18;

/// Index of one tile in the global 36x18 grid.
///
/// Column 0 starts at 180 degrees west; row 0 starts at the north pole.
/// Used as the cache key throughout the streaming pipeline, so it derives
/// `Ord` for deterministic `BTreeMap` iteration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
}

impl TileIndex {
    /// Create a tile index. Debug-asserts the 36x18 domain.
    pub fn new(x: u32, y: u32) -> Self {
        debug_assert!(x < TILES_X, "tile x {x} out of range");
        debug_assert!(y < TILES_Y, "tile y {y} out of range");
        Self { x, y }
    }

    /// Create a tile index from possibly out-of-range components,
    /// saturating into the valid domain.
    pub fn clamped(x: i64, y: i64) -> Self {
        Self {
            x: x.clamp(0, TILES_X as i64 - 1) as u32,
            y: y.clamp(0, TILES_Y as i64 - 1) as u32,
        }
    }

    /// All in-domain tiles within Chebyshev distance `radius` of `self`,
    /// including `self`. Out-of-map neighbors are skipped, not clamped, so
    /// a corner tile with radius 1 yields a 2x2 block.
    pub fn chebyshev_neighbors(self, radius: i32) -> Vec<TileIndex> {
        let mut tiles = Vec::new();
        let (cx, cy) = (self.x as i64, self.y as i64);
        let r = radius.max(0) as i64;
        for x in cx - r..=cx + r {
            for y in cy - r..=cy + r {
                if x >= 0 && x < TILES_X as i64 && y >= 0 && y < TILES_Y as i64 {
                    tiles.push(TileIndex::new(x as u32, y as u32));
                }
            }
        }
        tiles
    }

    /// File-name stem used by the raw elevation files: `tile_{x}_{y}`.
    pub fn raw_stem(self) -> String {
        format!("tile_{}_{}", self.x, self.y)
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Inclusive rectangular range of tile indices, used by the batch
/// converter's range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub min: TileIndex,
    pub max: TileIndex,
}

impl TileRange {
    /// Range covering the entire grid.
    pub fn full() -> Self {
        Self {
            min: TileIndex::new(0, 0),
            max: TileIndex::new(TILES_X - 1, TILES_Y - 1),
        }
    }

    pub fn contains(&self, index: TileIndex) -> bool {
        index.x >= self.min.x
            && index.x <= self.max.x
            && index.y >= self.min.y
            && index.y <= self.max.y
    }
}
