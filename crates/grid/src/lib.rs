//! Global tile grid: indices, geographic conversions, world placement.
//!
//! The planet is covered by a fixed 36x18 grid of 10-degree tiles. This crate
//! holds the pure coordinate math: tile index <-> geographic coordinate <->
//! world position. Everything here is stateless and total; positions outside
//! the map saturate to the nearest edge tile instead of erroring.

mod index;
mod projection;

pub use index::{TileIndex, TileRange, TILES_X, TILES_Y};
pub use projection::{GeoCoord, TileGrid, TILE_DEGREES};

pub fn crate_info() -> &'static str {
    "terratile-grid v0.1.0"
}
