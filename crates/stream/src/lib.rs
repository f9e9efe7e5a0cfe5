//! Streaming scheduler: viewer tracking, load/unload queues, per-tick budgets.
//!
//! # Invariants
//! - A tile in the resident set never sits in the load queue; a tile absent
//!   from the resident set never sits in the unload queue. The required-set
//!   diff maintains this, so a given tile index is touched by at most one
//!   in-flight operation at any instant.
//! - Queue draining is budgeted: per streaming update at most
//!   `max_tiles_per_tick` loads and twice that many unloads, so the host
//!   frame loop never stalls on a burst of work.
//! - A failed tile load is dropped, not retried; it comes back only if a
//!   later required-set recomputation asks for the tile again.
//! - Each required-set recomputation discards queued work it contradicts:
//!   pending unloads for tiles back inside the required set, pending loads
//!   for tiles that left it. Once the queues drain, the resident set equals
//!   the required set of the last processed viewer tile.
//!
//! Everything is single-threaded and happens inside `on_tick`, driven by
//! any tick source that can report elapsed time.

mod scheduler;

pub use scheduler::{StreamConfig, StreamStats, TerrainStreamer};

pub fn crate_info() -> &'static str {
    "terratile-stream v0.1.0"
}
