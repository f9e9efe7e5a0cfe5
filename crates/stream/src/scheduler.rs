use glam::Vec3;
use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use terratile_grid::{TileGrid, TileIndex};
use terratile_terrain::{SurfaceBuilder, TerrainError, TileCache};

/// Streaming configuration: how far around the viewer to keep terrain
/// resident and how much work one tick may do.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Chebyshev radius (in tiles) around the viewer tile to keep resident.
    /// Clamped to 1..=5 on construction.
    pub load_radius: i32,
    /// Wall-clock interval between streaming updates.
    pub tick_interval: Duration,
    /// Maximum number of tiles dequeued for load per update. Unloads are
    /// cheap and get twice this budget.
    pub max_tiles_per_tick: usize,
    /// Split each load across two updates (dequeue now, resolve next
    /// update) so a single tick never pays for both queue management and a
    /// full decode of every dequeued tile.
    pub async_loading: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            load_radius: 1,
            tick_interval: Duration::from_secs(1),
            max_tiles_per_tick: 1,
            async_loading: true,
        }
    }
}

/// Per-update streaming statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub tiles_loaded_this_tick: usize,
    pub tiles_unloaded_this_tick: usize,
    pub resident_tiles: usize,
    pub tick_time: Duration,
}

/// The streaming controller.
///
/// Owns the tile cache and both work queues. Collaborators construct it once
/// and drive it from any tick source by calling
/// [`on_tick`](TerrainStreamer::on_tick); there is no ambient global state.
pub struct TerrainStreamer<B: SurfaceBuilder> {
    config: StreamConfig,
    grid: TileGrid,
    cache: TileCache<B>,
    viewer: Option<Vec3>,
    /// Tile the viewer was last seen in; `None` forces a required-set
    /// recomputation on the next update.
    last_viewer_tile: Option<TileIndex>,
    current_tile: Option<TileIndex>,
    load_queue: VecDeque<TileIndex>,
    unload_queue: VecDeque<TileIndex>,
    /// First-half loads dequeued under `async_loading`, resolved at the
    /// start of the next update.
    staged_loads: VecDeque<TileIndex>,
    accumulated: Duration,
    stats: StreamStats,
}

impl<B: SurfaceBuilder> TerrainStreamer<B> {
    pub fn new(mut config: StreamConfig, grid: TileGrid, cache: TileCache<B>) -> Self {
        config.load_radius = config.load_radius.clamp(1, 5);
        Self {
            config,
            grid,
            cache,
            viewer: None,
            last_viewer_tile: None,
            current_tile: None,
            load_queue: VecDeque::new(),
            unload_queue: VecDeque::new(),
            staged_loads: VecDeque::new(),
            accumulated: Duration::ZERO,
            stats: StreamStats::default(),
        }
    }

    /// Update the viewer's world position. Takes effect on the next update.
    pub fn set_viewer(&mut self, position: Vec3) {
        self.viewer = Some(position);
    }

    /// Detach the viewer; updates become no-ops until one is set again.
    pub fn clear_viewer(&mut self) {
        self.viewer = None;
    }

    /// Advance the streamer by `dt` of wall-clock time. Runs one streaming
    /// update when the accumulated time reaches the configured interval.
    /// Returns whether an update ran.
    pub fn on_tick(&mut self, dt: Duration) -> bool {
        self.accumulated += dt;
        if self.accumulated < self.config.tick_interval {
            return false;
        }
        self.accumulated = Duration::ZERO;
        self.run_update();
        true
    }

    fn run_update(&mut self) {
        // No viewer, no work: queues keep their contents for later.
        let Some(viewer) = self.viewer else {
            return;
        };
        let _span = tracing::info_span!("stream_update").entered();
        let start = Instant::now();

        self.track_viewer(viewer);
        let (loaded, unloaded) = self.process_queues();

        self.stats = StreamStats {
            tiles_loaded_this_tick: loaded,
            tiles_unloaded_this_tick: unloaded,
            resident_tiles: self.cache.resident_count(),
            tick_time: start.elapsed(),
        };
        tracing::trace!(
            loaded,
            unloaded,
            resident = self.cache.resident_count(),
            load_queue = self.load_queue.len(),
            unload_queue = self.unload_queue.len(),
            "stream update complete"
        );
    }

    /// Detect viewer tile changes; recompute the required set only on a
    /// crossing (edge-triggered).
    fn track_viewer(&mut self, viewer: Vec3) {
        let new_tile = self.grid.tile_from_world(viewer);
        if self.last_viewer_tile == Some(new_tile) {
            return;
        }
        self.current_tile = Some(new_tile);
        self.last_viewer_tile = Some(new_tile);
        tracing::debug!(tile = %new_tile, "viewer crossed into tile");
        self.update_required_tiles(new_tile);
    }

    /// Diff the required set against the resident set and fill the queues.
    /// Skips anything already queued or staged, so no tile can appear in
    /// both directions of work at once.
    fn update_required_tiles(&mut self, center: TileIndex) {
        let required: BTreeSet<TileIndex> = center
            .chebyshev_neighbors(self.config.load_radius)
            .into_iter()
            .collect();

        // Queued work from an earlier viewer tile may contradict the new
        // required set: a tile that re-entered it must not be torn down,
        // and pending loads for tiles that left it are stale. Drop both
        // before filling the queues, otherwise an oscillating viewer can
        // unload a required tile with nothing ever bringing it back.
        self.unload_queue.retain(|t| !required.contains(t));
        self.load_queue.retain(|t| required.contains(t));
        self.staged_loads.retain(|t| required.contains(t));

        for tile in self.cache.resident_tiles() {
            if !required.contains(&tile) && !self.unload_queue.contains(&tile) {
                self.unload_queue.push_back(tile);
            }
        }
        for &tile in &required {
            if !self.cache.contains(tile)
                && !self.load_queue.contains(&tile)
                && !self.staged_loads.contains(&tile)
            {
                self.load_queue.push_back(tile);
            }
        }
    }

    /// Drain the queues under the per-tick budget.
    fn process_queues(&mut self) -> (usize, usize) {
        let mut loaded = 0;

        // Second half of the split loads staged last update. These already
        // consumed budget when they were dequeued.
        while let Some(tile) = self.staged_loads.pop_front() {
            loaded += self.try_load(tile);
        }

        // Unloads are cheap: double budget.
        let mut unloaded = 0;
        let mut processed = 0;
        while processed < self.config.max_tiles_per_tick * 2 {
            let Some(tile) = self.unload_queue.pop_front() else {
                break;
            };
            processed += 1;
            if self.cache.unload(tile) {
                unloaded += 1;
            }
        }

        let mut dequeued = 0;
        while dequeued < self.config.max_tiles_per_tick {
            let Some(tile) = self.load_queue.pop_front() else {
                break;
            };
            dequeued += 1;
            if self.config.async_loading {
                self.staged_loads.push_back(tile);
            } else {
                loaded += self.try_load(tile);
            }
        }

        (loaded, unloaded)
    }

    /// Load one tile, converting per-tile failures into log lines. Failed
    /// tiles are dropped from the queue; only a fresh required-set diff can
    /// bring them back.
    fn try_load(&mut self, tile: TileIndex) -> usize {
        match self.cache.load(tile) {
            Ok(true) => 1,
            Ok(false) => 0,
            Err(TerrainError::NotFound(_)) => {
                tracing::debug!(tile = %tile, "no terrain data, tile stays unresident");
                0
            }
            Err(e) => {
                tracing::warn!(tile = %tile, error = %e, "tile load failed");
                0
            }
        }
    }

    /// Debug/test path: recompute the required set from scratch and drain
    /// every queue to completion, ignoring the per-tick budget.
    pub fn force_refresh(&mut self) {
        self.last_viewer_tile = None;
        if let Some(viewer) = self.viewer {
            self.track_viewer(viewer);
        }
        while let Some(tile) = self.staged_loads.pop_front() {
            self.try_load(tile);
        }
        while let Some(tile) = self.unload_queue.pop_front() {
            self.cache.unload(tile);
        }
        while let Some(tile) = self.load_queue.pop_front() {
            self.try_load(tile);
        }
        tracing::debug!(
            resident = self.cache.resident_count(),
            "forced full refresh"
        );
    }

    /// Full teardown: unload every resident tile and discard all queued
    /// work. The streamer stays usable afterwards.
    pub fn release(&mut self) {
        self.cache.unload_all();
        self.load_queue.clear();
        self.unload_queue.clear();
        self.staged_loads.clear();
        self.last_viewer_tile = None;
        self.current_tile = None;
    }

    // Diagnostics queries; none of these are correctness-critical.

    pub fn resident_count(&self) -> usize {
        self.cache.resident_count()
    }

    pub fn load_queue_len(&self) -> usize {
        self.load_queue.len()
    }

    pub fn unload_queue_len(&self) -> usize {
        self.unload_queue.len()
    }

    /// Loads dequeued but not yet resolved (second half pending).
    pub fn staged_load_len(&self) -> usize {
        self.staged_loads.len()
    }

    /// Tile the viewer was last seen in.
    pub fn current_tile(&self) -> Option<TileIndex> {
        self.current_tile
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn cache(&self) -> &TileCache<B> {
        &self.cache
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use terratile_grid::TileGrid;
    use terratile_heightmap::HeightGrid;
    use terratile_terrain::{
        AssetSource, NullSurfaceBuilder, ResolverConfig, TileCache, TileResolver,
    };

    /// Asset source that answers every key, so every tile is loadable
    /// without touching the filesystem.
    struct AlwaysAssets;

    impl AssetSource for AlwaysAssets {
        fn lookup(&self, _key: &str) -> Option<HeightGrid> {
            Some(HeightGrid::filled(2, 0.5))
        }
    }

    fn streamer(config: StreamConfig) -> TerrainStreamer<NullSurfaceBuilder> {
        streamer_with_assets(config, true)
    }

    fn streamer_with_assets(
        config: StreamConfig,
        assets: bool,
    ) -> TerrainStreamer<NullSurfaceBuilder> {
        let resolver_config = ResolverConfig {
            resolution: 2,
            raw_dir: std::env::temp_dir().join("terratile-stream-test-nonexistent"),
            max_terrain_height: 1.0,
        };
        let grid = TileGrid::default();
        let mut resolver = TileResolver::new(resolver_config, grid);
        if assets {
            resolver = resolver.with_assets(Box::new(AlwaysAssets));
        }
        let cache = TileCache::new(resolver, NullSurfaceBuilder::new());
        TerrainStreamer::new(config, grid, cache)
    }

    /// World position safely inside the given tile (half a tile east and
    /// south of its reference corner).
    fn pos_in(tile: TileIndex) -> Vec3 {
        let grid = TileGrid::default();
        let extent = grid.tile_extent();
        grid.world_from_tile(tile) + Vec3::new(0.5 * extent.x, 0.0, -0.5 * extent.y)
    }

    fn sync_config(load_radius: i32, budget: usize) -> StreamConfig {
        StreamConfig {
            load_radius,
            tick_interval: Duration::ZERO,
            max_tiles_per_tick: budget,
            async_loading: false,
        }
    }

    fn block(x0: u32, y0: u32, x1: u32, y1: u32) -> BTreeSet<TileIndex> {
        let mut set = BTreeSet::new();
        for x in x0..=x1 {
            for y in y0..=y1 {
                set.insert(TileIndex::new(x, y));
            }
        }
        set
    }

    fn resident_set(s: &TerrainStreamer<NullSurfaceBuilder>) -> BTreeSet<TileIndex> {
        s.cache().resident_tiles().into_iter().collect()
    }

    #[test]
    fn config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.load_radius, 1);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.max_tiles_per_tick, 1);
        assert!(config.async_loading);
    }

    #[test]
    fn load_radius_clamped() {
        let s = streamer(StreamConfig {
            load_radius: 99,
            ..StreamConfig::default()
        });
        assert_eq!(s.config().load_radius, 5);
    }

    #[test]
    fn no_viewer_means_no_work() {
        let mut s = streamer(sync_config(1, 100));
        assert!(s.on_tick(Duration::from_secs(5)));
        assert_eq!(s.resident_count(), 0);
        assert_eq!(s.load_queue_len(), 0);
        assert!(s.current_tile().is_none());
    }

    #[test]
    fn interval_accumulates_across_ticks() {
        let mut s = streamer(StreamConfig {
            tick_interval: Duration::from_secs(1),
            max_tiles_per_tick: 100,
            async_loading: false,
            ..StreamConfig::default()
        });
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        assert!(!s.on_tick(Duration::from_millis(400)));
        assert!(!s.on_tick(Duration::from_millis(400)));
        assert!(s.on_tick(Duration::from_millis(400)));
        assert_eq!(s.resident_count(), 9);
    }

    #[test]
    fn sync_load_fills_required_block() {
        let mut s = streamer(sync_config(1, 100));
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        s.on_tick(Duration::ZERO);

        assert_eq!(s.current_tile(), Some(TileIndex::new(5, 5)));
        assert_eq!(resident_set(&s), block(4, 4, 6, 6));
        assert_eq!(s.load_queue_len(), 0);
        assert_eq!(s.stats().tiles_loaded_this_tick, 9);
    }

    #[test]
    fn load_budget_respected() {
        let mut s = streamer(sync_config(1, 2));
        s.set_viewer(pos_in(TileIndex::new(5, 5)));

        let mut ticks = 0;
        while s.resident_count() < 9 {
            s.on_tick(Duration::ZERO);
            assert!(s.stats().tiles_loaded_this_tick <= 2);
            ticks += 1;
            assert!(ticks < 20, "streaming never converged");
        }
        // 9 tiles at 2 per tick takes 5 updates.
        assert_eq!(ticks, 5);
        assert_eq!(resident_set(&s), block(4, 4, 6, 6));
    }

    #[test]
    fn async_load_splits_across_two_ticks() {
        let mut s = streamer(StreamConfig {
            load_radius: 1,
            tick_interval: Duration::ZERO,
            max_tiles_per_tick: 100,
            async_loading: true,
        });
        s.set_viewer(pos_in(TileIndex::new(5, 5)));

        // First update stages everything, resolves nothing.
        s.on_tick(Duration::ZERO);
        assert_eq!(s.resident_count(), 0);
        assert_eq!(s.staged_load_len(), 9);
        assert_eq!(s.load_queue_len(), 0);

        // Second update completes the staged loads.
        s.on_tick(Duration::ZERO);
        assert_eq!(s.resident_count(), 9);
        assert_eq!(s.staged_load_len(), 0);
    }

    #[test]
    fn viewer_move_swaps_one_row() {
        let mut s = streamer(sync_config(1, 100));
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        s.on_tick(Duration::ZERO);

        let kept = TileIndex::new(5, 5);
        let kept_handle = s.cache().get(kept).unwrap().surface;

        // One tile south: rows 5..7 required instead of 4..6.
        s.set_viewer(pos_in(TileIndex::new(5, 6)));
        s.on_tick(Duration::ZERO);

        assert_eq!(resident_set(&s), block(4, 5, 6, 7));
        assert_eq!(s.stats().tiles_unloaded_this_tick, 3); // (4,4),(5,4),(6,4)
        assert_eq!(s.stats().tiles_loaded_this_tick, 3); // (4,7),(5,7),(6,7)
        // The overlapping tiles were untouched.
        assert_eq!(s.cache().get(kept).unwrap().surface, kept_handle);
    }

    #[test]
    fn unloads_get_double_budget() {
        let mut s = streamer(sync_config(2, 2));
        s.set_viewer(pos_in(TileIndex::new(10, 9)));
        s.force_refresh();
        assert_eq!(s.resident_count(), 25);

        // Jump far away: all 25 residents must go, 25 new must come.
        s.set_viewer(pos_in(TileIndex::new(25, 9)));
        s.on_tick(Duration::ZERO);
        assert_eq!(s.stats().tiles_unloaded_this_tick, 4);
        assert_eq!(s.stats().tiles_loaded_this_tick, 2);
    }

    #[test]
    fn force_refresh_ignores_budget() {
        let mut s = streamer(StreamConfig {
            load_radius: 1,
            tick_interval: Duration::from_secs(1),
            max_tiles_per_tick: 1,
            async_loading: true,
        });
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        s.force_refresh();
        assert_eq!(resident_set(&s), block(4, 4, 6, 6));
        assert_eq!(s.load_queue_len(), 0);
        assert_eq!(s.staged_load_len(), 0);
    }

    #[test]
    fn required_set_clipped_at_map_corner() {
        let mut s = streamer(sync_config(2, 100));
        s.set_viewer(pos_in(TileIndex::new(0, 0)));
        s.force_refresh();
        assert_eq!(resident_set(&s), block(0, 0, 2, 2));
    }

    #[test]
    fn failed_loads_are_dropped_not_retried() {
        // No assets and no raw files: every load fails.
        let mut s = streamer_with_assets(sync_config(1, 100), false);
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        s.on_tick(Duration::ZERO);

        assert_eq!(s.resident_count(), 0);
        assert_eq!(s.load_queue_len(), 0);

        // Same viewer tile: nothing re-enqueues the failed tiles.
        s.on_tick(Duration::ZERO);
        assert_eq!(s.load_queue_len(), 0);
        assert_eq!(s.stats().tiles_loaded_this_tick, 0);
    }

    #[test]
    fn release_tears_everything_down() {
        let mut s = streamer(sync_config(1, 100));
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        s.on_tick(Duration::ZERO);
        assert_eq!(s.resident_count(), 9);

        s.release();
        assert_eq!(s.resident_count(), 0);
        assert_eq!(s.cache().builder().live_count(), 0);
        assert_eq!(s.load_queue_len(), 0);
        assert_eq!(s.unload_queue_len(), 0);
        assert!(s.current_tile().is_none());
    }

    #[test]
    fn queues_never_overlap_under_movement() {
        let mut s = streamer(StreamConfig {
            load_radius: 2,
            tick_interval: Duration::ZERO,
            max_tiles_per_tick: 1,
            async_loading: true,
        });

        // Wander east with a tiny budget so the queues stay busy.
        let path = [10u32, 11, 12, 13, 14, 15];
        for (i, &x) in path.iter().enumerate() {
            s.set_viewer(pos_in(TileIndex::new(x, 9)));
            for _ in 0..2 {
                s.on_tick(Duration::ZERO);

                let loads: BTreeSet<TileIndex> = s.load_queue.iter().copied().collect();
                let unloads: BTreeSet<TileIndex> = s.unload_queue.iter().copied().collect();
                let staged: BTreeSet<TileIndex> = s.staged_loads.iter().copied().collect();
                let resident = resident_set(&s);

                assert!(loads.is_disjoint(&unloads), "step {i}: queue overlap");
                assert!(loads.is_disjoint(&resident), "step {i}: resident in load queue");
                assert!(staged.is_disjoint(&resident), "step {i}: resident staged");
                assert!(
                    unloads.is_subset(&resident),
                    "step {i}: unload queued for non-resident tile"
                );
            }
        }
    }

    #[test]
    fn oscillating_viewer_reconverges() {
        let mut s = streamer(StreamConfig {
            load_radius: 1,
            tick_interval: Duration::ZERO,
            max_tiles_per_tick: 1,
            async_loading: true,
        });
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        for _ in 0..20 {
            s.on_tick(Duration::ZERO);
        }
        assert_eq!(resident_set(&s), block(4, 4, 6, 6));

        // Cross one tile south, give the queues a single budgeted tick so
        // some unloads run and some loads stay queued or staged, then cross
        // straight back. The stale work must not survive the return diff:
        // unloads for re-required tiles are dropped, loads for de-required
        // tiles are dropped, and anything already torn down is re-enqueued.
        s.set_viewer(pos_in(TileIndex::new(5, 6)));
        s.on_tick(Duration::ZERO);
        s.set_viewer(pos_in(TileIndex::new(5, 5)));
        for _ in 0..20 {
            s.on_tick(Duration::ZERO);
        }

        assert_eq!(resident_set(&s), block(4, 4, 6, 6));
        assert_eq!(s.load_queue_len(), 0);
        assert_eq!(s.unload_queue_len(), 0);
        assert_eq!(s.staged_load_len(), 0);
    }

    #[test]
    fn back_and_forth_walk_converges_to_required_set() {
        let mut s = streamer(StreamConfig {
            load_radius: 2,
            tick_interval: Duration::ZERO,
            max_tiles_per_tick: 1,
            async_loading: true,
        });

        // Oscillate across the same boundary while the queues hold work,
        // then stop and drain.
        for &x in &[10u32, 11, 10, 11, 10, 12, 10] {
            s.set_viewer(pos_in(TileIndex::new(x, 9)));
            s.on_tick(Duration::ZERO);
        }
        for _ in 0..60 {
            s.on_tick(Duration::ZERO);
        }

        assert_eq!(resident_set(&s), block(8, 7, 12, 11));
        assert_eq!(s.load_queue_len(), 0);
        assert_eq!(s.unload_queue_len(), 0);
        assert_eq!(s.staged_load_len(), 0);
    }

    #[test]
    fn eventual_consistency_after_budgeted_ticks() {
        let mut s = streamer(StreamConfig {
            load_radius: 2,
            tick_interval: Duration::ZERO,
            max_tiles_per_tick: 3,
            async_loading: true,
        });
        s.set_viewer(pos_in(TileIndex::new(20, 10)));

        for _ in 0..20 {
            s.on_tick(Duration::ZERO);
        }
        assert_eq!(resident_set(&s), block(18, 8, 22, 12));
        assert_eq!(s.load_queue_len(), 0);
        assert_eq!(s.unload_queue_len(), 0);
    }
}
