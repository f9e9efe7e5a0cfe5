use glam::Vec3;
use std::collections::BTreeSet;
use terratile_grid::TileIndex;
use terratile_heightmap::HeightGrid;

/// Opaque handle to a built terrain surface. Only meaningful to the
/// [`SurfaceBuilder`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// The terrain-surface collaborator: turns a decoded height grid plus
/// placement into a renderable surface and tears it down again.
///
/// The streaming core never looks inside a surface; it only moves handles
/// between `build` and `release`.
pub trait SurfaceBuilder {
    fn build(
        &mut self,
        index: TileIndex,
        heights: &HeightGrid,
        placement: Vec3,
        size: Vec3,
    ) -> SurfaceHandle;

    fn release(&mut self, handle: SurfaceHandle);
}

/// Surface builder that builds nothing and tracks handle lifecycles.
///
/// Used by tests and the CLI simulator, where the interesting part is the
/// streaming behavior, not the geometry.
#[derive(Debug, Default)]
pub struct NullSurfaceBuilder {
    next: u64,
    built: usize,
    released: usize,
    live: BTreeSet<u64>,
}

impl NullSurfaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles issued and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn built_count(&self) -> usize {
        self.built
    }

    pub fn released_count(&self) -> usize {
        self.released
    }

    pub fn is_live(&self, handle: SurfaceHandle) -> bool {
        self.live.contains(&handle.0)
    }
}

impl SurfaceBuilder for NullSurfaceBuilder {
    fn build(
        &mut self,
        _index: TileIndex,
        _heights: &HeightGrid,
        _placement: Vec3,
        _size: Vec3,
    ) -> SurfaceHandle {
        let handle = SurfaceHandle(self.next);
        self.next += 1;
        self.built += 1;
        self.live.insert(handle.0);
        handle
    }

    fn release(&mut self, handle: SurfaceHandle) {
        if self.live.remove(&handle.0) {
            self.released += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_builder_tracks_lifecycles() {
        let mut builder = NullSurfaceBuilder::new();
        let grid = HeightGrid::filled(2, 0.5);
        let a = builder.build(TileIndex::new(0, 0), &grid, Vec3::ZERO, Vec3::ONE);
        let b = builder.build(TileIndex::new(1, 0), &grid, Vec3::ZERO, Vec3::ONE);
        assert_ne!(a, b);
        assert_eq!(builder.live_count(), 2);

        builder.release(a);
        assert_eq!(builder.live_count(), 1);
        assert!(!builder.is_live(a));
        assert!(builder.is_live(b));

        // Releasing twice does not double-count.
        builder.release(a);
        assert_eq!(builder.released_count(), 1);
    }
}
