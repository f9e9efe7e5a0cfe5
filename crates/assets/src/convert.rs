use std::path::Path;
use terratile_grid::{TileIndex, TileRange, TILES_X, TILES_Y};
use terratile_heightmap as heightmap;
use terratile_terrain::asset_key;

use crate::{AssetError, TerrainAssetStore};

/// Outcome counts of one batch conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertReport {
    /// Raw files decoded and written into the store.
    pub converted: usize,
    /// Files skipped: not a parseable `tile_{x}_{y}.raw` name, or outside
    /// the requested range.
    pub skipped: usize,
    /// Files that failed to read or decode.
    pub failed: usize,
}

impl ConvertReport {
    pub fn total(&self) -> usize {
        self.converted + self.skipped + self.failed
    }
}

/// Parse a raw elevation file name of the form `tile_{x}_{y}.raw` into its
/// tile index. Rejects malformed stems and out-of-domain indices.
pub fn parse_tile_filename(name: &str) -> Option<TileIndex> {
    let stem = name.strip_suffix(".raw")?;
    let mut parts = stem.split('_');
    if parts.next()? != "tile" {
        return None;
    }
    let x: u32 = parts.next()?.parse().ok()?;
    let y: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || x >= TILES_X || y >= TILES_Y {
        return None;
    }
    Some(TileIndex::new(x, y))
}

/// Convert every raw elevation file in `src_dir` into a precomputed asset.
///
/// Per-file problems (unparseable name, short read, bad length) are counted
/// and logged but never abort the batch; only a failure to enumerate the
/// directory or write an asset is an error.
pub fn convert_raw_directory(
    src_dir: impl AsRef<Path>,
    store: &TerrainAssetStore,
    resolution: usize,
    range: Option<TileRange>,
) -> Result<ConvertReport, AssetError> {
    let src_dir = src_dir.as_ref();
    let mut report = ConvertReport::default();

    let mut entries: Vec<_> = std::fs::read_dir(src_dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "raw"))
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_owned(),
            None => {
                report.skipped += 1;
                continue;
            }
        };
        let index = match parse_tile_filename(&name) {
            Some(index) => index,
            None => {
                tracing::warn!(file = name, "cannot parse tile index from file name, skipping");
                report.skipped += 1;
                continue;
            }
        };
        if let Some(range) = range {
            if !range.contains(index) {
                report.skipped += 1;
                continue;
            }
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = name, error = %e, "cannot read raw file");
                report.failed += 1;
                continue;
            }
        };
        let grid = match heightmap::decode(&bytes, resolution) {
            Ok(grid) => grid,
            Err(e) => {
                tracing::warn!(file = name, error = %e, "raw decode failed");
                report.failed += 1;
                continue;
            }
        };

        store.save(&asset_key(index), &grid)?;
        report.converted += 1;
        tracing::debug!(tile = %index, file = name, "converted tile");
    }

    tracing::info!(
        converted = report.converted,
        skipped = report.skipped,
        failed = report.failed,
        "batch conversion finished"
    );
    Ok(report)
}
