//! Precomputed terrain assets.
//!
//! Decoding a raw elevation file costs a full `R*R` u16 parse plus the
//! vertical flip; the asset store skips that by persisting already-decoded
//! height grids, one file per tile, CBOR-encoded and zstd-compressed:
//!
//! ```text
//! <root>/
//!   TerrainData_5_5.cbor.zst
//!   TerrainData_5_6.cbor.zst
//!   ...
//! ```
//!
//! The store implements [`AssetSource`], making it the first tier of the
//! tile resolver. A corrupt or unreadable asset is logged and reported as a
//! miss so raw decode takes over; the asset tier is purely an accelerator.
//!
//! The [`convert`] module holds the batch converter that pre-processes a
//! directory of raw tiles into this format.

mod convert;

pub use convert::{convert_raw_directory, parse_tile_filename, ConvertReport};

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use terratile_heightmap::HeightGrid;
use terratile_terrain::AssetSource;

/// Current asset file schema version.
const ASSET_SCHEMA_VERSION: u32 = 1;

/// Errors from asset store operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
}

/// On-disk payload of one asset file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredAsset {
    schema_version: u32,
    grid: HeightGrid,
}

/// File-backed store of pre-decoded height grids, keyed by the logical
/// asset name (`TerrainData_{x}_{y}`).
#[derive(Debug, Clone)]
pub struct TerrainAssetStore {
    root: PathBuf,
}

impl TerrainAssetStore {
    /// Open or create a store rooted at the given directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AssetError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn asset_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.cbor.zst"))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.asset_path(key).exists()
    }

    /// Persist a height grid under the given key, replacing any previous
    /// asset for that key.
    pub fn save(&self, key: &str, grid: &HeightGrid) -> Result<(), AssetError> {
        let stored = StoredAsset {
            schema_version: ASSET_SCHEMA_VERSION,
            grid: grid.clone(),
        };
        let cbor_bytes = cbor_serialize(&stored)?;
        let compressed = zstd_compress(&cbor_bytes)?;
        std::fs::write(self.asset_path(key), compressed)?;
        Ok(())
    }

    /// Load the height grid stored under a key. A missing file is `Ok(None)`;
    /// anything else unreadable is an error.
    pub fn load(&self, key: &str) -> Result<Option<HeightGrid>, AssetError> {
        let path = self.asset_path(key);
        let compressed = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cbor_bytes = zstd_decompress(&compressed)?;
        let stored: StoredAsset = cbor_deserialize(&cbor_bytes)?;
        if stored.schema_version != ASSET_SCHEMA_VERSION {
            return Err(AssetError::SchemaMismatch {
                file_version: stored.schema_version,
                expected_version: ASSET_SCHEMA_VERSION,
            });
        }
        Ok(Some(stored.grid))
    }

    /// Number of asset files currently in the store.
    pub fn len(&self) -> Result<usize, AssetError> {
        let mut count = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().ends_with(".cbor.zst") {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, AssetError> {
        Ok(self.len()? == 0)
    }
}

impl AssetSource for TerrainAssetStore {
    fn lookup(&self, key: &str) -> Option<HeightGrid> {
        match self.load(key) {
            Ok(grid) => grid,
            Err(e) => {
                tracing::warn!(key, error = %e, "asset unreadable, treating as miss");
                None
            }
        }
    }
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, AssetError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| AssetError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, AssetError> {
    ciborium::from_reader(data).map_err(|e| AssetError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, AssetError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, AssetError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn crate_info() -> &'static str {
    "terratile-assets v0.1.0"
}
