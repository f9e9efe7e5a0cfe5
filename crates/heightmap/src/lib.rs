//! Raw elevation decoding.
//!
//! The source dataset ships one file per tile: a square raster of unsigned
//! 16-bit little-endian samples, row-major with the top row first, exactly
//! `R*R*2` bytes for resolution `R` (1025 by default). Decoding normalizes
//! every sample into [0, 1] and flips the rows so row 0 of the resulting
//! [`HeightGrid`] is the southern edge, matching the bottom-up convention of
//! terrain surfaces.
//!
//! # Invariants
//! - A buffer whose length is not exactly `R*R*2` never decodes, not even
//!   partially.
//! - Decoding the same bytes always yields an identical grid.
//! - Raw value 32768 is sea level; [`sea_level_offset`] converts that
//!   convention into the vertical placement that puts sea level at world
//!   y = 0.

use serde::{Deserialize, Serialize};

/// Default raster resolution of the shipped dataset.
pub const DEFAULT_RESOLUTION: usize = 1025;

/// Raw sample value representing sea level.
pub const RAW_SEA_LEVEL: u16 = 32768;

/// Sea level as a normalized height: 32768 / 65535.
pub const SEA_LEVEL: f32 = RAW_SEA_LEVEL as f32 / u16::MAX as f32;

/// Errors from heightmap decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("raw buffer is {actual} bytes, expected exactly {expected}")]
    Format { expected: usize, actual: usize },
    #[error("invalid heightmap resolution {resolution}")]
    Resolution { resolution: usize },
}

/// Square grid of normalized elevation samples in [0, 1], row-major with
/// row 0 at the southern edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightGrid {
    resolution: usize,
    samples: Vec<f32>,
}

impl HeightGrid {
    /// Build a grid from raw parts. Panics if the sample count does not
    /// match the resolution; callers constructing grids by hand (tests, the
    /// tile generator) own that contract.
    pub fn from_samples(resolution: usize, samples: Vec<f32>) -> Self {
        assert_eq!(samples.len(), resolution * resolution);
        Self {
            resolution,
            samples,
        }
    }

    /// Grid filled with a single height value.
    pub fn filled(resolution: usize, value: f32) -> Self {
        Self {
            resolution,
            samples: vec![value; resolution * resolution],
        }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Sample at (row, col), row 0 at the southern edge.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.samples[row * self.resolution + col]
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn min(&self) -> f32 {
        self.samples.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.samples
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn mean(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }
}

/// Decode a raw elevation buffer into a [`HeightGrid`].
///
/// The buffer must be exactly `resolution * resolution * 2` bytes of
/// little-endian u16 samples, top row first. Source row `y` lands in grid
/// row `resolution - 1 - y` (vertical flip).
pub fn decode(bytes: &[u8], resolution: usize) -> Result<HeightGrid, DecodeError> {
    if resolution == 0 || resolution > u16::MAX as usize {
        return Err(DecodeError::Resolution { resolution });
    }
    let expected = resolution * resolution * 2;
    if bytes.len() != expected {
        return Err(DecodeError::Format {
            expected,
            actual: bytes.len(),
        });
    }

    let mut samples = vec![0.0f32; resolution * resolution];
    for y in 0..resolution {
        let flipped = resolution - 1 - y;
        for x in 0..resolution {
            let offset = (y * resolution + x) * 2;
            let value = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            samples[flipped * resolution + x] = value as f32 / u16::MAX as f32;
        }
    }

    Ok(HeightGrid {
        resolution,
        samples,
    })
}

/// Encode a [`HeightGrid`] back into the raw raster layout (top row first).
/// Inverse of [`decode`] up to u16 quantization; used to synthesize test
/// and demo tiles.
pub fn encode(grid: &HeightGrid) -> Vec<u8> {
    let resolution = grid.resolution;
    let mut bytes = vec![0u8; resolution * resolution * 2];
    for y in 0..resolution {
        let flipped = resolution - 1 - y;
        for x in 0..resolution {
            let sample = grid.get(flipped, x).clamp(0.0, 1.0);
            let value = (sample * u16::MAX as f32).round() as u16;
            let offset = (y * resolution + x) * 2;
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// Vertical placement offset that aligns the raw sea-level convention with
/// world y = 0: `-(32768 / 65535) * max_terrain_height`.
pub fn sea_level_offset(max_terrain_height: f32) -> f32 {
    -SEA_LEVEL * max_terrain_height
}

pub fn crate_info() -> &'static str {
    "terratile-heightmap v0.1.0"
}
