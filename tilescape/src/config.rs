//! Engine configuration.
//!
//! [`EngineConfig`] combines the knobs shared by the cache and the
//! compositor. Defaults match the common slippy-map setup: 256 px tiles,
//! three fallback ancestor levels, an opaque gray background.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::MAX_ZOOM;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default number of coarser ancestor levels kept warm for fallback.
///
/// Three levels means a freshly-panned viewport can fall back to imagery
/// 8x coarser while its own tiles stream in.
pub const DEFAULT_PARENT_LEVELS: u8 = 3;

/// Errors validating or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Tile size must be a power of two.
    #[error("Tile size {0} is not a power of two")]
    TileSizeNotPowerOfTwo(u32),

    /// Tile size outside the supported range.
    #[error("Tile size {0} out of range (16..=4096)")]
    TileSizeOutOfRange(u32),

    /// Fallback depth exceeds what the tile size can replicate.
    #[error("Parent levels {levels} too deep for {tile_size} px tiles")]
    ParentLevelsTooDeep { levels: u8, tile_size: u32 },

    /// Maximum zoom exceeds the projection's supported range.
    #[error("Max zoom {0} exceeds supported maximum {MAX_ZOOM}")]
    MaxZoomOutOfRange(u8),

    /// Compositor configuration and tile cache disagree on tile size.
    #[error("Configured tile size {config} does not match cache tile size {cache}")]
    CacheTileSizeMismatch { config: u32, cache: u32 },

    /// Malformed configuration file.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration shared by the tile cache and the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tile edge length in pixels. Power of two.
    pub tile_size: u32,

    /// How many coarser ancestor levels the tile window keeps resident for
    /// fallback resampling. Zero disables ancestor warming.
    pub parent_levels: u8,

    /// RGBA fill for regions with no tile and no loaded ancestor.
    pub background: [u8; 4],

    /// Highest zoom level the engine will accept.
    pub max_zoom: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            parent_levels: DEFAULT_PARENT_LEVELS,
            background: [0x60, 0x60, 0x60, 0xFF],
            max_zoom: MAX_ZOOM,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a non-power-of-two or out-of-range tile
    /// size, a fallback depth the tile size cannot replicate (the deepest
    /// ancestor quadrant must still cover at least one source pixel), or an
    /// unsupported max zoom.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tile_size.is_power_of_two() {
            return Err(ConfigError::TileSizeNotPowerOfTwo(self.tile_size));
        }
        if !(16..=4096).contains(&self.tile_size) {
            return Err(ConfigError::TileSizeOutOfRange(self.tile_size));
        }
        if self.tile_size >> self.parent_levels == 0 {
            return Err(ConfigError::ParentLevelsTooDeep {
                levels: self.parent_levels,
                tile_size: self.tile_size,
            });
        }
        if self.max_zoom > MAX_ZOOM {
            return Err(ConfigError::MaxZoomOutOfRange(self.max_zoom));
        }
        Ok(())
    }

    /// Parse and validate a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Bytes per tile payload: `tile_size^2 * 4`.
    pub fn tile_bytes(&self) -> usize {
        (self.tile_size as usize) * (self.tile_size as usize) * crate::tile::BYTES_PER_PIXEL
    }
}
