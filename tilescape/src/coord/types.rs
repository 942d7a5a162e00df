//! Value types for coordinate conversion.
//!
//! Three coordinate spaces are used throughout the engine:
//!
//! - Geographic: longitude/latitude in degrees ([`GeoPoint`])
//! - Normalized Web Mercator: the unit square, x wrapping modulo 1
//!   ([`MercatorPoint`])
//! - Tile grid: integer column/row at a zoom level ([`TilePoint`])

use thiserror::Error;

/// Minimum supported zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum supported zoom level.
pub const MAX_ZOOM: u8 = 22;

/// Maximum latitude representable in Web Mercator (degrees).
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator (degrees).
pub const MIN_LAT: f64 = -85.05112878;

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordError {
    /// Zoom level exceeds [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (max: {MAX_ZOOM})")]
    InvalidZoom(u8),
}

/// A geographic position in degrees.
///
/// Longitude is normalized into `(-180, 180]` on construction; latitude is
/// clamped to `[-90, 90]`. The longitude axis is cyclic: -179.9° and 179.9°
/// are adjacent, and all conversions below preserve that adjacency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Longitude in degrees, normalized into `(-180, 180]`.
    pub lon: f64,
    /// Latitude in degrees, clamped to `[-90, 90]`.
    pub lat: f64,
}

impl GeoPoint {
    /// Create a geographic point, normalizing longitude and clamping latitude.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon: super::normalize_lon(lon),
            lat: lat.clamp(-90.0, 90.0),
        }
    }
}

/// A position in the normalized Web Mercator unit square.
///
/// `x` is cyclic modulo 1 (the antimeridian). `y` is only meaningful in
/// `[0, 1]`; values outside that range can be produced by projecting
/// latitudes beyond [`MAX_LAT`]/[`MIN_LAT`] and are undefined inputs for the
/// tile-grid conversions - they are deliberately not clamped here because
/// callers rely on exact wraparound behavior elsewhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorPoint {
    /// Horizontal coordinate, wrapped into `[0, 1)`.
    pub x: f64,
    /// Vertical coordinate; valid range `[0, 1]`, not clamped.
    pub y: f64,
}

impl MercatorPoint {
    /// Create a Mercator point, wrapping `x` into `[0, 1)`.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: super::wrap_unit(x),
            y,
        }
    }
}

/// A tile address in the power-of-two grid at a specific zoom level.
///
/// `x` (column) wraps modulo `2^zoom`; `y` (row) is only valid in
/// `[0, 2^zoom)` - there is no vertical wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilePoint {
    /// Tile column (increases eastward).
    pub x: u32,
    /// Tile row (increases southward).
    pub y: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl TilePoint {
    /// Number of tiles along one axis at this zoom level.
    #[inline]
    pub fn tile_count(&self) -> u32 {
        1u32 << self.zoom
    }
}
