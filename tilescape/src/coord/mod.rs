//! Coordinate conversion module
//!
//! Provides pure conversions between geographic coordinates
//! (longitude/latitude), the normalized Web Mercator unit square, and
//! tile-grid coordinates at a given zoom level.
//!
//! All longitude math normalizes into `(-180, 180]` and all tile-column math
//! normalizes into `[0, 2^zoom)`, so positions near the antimeridian behave
//! as neighbors. Mercator `y` has no valid values outside `[0, 1]`; inputs
//! exceeding that range are undefined for the tile-grid conversions and are
//! not silently clamped.

mod types;

pub use types::{
    CoordError, GeoPoint, MercatorPoint, TilePoint, MAX_LAT, MAX_ZOOM, MIN_LAT, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Normalizes a longitude into `(-180, 180]` degrees.
#[inline]
pub fn normalize_lon(lon: f64) -> f64 {
    let mut l = (lon + 180.0).rem_euclid(360.0);
    if l == 0.0 {
        l = 360.0;
    }
    l - 180.0
}

/// Wraps a normalized Mercator x coordinate into `[0, 1)`.
#[inline]
pub fn wrap_unit(x: f64) -> f64 {
    let w = x.rem_euclid(1.0);
    // rem_euclid can return 1.0 for tiny negative inputs due to rounding
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

/// Wraps a (possibly negative or overflowing) tile column into `[0, 2^zoom)`.
#[inline]
pub fn wrap_tile_x(x: i64, zoom: u8) -> u32 {
    let n = 1i64 << zoom;
    x.rem_euclid(n) as u32
}

/// Range check for a tile row: rows have no wraparound.
///
/// Returns `Some(row)` when `y` lies in `[0, 2^zoom)`, `None` otherwise.
#[inline]
pub fn clamp_tile_y(y: i64, zoom: u8) -> Option<u32> {
    let n = 1i64 << zoom;
    if (0..n).contains(&y) {
        Some(y as u32)
    } else {
        None
    }
}

/// Converts a geographic position to normalized Web Mercator.
///
/// Latitudes beyond [`MAX_LAT`]/[`MIN_LAT`] produce `y` outside `[0, 1]`;
/// such points cannot be mapped to a tile row.
#[inline]
pub fn geo_to_mercator(geo: GeoPoint) -> MercatorPoint {
    let x = (geo.lon + 180.0) / 360.0;
    let lat_rad = geo.lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0;
    MercatorPoint::new(x, y)
}

/// Converts a normalized Web Mercator position back to geographic degrees.
#[inline]
pub fn mercator_to_geo(m: MercatorPoint) -> GeoPoint {
    let lon = m.x * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * m.y)).sinh().atan();
    GeoPoint::new(lon, lat_rad * 180.0 / PI)
}

/// Converts a Mercator position to fractional tile-grid coordinates.
///
/// The integer parts are the tile address; the fractional parts are the
/// position within that tile. `x` is wrapped before scaling so the result
/// always lies in `[0, 2^zoom)`.
///
/// # Arguments
///
/// * `m` - Mercator position; `m.y` must be in `[0, 1]`
/// * `zoom` - Zoom level (0 to [`MAX_ZOOM`])
#[inline]
pub fn mercator_to_tile_f64(m: MercatorPoint, zoom: u8) -> (f64, f64) {
    let n = (1u64 << zoom) as f64;
    (wrap_unit(m.x) * n, m.y * n)
}

/// Converts a Mercator position to the containing tile.
///
/// # Arguments
///
/// * `m` - Mercator position; `m.y` must be in `[0, 1]`
/// * `zoom` - Zoom level (0 to [`MAX_ZOOM`])
///
/// # Returns
///
/// The tile containing `m`, or an error for an invalid zoom. A `y` of
/// exactly 1.0 maps to the last row.
#[inline]
pub fn mercator_to_tile(m: MercatorPoint, zoom: u8) -> Result<TilePoint, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    let n = 1u32 << zoom;
    let (tx, ty) = mercator_to_tile_f64(m, zoom);
    let x = (tx as u32).min(n - 1);
    let y = (ty as u32).min(n - 1);
    Ok(TilePoint { x, y, zoom })
}

/// Converts a tile address to the Mercator position of its northwest corner.
#[inline]
pub fn tile_to_mercator(tile: &TilePoint) -> MercatorPoint {
    let n = (1u64 << tile.zoom) as f64;
    MercatorPoint::new(tile.x as f64 / n, tile.y as f64 / n)
}

/// Returns the pixel position of a Mercator point within its containing tile.
///
/// # Arguments
///
/// * `m` - Mercator position; `m.y` must be in `[0, 1]`
/// * `zoom` - Zoom level
/// * `tile_size` - Tile edge length in pixels
#[inline]
pub fn pixel_within_tile(m: MercatorPoint, zoom: u8, tile_size: u32) -> (u32, u32) {
    let (tx, ty) = mercator_to_tile_f64(m, zoom);
    let px = (tx.fract() * tile_size as f64) as u32;
    let py = (ty.fract() * tile_size as f64) as u32;
    (px.min(tile_size - 1), py.min(tile_size - 1))
}

/// Returns the tile one zoom level coarser covering the same area.
///
/// The parent of `(zoom, x, y)` is `(zoom - 1, x / 2, y / 2)`; a tile at
/// zoom 0 has no parent.
#[inline]
pub fn tile_parent(tile: &TilePoint) -> Option<TilePoint> {
    if tile.zoom == 0 {
        return None;
    }
    Some(TilePoint {
        x: tile.x >> 1,
        y: tile.y >> 1,
        zoom: tile.zoom - 1,
    })
}
