//! Camera/viewport snapshots.
//!
//! A [`StateProps`] is an immutable capture of the camera and viewport at a
//! point in time. One composition cycle renders from exactly one snapshot,
//! so there is no tearing between tile-window computation and resampling.
//! Two snapshots are live at a time: the last completed cycle's (still valid
//! for consumers) and the one currently rendering.
//!
//! [`Camera`] is the foreground-thread helper that owns the mutable camera
//! fields and mints snapshots from them.

use thiserror::Error;

use crate::coord::{
    self, CoordError, GeoPoint, MercatorPoint, TilePoint, MAX_ZOOM,
};

/// Errors constructing a camera snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StateError {
    /// Viewport has a zero dimension.
    #[error("Viewport is empty: {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },

    /// Zoom is NaN or infinite.
    #[error("Zoom is not finite: {0}")]
    NonFiniteZoom(f64),

    /// Integer zoom out of range.
    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// Immutable camera/viewport snapshot driving one composition cycle.
///
/// The fractional zoom is split into the integer level (selects the tile
/// pyramid layer) and `zoom_factor` in `[1, 2)` (the sub-level magnification
/// applied during front-buffer resampling).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateProps {
    center: MercatorPoint,
    zoom: u8,
    zoom_factor: f64,
    width: u32,
    height: u32,
    tile_count: u32,
}

impl StateProps {
    /// Capture a snapshot from a geographic center.
    ///
    /// # Arguments
    ///
    /// * `center` - Geographic view center
    /// * `zoom` - Fractional zoom level; negatives clamp to 0
    /// * `width`, `height` - Viewport size in pixels
    pub fn new(center: GeoPoint, zoom: f64, width: u32, height: u32) -> Result<Self, StateError> {
        Self::from_mercator(coord::geo_to_mercator(center), zoom, width, height)
    }

    /// Capture a snapshot from an already-projected center.
    pub fn from_mercator(
        center: MercatorPoint,
        zoom: f64,
        width: u32,
        height: u32,
    ) -> Result<Self, StateError> {
        if width == 0 || height == 0 {
            return Err(StateError::EmptyViewport { width, height });
        }
        if !zoom.is_finite() {
            return Err(StateError::NonFiniteZoom(zoom));
        }
        let zoom = zoom.max(0.0);
        let level = zoom.floor();
        if level > MAX_ZOOM as f64 {
            return Err(CoordError::InvalidZoom(level as u8).into());
        }
        let level = level as u8;
        Ok(Self {
            center,
            zoom: level,
            zoom_factor: (zoom - level as f64).exp2(),
            width,
            height,
            tile_count: 1u32 << level,
        })
    }

    /// View center in normalized Mercator.
    pub fn center(&self) -> MercatorPoint {
        self.center
    }

    /// Integer zoom level.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Sub-level magnification in `[1, 2)`.
    pub fn zoom_factor(&self) -> f64 {
        self.zoom_factor
    }

    /// Viewport width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Viewport height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of tiles along one axis at this zoom level.
    pub fn tile_count(&self) -> u32 {
        self.tile_count
    }

    /// The tile containing the view center.
    pub fn center_tile(&self) -> TilePoint {
        // zoom was validated at construction
        coord::mercator_to_tile(self.center, self.zoom)
            .unwrap_or(TilePoint {
                x: 0,
                y: 0,
                zoom: self.zoom,
            })
    }

    /// The view center in fractional tile-grid coordinates.
    pub fn center_tile_f64(&self) -> (f64, f64) {
        coord::mercator_to_tile_f64(self.center, self.zoom)
    }

    /// Width of the whole wrapped world in front-buffer pixels.
    pub fn world_px(&self, tile_size: u32) -> f64 {
        self.tile_count as f64 * tile_size as f64 * self.zoom_factor
    }

    /// Whether the viewport spans the whole (or nearly whole) wrapped world.
    ///
    /// Under this condition tiles and markers are duplicated at
    /// ±world-width offsets so wraparound is seam-free at the buffer edges.
    pub fn spans_world(&self, tile_size: u32) -> bool {
        self.width as f64 >= self.world_px(tile_size) - tile_size as f64 * self.zoom_factor
    }
}

/// Foreground-thread camera: mutable center/zoom/viewport, snapshot minting.
///
/// Updates may arrive at arbitrary rates; each consumer frame takes one
/// [`Camera::snapshot`] and hands it to the compositor.
#[derive(Debug, Clone)]
pub struct Camera {
    center: MercatorPoint,
    zoom: f64,
    width: u32,
    height: u32,
    tile_size: u32,
}

impl Camera {
    /// Create a camera over a viewport.
    pub fn new(center: GeoPoint, zoom: f64, width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            center: coord::geo_to_mercator(center),
            zoom: zoom.clamp(0.0, MAX_ZOOM as f64),
            width,
            height,
            tile_size,
        }
    }

    /// Current fractional zoom.
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Current center in normalized Mercator.
    pub fn center(&self) -> MercatorPoint {
        self.center
    }

    /// Replace the view center.
    pub fn set_center(&mut self, center: GeoPoint) {
        self.center = coord::geo_to_mercator(center);
    }

    /// Set the fractional zoom, clamped to the supported range.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(0.0, MAX_ZOOM as f64);
        }
    }

    /// Adjust zoom by a delta (positive zooms in).
    pub fn zoom_by(&mut self, delta: f64) {
        self.set_zoom(self.zoom + delta);
    }

    /// Resize the viewport.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Pan by screen pixels at the current zoom.
    ///
    /// Positive `dx` moves the view east, positive `dy` moves it south.
    /// The horizontal axis wraps; the vertical axis clamps at the
    /// projection edges.
    pub fn pan_pixels(&mut self, dx: f64, dy: f64) {
        let scale = self.zoom.exp2() * self.tile_size as f64;
        self.center = MercatorPoint::new(
            self.center.x + dx / scale,
            (self.center.y + dy / scale).clamp(0.0, 1.0),
        );
    }

    /// Mint an immutable snapshot of the current camera state.
    pub fn snapshot(&self) -> Result<StateProps, StateError> {
        StateProps::from_mercator(self.center, self.zoom, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_splits_fractional_zoom() {
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.5, 512, 512).unwrap();
        assert_eq!(state.zoom(), 3);
        assert!((state.zoom_factor() - 2f64.powf(0.5)).abs() < 1e-12);
        assert_eq!(state.tile_count(), 8);
    }

    #[test]
    fn test_integer_zoom_factor_is_one() {
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 512, 512).unwrap();
        assert_eq!(state.zoom_factor(), 1.0);
    }

    #[test]
    fn test_empty_viewport_rejected() {
        let result = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 0, 512);
        assert!(matches!(result, Err(StateError::EmptyViewport { .. })));
    }

    #[test]
    fn test_non_finite_zoom_rejected() {
        let result = StateProps::new(GeoPoint::new(0.0, 0.0), f64::NAN, 512, 512);
        assert!(matches!(result, Err(StateError::NonFiniteZoom(_))));
    }

    #[test]
    fn test_negative_zoom_clamps_to_root() {
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), -2.0, 512, 512).unwrap();
        assert_eq!(state.zoom(), 0);
        assert_eq!(state.tile_count(), 1);
    }

    #[test]
    fn test_center_tile_zoom3_origin() {
        // Spec scenario: center (0, 0) at zoom 3 lands in tile (4, 4)
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 512, 512).unwrap();
        let center = state.center_tile();
        assert_eq!((center.x, center.y), (4, 4));
    }

    #[test]
    fn test_spans_world() {
        // 8 tiles * 64 px = 512 px world: a 512-wide viewport spans it
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 512, 512).unwrap();
        assert!(state.spans_world(64));
        assert!(!state.spans_world(256));
    }

    #[test]
    fn test_camera_pan_wraps_horizontally() {
        let mut camera = Camera::new(GeoPoint::new(179.9, 0.0), 3.0, 512, 512, 256);
        let before = camera.center().x;
        // Pan east past the antimeridian: one full world is 8 * 256 px
        camera.pan_pixels(256.0, 0.0);
        let after = camera.center().x;
        assert!(after < before, "x wrapped around past 1.0");
    }

    #[test]
    fn test_camera_pan_clamps_vertically() {
        let mut camera = Camera::new(GeoPoint::new(0.0, 84.0), 3.0, 512, 512, 256);
        camera.pan_pixels(0.0, -100_000.0);
        assert_eq!(camera.center().y, 0.0);
    }

    #[test]
    fn test_camera_zoom_clamped() {
        let mut camera = Camera::new(GeoPoint::new(0.0, 0.0), 3.0, 512, 512, 256);
        camera.zoom_by(1000.0);
        assert_eq!(camera.zoom(), MAX_ZOOM as f64);
        camera.zoom_by(-1000.0);
        assert_eq!(camera.zoom(), 0.0);
    }

    #[test]
    fn test_snapshot_is_independent_of_camera() {
        let mut camera = Camera::new(GeoPoint::new(10.0, 20.0), 5.0, 640, 480, 256);
        let snap = camera.snapshot().unwrap();
        camera.pan_pixels(500.0, 500.0);
        camera.zoom_by(2.0);
        let later = camera.snapshot().unwrap();
        assert_ne!(snap, later);
        assert_eq!(snap.zoom(), 5);
    }
}
