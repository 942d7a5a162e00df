//! Tile cache entries.
//!
//! A [`Tile`] is one square raster cell of the power-of-two pyramid,
//! identified by [`TileId`] (zoom, column, row). Tiles are created by the
//! compositor when a viewport needs them, filled in by an external fetch
//! layer through [`Tile::apply_pixel_data`], and disposed by
//! [`TileManager`](crate::tile::TileManager) when a composition cycle no
//! longer uses them.
//!
//! # Parent lookups
//!
//! A tile's parent (the tile one zoom level coarser covering the same area)
//! is never stored as a reference. [`TileId::parent`] computes the ancestor
//! key and callers look it up in the cache index, so an evicted ancestor can
//! never leave a dangling edge behind.
//!
//! # Pixel immutability
//!
//! Pixel data is applied exactly once and held as [`bytes::Bytes`]: every
//! reader shares one refcounted, immutable payload. Eviction drops the
//! cache's handle; a compositor or presentation thread still holding a
//! handle keeps the bytes alive until it finishes.

mod manager;

pub use manager::{CacheStats, TileManager};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;

use crate::coord::TilePoint;

/// Bytes per pixel (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// Cache key for a tile: zoom level, column, row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    /// Zoom level.
    pub zoom: u8,
    /// Tile column (increases eastward), in `[0, 2^zoom)`.
    pub x: u32,
    /// Tile row (increases southward), in `[0, 2^zoom)`.
    pub y: u32,
}

impl TileId {
    /// Create a tile id from grid coordinates.
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// The key of the tile one zoom level coarser covering this tile.
    ///
    /// Returns `None` for the root level.
    #[inline]
    pub fn parent(&self) -> Option<TileId> {
        if self.zoom == 0 {
            return None;
        }
        Some(TileId {
            zoom: self.zoom - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }

    /// This tile's position within its parent: (0|1, 0|1).
    #[inline]
    pub fn quadrant(&self) -> (u32, u32) {
        (self.x & 1, self.y & 1)
    }
}

impl From<TilePoint> for TileId {
    fn from(p: TilePoint) -> Self {
        Self {
            zoom: p.zoom,
            x: p.x,
            y: p.y,
        }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Lifecycle status of a tile's pixel payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// Created, no fetch started yet.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// Pixel data applied; immutable from here on.
    Loaded,
    /// The fetch failed. Treated like a missing tile by the compositor.
    Error,
}

/// Errors from tile pixel application.
#[derive(Debug, Error)]
pub enum TileError {
    /// Payload length does not match `tile_size^2 * 4`.
    #[error("Pixel payload for tile {id} is {actual} bytes (expected {expected})")]
    PixelSizeMismatch {
        id: TileId,
        expected: usize,
        actual: usize,
    },

    /// `apply_pixel_data` was called a second time.
    #[error("Tile {0} already has pixel data applied")]
    AlreadyLoaded(TileId),
}

/// Status and payload, guarded together by the per-tile lock.
struct TileState {
    status: TileStatus,
    pixels: Option<Bytes>,
}

/// One cache entry of the tile pyramid.
///
/// Thread-safety: `status`/`pixels` are guarded by a per-tile mutex so the
/// fetch layer can apply pixel data from any thread while the compositor
/// reads other tiles concurrently. The `used` frame-liveness marker and the
/// pin count are lock-free atomics.
pub struct Tile {
    id: TileId,
    expected_len: usize,
    state: Mutex<TileState>,
    used: AtomicBool,
    pins: AtomicUsize,
}

impl Tile {
    /// Create a tile in `Idle` status.
    ///
    /// Freshly created tiles are marked used: creation only happens because
    /// the current composition cycle needs them.
    pub(crate) fn new(id: TileId, tile_size: u32) -> Self {
        Self {
            id,
            expected_len: (tile_size as usize) * (tile_size as usize) * BYTES_PER_PIXEL,
            state: Mutex::new(TileState {
                status: TileStatus::Idle,
                pixels: None,
            }),
            used: AtomicBool::new(true),
            pins: AtomicUsize::new(0),
        }
    }

    /// This tile's cache key.
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TileStatus {
        self.state.lock().status
    }

    /// Transition `Idle -> Loading`. No-op in any other status.
    pub fn mark_loading(&self) {
        let mut state = self.state.lock();
        if state.status == TileStatus::Idle {
            state.status = TileStatus::Loading;
        }
    }

    /// Apply the fetched pixel payload, transitioning to `Loaded`.
    ///
    /// Called exactly once per tile by the fetch layer, from any thread.
    /// The payload must be `tile_size^2 * 4` bytes of RGBA8, row-major from
    /// the top-left corner.
    ///
    /// # Errors
    ///
    /// A wrong-sized payload moves the tile to `Error` status and returns
    /// [`TileError::PixelSizeMismatch`]; a repeat call returns
    /// [`TileError::AlreadyLoaded`] and leaves the loaded pixels untouched.
    pub fn apply_pixel_data(&self, data: Bytes) -> Result<(), TileError> {
        let mut state = self.state.lock();
        if state.status == TileStatus::Loaded {
            return Err(TileError::AlreadyLoaded(self.id));
        }
        if data.len() != self.expected_len {
            state.status = TileStatus::Error;
            return Err(TileError::PixelSizeMismatch {
                id: self.id,
                expected: self.expected_len,
                actual: data.len(),
            });
        }
        state.pixels = Some(data);
        state.status = TileStatus::Loaded;
        Ok(())
    }

    /// Transition to `Error` status. The compositor treats an errored tile
    /// identically to a missing one; retries are the fetch layer's concern.
    pub fn mark_error(&self) {
        let mut state = self.state.lock();
        if state.status != TileStatus::Loaded {
            state.status = TileStatus::Error;
        }
    }

    /// A refcounted handle to the loaded pixels, if any.
    ///
    /// The handle stays valid even if the tile is evicted afterwards.
    pub fn loaded_pixels(&self) -> Option<Bytes> {
        let state = self.state.lock();
        if state.status == TileStatus::Loaded {
            state.pixels.clone()
        } else {
            None
        }
    }

    /// Frame-liveness marker: whether the current cycle still needs this tile.
    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    /// Mark this tile as required by the current composition cycle.
    pub fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    pub(crate) fn clear_used(&self) {
        self.used.store(false, Ordering::Release);
    }

    /// Whether any [`PinGuard`] is outstanding.
    pub fn is_pinned(&self) -> bool {
        self.pins.load(Ordering::Acquire) > 0
    }

    /// Pin this tile against eviction while a consumer works with it.
    ///
    /// The pin is a strict atomic count released when the guard drops, so a
    /// presentation thread holding a tile across a cycle boundary cannot
    /// have it disposed underneath it.
    pub fn pin(self: &Arc<Self>) -> PinGuard {
        self.pins.fetch_add(1, Ordering::AcqRel);
        PinGuard {
            tile: Arc::clone(self),
        }
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("used", &self.is_used())
            .field("pins", &self.pins.load(Ordering::Relaxed))
            .finish()
    }
}

/// RAII guard keeping a tile exempt from eviction.
pub struct PinGuard {
    tile: Arc<Tile>,
}

impl PinGuard {
    /// The pinned tile.
    pub fn tile(&self) -> &Arc<Tile> {
        &self.tile
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        self.tile.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels_for(tile_size: u32, value: u8) -> Bytes {
        Bytes::from(vec![
            value;
            (tile_size * tile_size) as usize * BYTES_PER_PIXEL
        ])
    }

    #[test]
    fn test_parent_key_math() {
        let id = TileId::new(3, 5, 4);
        let parent = id.parent().unwrap();
        assert_eq!(parent, TileId::new(2, 2, 2));

        let root = TileId::new(0, 0, 0);
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn test_quadrant() {
        assert_eq!(TileId::new(3, 4, 4).quadrant(), (0, 0));
        assert_eq!(TileId::new(3, 5, 4).quadrant(), (1, 0));
        assert_eq!(TileId::new(3, 4, 5).quadrant(), (0, 1));
        assert_eq!(TileId::new(3, 5, 5).quadrant(), (1, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(TileId::new(12, 2075, 1410).to_string(), "12/2075/1410");
    }

    #[test]
    fn test_lifecycle_idle_loading_loaded() {
        let tile = Tile::new(TileId::new(3, 1, 2), 16);
        assert_eq!(tile.status(), TileStatus::Idle);
        assert!(tile.loaded_pixels().is_none());

        tile.mark_loading();
        assert_eq!(tile.status(), TileStatus::Loading);

        tile.apply_pixel_data(pixels_for(16, 7)).unwrap();
        assert_eq!(tile.status(), TileStatus::Loaded);
        assert_eq!(tile.loaded_pixels().unwrap().len(), 16 * 16 * 4);
    }

    #[test]
    fn test_apply_pixel_data_wrong_size_errors() {
        let tile = Tile::new(TileId::new(3, 1, 2), 16);
        let result = tile.apply_pixel_data(Bytes::from(vec![0u8; 10]));
        assert!(matches!(
            result,
            Err(TileError::PixelSizeMismatch { actual: 10, .. })
        ));
        assert_eq!(tile.status(), TileStatus::Error);
    }

    #[test]
    fn test_apply_pixel_data_twice_rejected() {
        let tile = Tile::new(TileId::new(3, 1, 2), 16);
        tile.apply_pixel_data(pixels_for(16, 1)).unwrap();

        let result = tile.apply_pixel_data(pixels_for(16, 2));
        assert!(matches!(result, Err(TileError::AlreadyLoaded(_))));

        // First payload is untouched
        assert_eq!(tile.loaded_pixels().unwrap()[0], 1);
    }

    #[test]
    fn test_mark_error_does_not_clobber_loaded() {
        let tile = Tile::new(TileId::new(3, 1, 2), 16);
        tile.apply_pixel_data(pixels_for(16, 1)).unwrap();
        tile.mark_error();
        assert_eq!(tile.status(), TileStatus::Loaded);
    }

    #[test]
    fn test_pin_guard_counts() {
        let tile = Arc::new(Tile::new(TileId::new(3, 1, 2), 16));
        assert!(!tile.is_pinned());
        {
            let _a = tile.pin();
            let _b = tile.pin();
            assert!(tile.is_pinned());
        }
        assert!(!tile.is_pinned());
    }

    #[test]
    fn test_pixels_outlive_eviction() {
        // A handle taken before the cache drops its entry stays readable.
        let tile = Arc::new(Tile::new(TileId::new(3, 1, 2), 16));
        tile.apply_pixel_data(pixels_for(16, 42)).unwrap();
        let handle = tile.loaded_pixels().unwrap();
        drop(tile);
        assert!(handle.iter().all(|&b| b == 42));
    }

    #[test]
    fn test_apply_from_other_thread() {
        let tile = Arc::new(Tile::new(TileId::new(5, 10, 11), 16));
        let worker = {
            let tile = Arc::clone(&tile);
            std::thread::spawn(move || {
                tile.mark_loading();
                tile.apply_pixel_data(pixels_for(16, 9)).unwrap();
            })
        };
        worker.join().unwrap();
        assert_eq!(tile.status(), TileStatus::Loaded);
    }
}
