//! The compositor.
//!
//! [`Buffer`] owns the back- and front-buffer pixel arrays and runs the
//! composition cycle: select the tile window for a camera snapshot, request
//! or derive the tiles from the cache, composite them (with parent-fallback
//! resampling) into the tile-aligned back-buffer, resample the back-buffer
//! at sub-pixel precision into the viewport-sized front buffer, then draw
//! vector elements and markers on top.
//!
//! # Pixel conventions
//!
//! All buffers are RGBA8, row-major from the top-left corner. Tile payloads
//! use the same convention, so direct blits are byte-for-byte copies.
//!
//! # Failure model
//!
//! No tile's failure aborts a cycle: an errored or unloaded tile falls back
//! to the nearest loaded ancestor, and a tile with no loaded ancestor
//! anywhere leaves its region as previously rendered. The only way a cycle
//! aborts is disposal of the owning view, which every loop re-checks.

mod blit;
mod resample;
mod window;

pub use window::TileWindow;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, EngineConfig};
use crate::overlay::{Canvas, DrawElement, ElementRegistry, ViewTransform};
use crate::state::StateProps;
use crate::telemetry::CompositorMetrics;
use crate::tile::{TileId, TileManager, BYTES_PER_PIXEL};

/// Compositor lifecycle status.
///
/// Single-shot mode drives `Wait -> Start -> Working -> Complete` per frame;
/// threaded mode parks in `Wait` until the consumer requests `Start`.
/// `Disposed` is reachable from any state and halts the machine permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    /// Idle; no cycle requested.
    Wait,
    /// A cycle has been requested but not begun.
    Start,
    /// A cycle is running.
    Working,
    /// The front buffer holds a completed frame.
    Complete,
    /// Torn down; no further cycles will run.
    Disposed,
}

/// Errors aborting a composition cycle.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The owning view was torn down mid-cycle.
    #[error("Compositor disposed mid-cycle")]
    Disposed,
}

/// Shared teardown flag checked between every phase and loop iteration of a
/// cycle, because the owning view may be torn down while a cycle is
/// mid-flight on another thread.
#[derive(Debug, Default)]
pub struct DisposeFlag(AtomicBool);

impl DisposeFlag {
    /// Create an armed (not disposed) flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal teardown.
    pub fn dispose(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether teardown has been signalled.
    pub fn is_disposed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The tile compositor: back-/front-buffer owner and cycle driver.
pub struct Buffer {
    config: EngineConfig,
    tiles: Arc<TileManager>,
    elements: ElementRegistry,
    metrics: Arc<CompositorMetrics>,
    dispose: Arc<DisposeFlag>,
    status: BufferStatus,
    back: Vec<u8>,
    back_w: u32,
    back_h: u32,
    window: Option<TileWindow>,
    front: Vec<u8>,
    front_w: u32,
    front_h: u32,
    last_state: Option<StateProps>,
    render_state: Option<StateProps>,
}

impl Buffer {
    /// Create a compositor over a tile cache.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an invalid configuration or when the
    /// cache's tile size disagrees with the configuration's.
    pub fn new(config: EngineConfig, tiles: Arc<TileManager>) -> Result<Self, ConfigError> {
        config.validate()?;
        if tiles.tile_size() != config.tile_size {
            return Err(ConfigError::CacheTileSizeMismatch {
                config: config.tile_size,
                cache: tiles.tile_size(),
            });
        }
        Ok(Self {
            config,
            tiles,
            elements: ElementRegistry::new(),
            metrics: Arc::new(CompositorMetrics::new()),
            dispose: Arc::new(DisposeFlag::new()),
            status: BufferStatus::Wait,
            back: Vec::new(),
            back_w: 0,
            back_h: 0,
            window: None,
            front: Vec::new(),
            front_w: 0,
            front_h: 0,
            last_state: None,
            render_state: None,
        })
    }

    /// The configuration this compositor runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The tile cache this compositor populates.
    pub fn tiles(&self) -> &Arc<TileManager> {
        &self.tiles
    }

    /// Compositor telemetry counters.
    pub fn metrics(&self) -> &Arc<CompositorMetrics> {
        &self.metrics
    }

    /// Shared teardown flag; cloned by the worker thread and by owners that
    /// need to abort a cycle from outside.
    pub fn dispose_handle(&self) -> Arc<DisposeFlag> {
        Arc::clone(&self.dispose)
    }

    /// Register an overlay element drawn every cycle.
    pub fn add_element(&mut self, element: Arc<dyn DrawElement>) {
        self.elements.add(element);
    }

    /// The overlay registry.
    pub fn elements_mut(&mut self) -> &mut ElementRegistry {
        &mut self.elements
    }

    /// Current status.
    pub fn status(&self) -> BufferStatus {
        self.status
    }

    /// The snapshot of the last completed cycle, valid until the next cycle
    /// completes.
    pub fn last_state(&self) -> Option<&StateProps> {
        self.last_state.as_ref()
    }

    /// The snapshot of the cycle currently rendering, if one is mid-flight.
    pub fn render_state(&self) -> Option<&StateProps> {
        self.render_state.as_ref()
    }

    /// The completed front buffer. Consumers read it only while
    /// [`Buffer::status`] is `Complete`.
    pub fn front(&self) -> &[u8] {
        &self.front
    }

    /// Front-buffer dimensions in pixels.
    pub fn front_size(&self) -> (u32, u32) {
        (self.front_w, self.front_h)
    }

    /// The tile-aligned back-buffer of the last cycle.
    pub fn back(&self) -> &[u8] {
        &self.back
    }

    /// The tile window of the last cycle.
    pub fn window(&self) -> Option<&TileWindow> {
        self.window.as_ref()
    }

    /// Run one full composition cycle from a camera snapshot.
    ///
    /// Drives `Wait/Complete -> Start -> Working -> Complete`. The cycle
    /// renders from this single snapshot throughout; `last_state` keeps the
    /// previous snapshot until the new cycle reaches `Complete`.
    ///
    /// # Errors
    ///
    /// [`ComposeError::Disposed`] when the owning view was torn down; the
    /// status machine then rests in `Disposed` and later calls return the
    /// same error.
    pub fn compose(&mut self, state: StateProps) -> Result<(), ComposeError> {
        if self.dispose.is_disposed() || self.status == BufferStatus::Disposed {
            self.status = BufferStatus::Disposed;
            return Err(ComposeError::Disposed);
        }
        self.status = BufferStatus::Start;
        self.render_state = Some(state);
        self.metrics.frame_started();
        self.status = BufferStatus::Working;

        match self.run_cycle(&state) {
            Ok(()) => {
                self.status = BufferStatus::Complete;
                self.last_state = Some(state);
                self.render_state = None;
                self.metrics.frame_completed();
                Ok(())
            }
            Err(err) => {
                self.status = BufferStatus::Disposed;
                self.render_state = None;
                self.metrics.frame_aborted();
                debug!("Composition cycle aborted: {}", err);
                Err(err)
            }
        }
    }

    /// Permanently halt the compositor from the owning side.
    pub fn dispose(&mut self) {
        self.dispose.dispose();
        self.status = BufferStatus::Disposed;
        info!("Compositor disposed");
    }

    fn check_disposed(&self) -> Result<(), ComposeError> {
        if self.dispose.is_disposed() {
            Err(ComposeError::Disposed)
        } else {
            Ok(())
        }
    }

    fn run_cycle(&mut self, state: &StateProps) -> Result<(), ComposeError> {
        let ts = self.config.tile_size;
        let window = window::TileWindow::select(state, ts);

        self.ensure_buffers(&window, state);
        self.tiles.mark_all_unused();
        self.select_tiles(&window)?;
        self.composite_back(&window)?;
        self.resample_front(&window, state)?;
        self.draw_overlays(state)?;
        self.tiles.evict_unused();

        self.window = Some(window);
        debug!(
            zoom = state.zoom(),
            cells_x = window.count_x,
            cells_y = window.count_y,
            live_tiles = self.tiles.len(),
            "Composition cycle complete"
        );
        Ok(())
    }

    /// Reallocate the pixel arrays when the viewport size changed;
    /// otherwise reuse them in place.
    fn ensure_buffers(&mut self, window: &TileWindow, state: &StateProps) {
        let ts = self.config.tile_size;
        let (bw, bh) = (window.width_px(ts), window.height_px(ts));
        if (bw, bh) != (self.back_w, self.back_h) {
            self.back = background_pixels(bw, bh, self.config.background);
            self.back_w = bw;
            self.back_h = bh;
            // A resized back-buffer holds no previous frame to fall back on
            self.window = None;
        }
        let (fw, fh) = (state.width(), state.height());
        if (fw, fh) != (self.front_w, self.front_h) {
            self.front = background_pixels(fw, fh, self.config.background);
            self.front_w = fw;
            self.front_h = fh;
        }
    }

    /// Tile-window selection: look up or create every cell's tile, then
    /// walk up to `parent_levels` ancestors creating any missing ones, so
    /// a freshly-panned viewport has some displayable fallback content.
    fn select_tiles(&self, window: &TileWindow) -> Result<(), ComposeError> {
        for j in 0..window.count_y {
            self.check_disposed()?;
            let Some(row) = window.row(j) else { continue };
            for i in 0..window.count_x {
                let id = TileId::new(window.zoom, window.column(i), row);
                self.tiles.get_or_create(id).mark_used();

                let mut current = id;
                for _ in 0..self.config.parent_levels {
                    let Some(parent) = current.parent() else { break };
                    self.tiles.get_or_create(parent).mark_used();
                    current = parent;
                }
            }
        }
        Ok(())
    }

    /// Fallback-resampled compositing into the back-buffer.
    fn composite_back(&mut self, window: &TileWindow) -> Result<(), ComposeError> {
        let ts = self.config.tile_size as usize;
        let back_w = self.back_w as usize;
        let max_depth = window.zoom.min(self.config.tile_size.trailing_zeros() as u8);

        for j in 0..window.count_y {
            self.check_disposed()?;
            let Some(row) = window.row(j) else {
                // Off the projection edge: no tile exists, render background
                for i in 0..window.count_x {
                    blit::fill_cell(
                        &mut self.back,
                        back_w,
                        i as usize,
                        j as usize,
                        ts,
                        self.config.background,
                    );
                }
                continue;
            };

            for i in 0..window.count_x {
                let id = TileId::new(window.zoom, window.column(i), row);
                let own = self.tiles.get(&id).and_then(|t| t.loaded_pixels());

                if let Some(pixels) = own {
                    blit::blit_direct(
                        &mut self.back,
                        back_w,
                        i as usize,
                        j as usize,
                        ts,
                        &pixels,
                    );
                    self.metrics.tile_blitted();
                } else if let Some((pixels, levels_up)) =
                    blit::find_loaded_ancestor(&self.tiles, id, max_depth)
                {
                    blit::blit_fallback(
                        &mut self.back,
                        back_w,
                        i as usize,
                        j as usize,
                        ts,
                        id,
                        &pixels,
                        levels_up,
                    );
                    self.metrics.fallback_blit();
                } else {
                    // Resampling underflow: leave the region as previously
                    // rendered rather than failing the cycle
                    self.metrics.fallback_miss();
                }
            }
        }
        Ok(())
    }

    /// Viewport resampling into the front buffer.
    fn resample_front(
        &mut self,
        window: &TileWindow,
        state: &StateProps,
    ) -> Result<(), ComposeError> {
        let ts = self.config.tile_size as f64;
        let (cfx, cfy) = state.center_tile_f64();
        let center_x = (cfx - window.origin_x as f64) * ts;
        let center_y = (cfy - window.origin_y as f64) * ts;

        resample::resample_nearest(
            &self.back,
            self.back_w,
            self.back_h,
            &mut self.front,
            self.front_w,
            self.front_h,
            center_x,
            center_y,
            state.zoom_factor(),
            &self.dispose,
        )
    }

    /// Overlay pass: vector elements and markers onto the front buffer.
    fn draw_overlays(&mut self, state: &StateProps) -> Result<(), ComposeError> {
        if self.elements.is_empty() {
            return Ok(());
        }
        let transform = ViewTransform::new(*state, self.config.tile_size);
        let mut canvas = Canvas::new(&mut self.front, self.front_w, self.front_h);
        self.elements
            .draw_all(&mut canvas, &transform, &self.metrics, &self.dispose)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("status", &self.status)
            .field("front", &format_args!("{}x{}", self.front_w, self.front_h))
            .field("back", &format_args!("{}x{}", self.back_w, self.back_h))
            .finish()
    }
}

fn background_pixels(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut pixels = vec![0u8; (width as usize) * (height as usize) * BYTES_PER_PIXEL];
    for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.copy_from_slice(&rgba);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::GeoPoint;
    use bytes::Bytes;

    const TS: u32 = 16;

    fn test_config() -> EngineConfig {
        EngineConfig {
            tile_size: TS,
            parent_levels: 2,
            background: [9, 9, 9, 255],
            ..Default::default()
        }
    }

    fn test_buffer() -> Buffer {
        Buffer::new(test_config(), Arc::new(TileManager::new(TS))).unwrap()
    }

    fn state(lon: f64, lat: f64, zoom: f64, w: u32, h: u32) -> StateProps {
        StateProps::new(GeoPoint::new(lon, lat), zoom, w, h).unwrap()
    }

    fn solid_tile(value: u8) -> Bytes {
        Bytes::from(vec![value; (TS * TS) as usize * 4])
    }

    fn back_pixel(buffer: &Buffer, x: usize, y: usize) -> [u8; 4] {
        let (bw, _) = (buffer.back_w as usize, buffer.back_h as usize);
        let i = (y * bw + x) * 4;
        let b = buffer.back();
        [b[i], b[i + 1], b[i + 2], b[i + 3]]
    }

    #[test]
    fn test_tile_size_mismatch_rejected() {
        let result = Buffer::new(test_config(), Arc::new(TileManager::new(256)));
        assert!(matches!(
            result,
            Err(ConfigError::CacheTileSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_first_cycle_creates_window_tiles() {
        let mut buffer = test_buffer();
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();

        assert_eq!(buffer.status(), BufferStatus::Complete);
        let window = buffer.window().unwrap();
        // 64 px viewport over 16 px tiles: 4 + 2 = 6 cells per axis
        assert_eq!(window.count_x, 6);
        assert_eq!(window.count_y, 6);

        // Every window tile and its two warmed ancestor levels exist
        assert!(buffer.tiles().get(&TileId::new(3, 4, 4)).is_some());
        assert!(buffer.tiles().get(&TileId::new(2, 2, 2)).is_some());
        assert!(buffer.tiles().get(&TileId::new(1, 1, 1)).is_some());
    }

    #[test]
    fn test_unloaded_window_renders_background() {
        let mut buffer = test_buffer();
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();

        let (fw, fh) = buffer.front_size();
        assert_eq!((fw, fh), (64, 64));
        assert!(buffer
            .front()
            .chunks_exact(4)
            .all(|p| p == [9, 9, 9, 255]));
    }

    #[test]
    fn test_loaded_tile_blits_into_back_buffer() {
        let mut buffer = test_buffer();
        // Select the window first so the tiles exist
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();

        let tile = buffer.tiles().get(&TileId::new(3, 4, 4)).unwrap();
        tile.apply_pixel_data(solid_tile(200)).unwrap();
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();

        let window = *buffer.window().unwrap();
        let (i, j) = window.cell_of(4, 4).unwrap();
        let px = back_pixel(
            &buffer,
            (i * TS) as usize + 3,
            (j * TS) as usize + 3,
        );
        assert_eq!(px, [200, 200, 200, 200]);
    }

    #[test]
    fn test_fallback_from_warmed_ancestor() {
        let mut buffer = test_buffer();
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();

        // Load only the parent of (3,4,4); the child gets 2x replication
        let parent = buffer.tiles().get(&TileId::new(2, 2, 2)).unwrap();
        parent.apply_pixel_data(solid_tile(111)).unwrap();
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();

        let window = *buffer.window().unwrap();
        let (i, j) = window.cell_of(4, 4).unwrap();
        let px = back_pixel(&buffer, (i * TS) as usize, (j * TS) as usize);
        assert_eq!(px, [111, 111, 111, 111]);
        assert!(buffer.metrics().snapshot().fallback_blits > 0);
    }

    #[test]
    fn test_eviction_after_pan() {
        let mut buffer = test_buffer();
        buffer.compose(state(0.0, 0.0, 6.0, 64, 64)).unwrap();
        let live_before = buffer.tiles().len();
        assert!(buffer.tiles().get(&TileId::new(6, 32, 32)).is_some());

        // Jump far away: the old window's tiles go unused and are evicted
        buffer.compose(state(120.0, 40.0, 6.0, 64, 64)).unwrap();
        assert!(buffer.tiles().get(&TileId::new(6, 32, 32)).is_none());
        assert!(buffer.tiles().stats().evicted >= live_before as u64 / 2);
    }

    #[test]
    fn test_last_state_survives_until_next_complete() {
        let mut buffer = test_buffer();
        let first = state(0.0, 0.0, 3.0, 64, 64);
        buffer.compose(first).unwrap();
        assert_eq!(buffer.last_state(), Some(&first));

        let second = state(10.0, 10.0, 4.0, 64, 64);
        buffer.compose(second).unwrap();
        assert_eq!(buffer.last_state(), Some(&second));
        assert!(buffer.render_state().is_none());
    }

    #[test]
    fn test_buffers_reused_unless_viewport_changes() {
        let mut buffer = test_buffer();
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();
        let front_ptr = buffer.front().as_ptr();
        buffer.compose(state(5.0, 5.0, 3.0, 64, 64)).unwrap();
        assert_eq!(front_ptr, buffer.front().as_ptr());

        buffer.compose(state(5.0, 5.0, 3.0, 96, 64)).unwrap();
        assert_eq!(buffer.front_size(), (96, 64));
    }

    #[test]
    fn test_dispose_aborts_and_sticks() {
        let mut buffer = test_buffer();
        buffer.dispose_handle().dispose();

        let result = buffer.compose(state(0.0, 0.0, 3.0, 64, 64));
        assert!(matches!(result, Err(ComposeError::Disposed)));
        assert_eq!(buffer.status(), BufferStatus::Disposed);

        let again = buffer.compose(state(0.0, 0.0, 3.0, 64, 64));
        assert!(matches!(again, Err(ComposeError::Disposed)));
    }

    #[test]
    fn test_polar_rows_render_background() {
        let mut buffer = test_buffer();
        // Far north: window rows above the projection edge
        buffer.compose(state(0.0, 85.0, 3.0, 64, 64)).unwrap();
        // Top-left back-buffer cell is off-world, so it is background
        assert_eq!(back_pixel(&buffer, 0, 0), [9, 9, 9, 255]);
    }

    #[test]
    fn test_errored_tile_treated_as_missing() {
        let mut buffer = test_buffer();
        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();

        let tile = buffer.tiles().get(&TileId::new(3, 4, 4)).unwrap();
        tile.mark_error();
        let parent = buffer.tiles().get(&TileId::new(2, 2, 2)).unwrap();
        parent.apply_pixel_data(solid_tile(77)).unwrap();

        buffer.compose(state(0.0, 0.0, 3.0, 64, 64)).unwrap();
        let window = *buffer.window().unwrap();
        let (i, j) = window.cell_of(4, 4).unwrap();
        assert_eq!(
            back_pixel(&buffer, (i * TS) as usize, (j * TS) as usize),
            [77, 77, 77, 77]
        );
    }
}
