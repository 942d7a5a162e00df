//! Tile-window selection.
//!
//! The window is the rectangle of tile cells the back-buffer covers:
//! `ceil(viewport / tile_size) + 2` cells per axis, centered on the tile
//! containing the view center. Columns wrap modulo the tile count at the
//! zoom level; rows clamp (there is no vertical wraparound, rows off the
//! projection edge render as background).

use crate::coord::{clamp_tile_y, wrap_tile_x};
use crate::state::StateProps;

/// The tile-grid rectangle backing one composition cycle.
///
/// `origin_x`/`origin_y` are kept unwrapped (they may be negative or exceed
/// the tile count); wrapping/clamping is applied per cell by
/// [`TileWindow::column`] and [`TileWindow::row`]. Keeping the origin
/// unwrapped makes back-buffer pixel offsets continuous across the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    /// Leftmost cell's unwrapped tile column.
    pub origin_x: i64,
    /// Topmost cell's unclamped tile row.
    pub origin_y: i64,
    /// Cells per row.
    pub count_x: u32,
    /// Cells per column.
    pub count_y: u32,
    /// Zoom level of every cell.
    pub zoom: u8,
}

impl TileWindow {
    /// Compute the window for a camera snapshot.
    pub fn select(state: &StateProps, tile_size: u32) -> Self {
        let count_x = (state.width() + tile_size - 1) / tile_size + 2;
        let count_y = (state.height() + tile_size - 1) / tile_size + 2;
        let (cx, cy) = state.center_tile_f64();
        Self {
            origin_x: cx.floor() as i64 - (count_x / 2) as i64,
            origin_y: cy.floor() as i64 - (count_y / 2) as i64,
            count_x,
            count_y,
            zoom: state.zoom(),
        }
    }

    /// Wrapped tile column of cell `i`.
    #[inline]
    pub fn column(&self, i: u32) -> u32 {
        wrap_tile_x(self.origin_x + i as i64, self.zoom)
    }

    /// Tile row of cell `j`, or `None` when the cell lies off the
    /// projection's top or bottom edge.
    #[inline]
    pub fn row(&self, j: u32) -> Option<u32> {
        clamp_tile_y(self.origin_y + j as i64, self.zoom)
    }

    /// Back-buffer width in pixels.
    #[inline]
    pub fn width_px(&self, tile_size: u32) -> u32 {
        self.count_x * tile_size
    }

    /// Back-buffer height in pixels.
    #[inline]
    pub fn height_px(&self, tile_size: u32) -> u32 {
        self.count_y * tile_size
    }

    /// First cell `(i, j)` showing the given tile, if the window contains it.
    ///
    /// When the window spans the whole world a tile column appears in more
    /// than one cell; the westernmost match is returned.
    pub fn cell_of(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let j = (0..self.count_y).find(|&j| self.row(j) == Some(y))?;
        let i = (0..self.count_x).find(|&i| self.column(i) == x)?;
        Some((i, j))
    }
}
