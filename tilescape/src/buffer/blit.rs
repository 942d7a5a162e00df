//! Back-buffer pixel operations: direct blits, fallback resampling, fills.
//!
//! All buffers are RGBA8, row-major from the top-left corner. Fallback
//! resampling substitutes a loaded ancestor's pixels for a missing tile by
//! extracting the quadrant path the tile occupies within the ancestor and
//! box-replicating it by the zoom-level difference. Replication is exact
//! block duplication, never interpolation, so a fallback region is
//! byte-derivable from the ancestor payload.

use bytes::Bytes;

use crate::tile::{TileId, TileManager, BYTES_PER_PIXEL};

/// Copy a loaded tile's pixels into its window cell, byte-for-byte.
///
/// # Arguments
///
/// * `back` - Back-buffer pixels, `back_w` pixels per row
/// * `cell_x`, `cell_y` - Cell position in the window, in cells
/// * `tile_size` - Tile edge length in pixels
/// * `src` - The tile payload (`tile_size^2 * 4` bytes)
pub(crate) fn blit_direct(
    back: &mut [u8],
    back_w: usize,
    cell_x: usize,
    cell_y: usize,
    tile_size: usize,
    src: &[u8],
) {
    let row_bytes = tile_size * BYTES_PER_PIXEL;
    let dst_x = cell_x * tile_size * BYTES_PER_PIXEL;
    for row in 0..tile_size {
        let dst_start = (cell_y * tile_size + row) * back_w * BYTES_PER_PIXEL + dst_x;
        let src_start = row * row_bytes;
        back[dst_start..dst_start + row_bytes]
            .copy_from_slice(&src[src_start..src_start + row_bytes]);
    }
}

/// Fill a window cell with a solid color.
pub(crate) fn fill_cell(
    back: &mut [u8],
    back_w: usize,
    cell_x: usize,
    cell_y: usize,
    tile_size: usize,
    rgba: [u8; 4],
) {
    let dst_x = cell_x * tile_size * BYTES_PER_PIXEL;
    for row in 0..tile_size {
        let dst_start = (cell_y * tile_size + row) * back_w * BYTES_PER_PIXEL + dst_x;
        for px in back[dst_start..dst_start + tile_size * BYTES_PER_PIXEL]
            .chunks_exact_mut(BYTES_PER_PIXEL)
        {
            px.copy_from_slice(&rgba);
        }
    }
}

/// Blit a tile's cell from an ancestor `levels_up` zoom levels coarser.
///
/// The ancestor covers `2^levels_up` tiles per axis; the source is the
/// `tile_size >> levels_up` square at the tile's quadrant path, and every
/// source pixel is replicated `2^levels_up` times in each dimension.
///
/// # Arguments
///
/// * `tile` - The tile being substituted (determines the quadrant path)
/// * `ancestor` - Loaded payload of the tile at `tile.zoom - levels_up`
/// * `levels_up` - Ancestor distance; `tile_size >> levels_up` must be >= 1
pub(crate) fn blit_fallback(
    back: &mut [u8],
    back_w: usize,
    cell_x: usize,
    cell_y: usize,
    tile_size: usize,
    tile: TileId,
    ancestor: &[u8],
    levels_up: u8,
) {
    let factor = 1usize << levels_up;
    let src_size = tile_size >> levels_up;
    debug_assert!(src_size > 0);

    // Position of this tile within the ancestor's 2^k x 2^k child grid
    let mask = (factor - 1) as u32;
    let qx = (tile.x & mask) as usize;
    let qy = (tile.y & mask) as usize;

    let mut replicated_row = vec![0u8; tile_size * BYTES_PER_PIXEL];
    let dst_x = cell_x * tile_size * BYTES_PER_PIXEL;

    for src_row in 0..src_size {
        // Gather one source row from the quadrant sub-rectangle
        let src_start = ((qy * src_size + src_row) * tile_size + qx * src_size) * BYTES_PER_PIXEL;
        let src_slice = &ancestor[src_start..src_start + src_size * BYTES_PER_PIXEL];

        // Horizontally replicate each source pixel `factor` times
        for (src_px, dst_block) in src_slice
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(replicated_row.chunks_exact_mut(factor * BYTES_PER_PIXEL))
        {
            for dst_px in dst_block.chunks_exact_mut(BYTES_PER_PIXEL) {
                dst_px.copy_from_slice(src_px);
            }
        }

        // Vertically replicate the row `factor` times
        for dup in 0..factor {
            let dst_row = cell_y * tile_size + src_row * factor + dup;
            let dst_start = dst_row * back_w * BYTES_PER_PIXEL + dst_x;
            back[dst_start..dst_start + tile_size * BYTES_PER_PIXEL]
                .copy_from_slice(&replicated_row);
        }
    }
}

/// Walk the ancestor chain until a loaded tile is found.
///
/// Returns the ancestor's payload and its distance in zoom levels, or
/// `None` when no loaded ancestor exists within `max_depth` (the
/// resampling-underflow case; the caller leaves the region untouched).
pub(crate) fn find_loaded_ancestor(
    tiles: &TileManager,
    id: TileId,
    max_depth: u8,
) -> Option<(Bytes, u8)> {
    let mut current = id;
    for levels_up in 1..=max_depth {
        let parent = current.parent()?;
        if let Some(tile) = tiles.get(&parent) {
            if let Some(pixels) = tile.loaded_pixels() {
                return Some((pixels, levels_up));
            }
        }
        current = parent;
    }
    None
}
