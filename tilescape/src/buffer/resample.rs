//! Front-buffer resampling.
//!
//! The back-buffer is tile-grid aligned and coarser than the final output
//! whenever zoom has a fractional component. The front buffer is produced
//! by nearest-neighbor row/column stepping at `zoom_factor` - a pure
//! function of the back-buffer, the window origin, and the snapshot, so
//! re-running it on unchanged inputs yields identical output.

use super::{ComposeError, DisposeFlag};
use crate::tile::BYTES_PER_PIXEL;

/// Resample the back-buffer into the front buffer around the view center.
///
/// # Arguments
///
/// * `back`, `back_w`, `back_h` - Source pixels and dimensions
/// * `front`, `front_w`, `front_h` - Destination pixels and dimensions
/// * `center_x`, `center_y` - View center in back-buffer pixel coordinates
/// * `zoom_factor` - Magnification in `[1, 2)`
/// * `dispose` - Checked per output row; aborts the cycle when set
#[allow(clippy::too_many_arguments)]
pub(crate) fn resample_nearest(
    back: &[u8],
    back_w: u32,
    back_h: u32,
    front: &mut [u8],
    front_w: u32,
    front_h: u32,
    center_x: f64,
    center_y: f64,
    zoom_factor: f64,
    dispose: &DisposeFlag,
) -> Result<(), ComposeError> {
    let half_w = front_w as f64 / 2.0;
    let half_h = front_h as f64 / 2.0;

    // Column step table, computed once and reused for every row
    let src_cols: Vec<usize> = (0..front_w)
        .map(|px| {
            let bx = center_x + (px as f64 + 0.5 - half_w) / zoom_factor;
            (bx.floor().max(0.0) as usize).min(back_w as usize - 1)
        })
        .collect();

    for py in 0..front_h {
        if dispose.is_disposed() {
            return Err(ComposeError::Disposed);
        }
        let by = center_y + (py as f64 + 0.5 - half_h) / zoom_factor;
        let src_row = (by.floor().max(0.0) as usize).min(back_h as usize - 1);
        let src_row_start = src_row * back_w as usize * BYTES_PER_PIXEL;

        let dst_row = &mut front[py as usize * front_w as usize * BYTES_PER_PIXEL..]
            [..front_w as usize * BYTES_PER_PIXEL];
        for (dst_px, &src_col) in dst_row.chunks_exact_mut(BYTES_PER_PIXEL).zip(&src_cols) {
            let src_start = src_row_start + src_col * BYTES_PER_PIXEL;
            dst_px.copy_from_slice(&back[src_start..src_start + BYTES_PER_PIXEL]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_back(w: u32, h: u32) -> Vec<u8> {
        let mut back = vec![0u8; (w * h) as usize * BYTES_PER_PIXEL];
        for y in 0..h {
            for x in 0..w {
                let i = ((y * w + x) as usize) * BYTES_PER_PIXEL;
                back[i] = x as u8;
                back[i + 1] = y as u8;
                back[i + 3] = 0xFF;
            }
        }
        back
    }

    #[test]
    fn test_unity_zoom_is_direct_copy_of_centered_region() {
        let back = gradient_back(16, 16);
        let mut front = vec![0u8; 8 * 8 * BYTES_PER_PIXEL];
        let live = DisposeFlag::new();

        resample_nearest(&back, 16, 16, &mut front, 8, 8, 8.0, 8.0, 1.0, &live).unwrap();

        // Centered 8x8 region of the 16x16 back-buffer: rows/cols 4..12
        for y in 0..8usize {
            for x in 0..8usize {
                let i = (y * 8 + x) * BYTES_PER_PIXEL;
                assert_eq!(front[i], (x + 4) as u8);
                assert_eq!(front[i + 1], (y + 4) as u8);
            }
        }
    }

    #[test]
    fn test_idempotent_resampling() {
        let back = gradient_back(32, 32);
        let live = DisposeFlag::new();
        let mut first = vec![0u8; 12 * 10 * BYTES_PER_PIXEL];
        let mut second = vec![0xEEu8; 12 * 10 * BYTES_PER_PIXEL];

        let back_before = back.clone();
        resample_nearest(&back, 32, 32, &mut first, 12, 10, 16.0, 16.0, 1.5, &live).unwrap();
        resample_nearest(&back, 32, 32, &mut second, 12, 10, 16.0, 16.0, 1.5, &live).unwrap();

        assert_eq!(first, second, "re-running must produce identical output");
        assert_eq!(back, back_before, "inputs must not be mutated");
    }

    #[test]
    fn test_fractional_zoom_duplicates_neighbors() {
        // At zoom_factor ~2 each back pixel covers ~2 front pixels
        let back = gradient_back(16, 16);
        let mut front = vec![0u8; 8 * 8 * BYTES_PER_PIXEL];
        let live = DisposeFlag::new();

        resample_nearest(&back, 16, 16, &mut front, 8, 8, 8.0, 8.0, 1.999, &live).unwrap();

        // Adjacent output columns step through source columns at half rate
        let x_of = |px: usize| front[px * BYTES_PER_PIXEL] as i32;
        for px in 1..8 {
            let step = x_of(px) - x_of(px - 1);
            assert!((0..=1).contains(&step), "step {} at column {}", step, px);
        }
    }

    #[test]
    fn test_dispose_aborts() {
        let back = gradient_back(16, 16);
        let mut front = vec![0u8; 8 * 8 * BYTES_PER_PIXEL];
        let dispose = DisposeFlag::new();
        dispose.dispose();

        let result =
            resample_nearest(&back, 16, 16, &mut front, 8, 8, 8.0, 8.0, 1.0, &dispose);
        assert!(matches!(result, Err(ComposeError::Disposed)));
    }
}
