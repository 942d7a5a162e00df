//! Flat 2-D marker sprites.

use bytes::Bytes;

use super::{Canvas, DrawElement, ElementKind, OverlayError, ViewTransform};
use crate::coord::GeoPoint;
use crate::tile::BYTES_PER_PIXEL;

/// A geo-anchored icon alpha-blended onto the front buffer.
///
/// The sprite is an RGBA image positioned by projecting its location into
/// the cycle's pixel space. Blending is `out = lerp(existing, sprite, a)`
/// where `a` combines the marker's uniform alpha with the sprite pixel's
/// own alpha channel. Under whole-world viewports the sprite is replicated
/// at ±world-width offsets so it never vanishes at the wrap seam.
pub struct Marker {
    location: GeoPoint,
    width: u32,
    height: u32,
    pixels: Bytes,
    alpha: f64,
    anchor: (f64, f64),
    order: i32,
}

impl Marker {
    /// Create a marker from a sprite payload.
    ///
    /// # Arguments
    ///
    /// * `location` - Geographic anchor position
    /// * `width`, `height` - Sprite dimensions in pixels
    /// * `pixels` - RGBA payload, `width * height * 4` bytes
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::SpritePixelMismatch`] when the payload
    /// length does not match the dimensions.
    pub fn new(
        location: GeoPoint,
        width: u32,
        height: u32,
        pixels: Bytes,
    ) -> Result<Self, OverlayError> {
        let expected = (width * height) as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(OverlayError::SpritePixelMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            location,
            width,
            height,
            pixels,
            alpha: 1.0,
            anchor: (0.5, 0.5),
            order: 0,
        })
    }

    /// Set the uniform marker alpha in `[0, 1]`.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Set the anchor as a fraction of the sprite (default center; use
    /// `(0.5, 1.0)` for a pin whose tip is the location).
    pub fn with_anchor(mut self, ax: f64, ay: f64) -> Self {
        self.anchor = (ax, ay);
        self
    }

    /// Set the back-to-front ordering key.
    pub fn with_draw_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// The marker's geographic anchor.
    pub fn location(&self) -> GeoPoint {
        self.location
    }

    fn draw_at(&self, canvas: &mut Canvas<'_>, cx: f64, cy: f64) {
        let left = (cx - self.anchor.0 * self.width as f64).round() as i64;
        let top = (cy - self.anchor.1 * self.height as f64).round() as i64;

        for row in 0..self.height {
            for col in 0..self.width {
                let i = ((row * self.width + col) as usize) * BYTES_PER_PIXEL;
                let sprite_alpha = self.pixels[i + 3] as f64 / 255.0;
                let a = self.alpha * sprite_alpha;
                if a <= 0.0 {
                    continue;
                }
                let rgba = [
                    self.pixels[i],
                    self.pixels[i + 1],
                    self.pixels[i + 2],
                    self.pixels[i + 3],
                ];
                canvas.blend_pixel(left + col as i64, top + row as i64, rgba, a);
            }
        }
    }
}

impl DrawElement for Marker {
    fn draw(&self, canvas: &mut Canvas<'_>, transform: &ViewTransform) {
        let (sx, sy) = transform.geo_to_screen(self.location);
        if transform.spans_world() {
            let world = transform.world_px();
            for offset in [-1.0, 0.0, 1.0] {
                self.draw_at(canvas, sx + offset * world, sy);
            }
        } else {
            self.draw_at(canvas, sx, sy);
        }
    }

    fn draw_order(&self) -> i32 {
        self.order
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateProps;

    fn solid_sprite(w: u32, h: u32, rgba: [u8; 4]) -> Bytes {
        let mut data = Vec::with_capacity((w * h) as usize * 4);
        for _ in 0..w * h {
            data.extend_from_slice(&rgba);
        }
        Bytes::from(data)
    }

    fn draw_marker(marker: &Marker, state: StateProps, tile_size: u32) -> Vec<u8> {
        let (w, h) = (state.width(), state.height());
        let mut pixels = vec![0u8; (w * h) as usize * 4];
        let mut canvas = Canvas::new(&mut pixels, w, h);
        let transform = ViewTransform::new(state, tile_size);
        marker.draw(&mut canvas, &transform);
        pixels
    }

    #[test]
    fn test_sprite_size_validation() {
        let result = Marker::new(GeoPoint::new(0.0, 0.0), 4, 4, Bytes::from(vec![0u8; 10]));
        assert!(matches!(
            result,
            Err(OverlayError::SpritePixelMismatch { actual: 10, .. })
        ));
    }

    #[test]
    fn test_opaque_marker_replaces_pixels_at_center() {
        let marker = Marker::new(
            GeoPoint::new(0.0, 0.0),
            2,
            2,
            solid_sprite(2, 2, [255, 0, 0, 255]),
        )
        .unwrap();
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 64, 64).unwrap();
        let pixels = draw_marker(&marker, state, 256);

        // Anchor is the sprite center: pixels at (31..33, 31..33) are red
        let i = (32 * 64 + 32) * 4;
        assert_eq!(&pixels[i..i + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_half_alpha_lerps() {
        let marker = Marker::new(
            GeoPoint::new(0.0, 0.0),
            2,
            2,
            solid_sprite(2, 2, [200, 200, 200, 255]),
        )
        .unwrap()
        .with_alpha(0.5);
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 64, 64).unwrap();
        let pixels = draw_marker(&marker, state, 256);

        let i = (32 * 64 + 32) * 4;
        // lerp(0, 200, 0.5) = 100
        assert_eq!(pixels[i], 100);
    }

    #[test]
    fn test_transparent_sprite_pixels_skipped() {
        let marker = Marker::new(
            GeoPoint::new(0.0, 0.0),
            2,
            2,
            solid_sprite(2, 2, [255, 255, 255, 0]),
        )
        .unwrap();
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 64, 64).unwrap();
        let pixels = draw_marker(&marker, state, 256);
        assert!(pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_whole_world_replication() {
        // Zoom 0 with a 16 px world and 64 px viewport: world repeats, and
        // a marker at lon 180 must appear at both wrapped positions.
        let marker = Marker::new(
            GeoPoint::new(180.0, 0.0),
            2,
            2,
            solid_sprite(2, 2, [0, 255, 0, 255]),
        )
        .unwrap();
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 0.0, 64, 64).unwrap();
        let pixels = draw_marker(&marker, state, 16);

        let green_count = pixels.chunks_exact(4).filter(|p| p[1] == 255).count();
        // 2x2 sprite drawn at more than one world offset
        assert!(green_count >= 8, "expected replicated sprite, got {} px", green_count);
    }

    #[test]
    fn test_offscreen_marker_draws_nothing() {
        let marker = Marker::new(
            GeoPoint::new(90.0, 0.0),
            2,
            2,
            solid_sprite(2, 2, [255, 0, 0, 255]),
        )
        .unwrap();
        // Viewport is a small window at zoom 6; lon 90 is far offscreen
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 6.0, 64, 64).unwrap();
        let pixels = draw_marker(&marker, state, 256);
        assert!(pixels.iter().all(|&b| b == 0));
    }
}
