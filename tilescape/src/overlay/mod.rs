//! Overlay composition onto the front buffer.
//!
//! After viewport resampling, two categories of overlay draw directly onto
//! the front-buffer pixels: vector drawing elements (polylines, polygons)
//! and flat 2-D markers. External registries supply elements implementing
//! [`DrawElement`]; the compositor calls each visible element once per
//! cycle, back-to-front through a deterministic comparator
//! (draw order, then insertion sequence).

mod marker;
mod path;

pub use marker::Marker;
pub use path::{Polygon, Polyline};

use std::sync::Arc;

use thiserror::Error;

use crate::buffer::{ComposeError, DisposeFlag};
use crate::coord::{self, GeoPoint, MercatorPoint};
use crate::state::StateProps;
use crate::telemetry::CompositorMetrics;
use crate::tile::BYTES_PER_PIXEL;

/// Errors constructing overlay elements.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Sprite payload length does not match its dimensions.
    #[error("Sprite payload is {actual} bytes (expected {expected} for {width}x{height})")]
    SpritePixelMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// What kind of overlay an element is; used for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Polylines, polygons, other vector drawing.
    Vector,
    /// Flat 2-D icon sprites.
    Marker,
}

/// Maps geographic/Mercator positions into front-buffer pixel space.
///
/// The horizontal delta from the view center is normalized to the shortest
/// wrapped distance, so elements just across the antimeridian land beside
/// the center rather than a world away.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform {
    state: StateProps,
    tile_size: u32,
}

impl ViewTransform {
    /// Build the transform for one composition cycle.
    pub fn new(state: StateProps, tile_size: u32) -> Self {
        Self { state, tile_size }
    }

    /// The snapshot this transform maps into.
    pub fn state(&self) -> &StateProps {
        &self.state
    }

    /// Width of the whole wrapped world in front-buffer pixels.
    pub fn world_px(&self) -> f64 {
        self.state.world_px(self.tile_size)
    }

    /// Whether overlays must replicate at ±world-width offsets.
    pub fn spans_world(&self) -> bool {
        self.state.spans_world(self.tile_size)
    }

    /// Front-buffer pixel position of a Mercator point (principal value).
    pub fn mercator_to_screen(&self, m: MercatorPoint) -> (f64, f64) {
        let center = self.state.center();
        let mut dx = coord::wrap_unit(m.x) - center.x;
        if dx > 0.5 {
            dx -= 1.0;
        } else if dx < -0.5 {
            dx += 1.0;
        }
        let world = self.world_px();
        (
            self.state.width() as f64 / 2.0 + dx * world,
            self.state.height() as f64 / 2.0 + (m.y - center.y) * world,
        )
    }

    /// Front-buffer pixel position of a geographic point (principal value).
    pub fn geo_to_screen(&self, geo: GeoPoint) -> (f64, f64) {
        self.mercator_to_screen(coord::geo_to_mercator(geo))
    }
}

/// A mutable view over the front buffer handed to drawing elements.
pub struct Canvas<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    /// Wrap a front buffer. `pixels` must be `width * height * 4` bytes.
    pub(crate) fn new(pixels: &'a mut [u8], width: u32, height: u32) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize * BYTES_PER_PIXEL);
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA pixel access for rasterizers.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.pixels
    }

    /// Blend one pixel: `out = lerp(existing, rgba, alpha)`.
    ///
    /// Out-of-bounds positions are ignored.
    pub fn blend_pixel(&mut self, x: i64, y: i64, rgba: [u8; 4], alpha: f64) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        for (c, &src) in rgba.iter().enumerate() {
            let existing = self.pixels[i + c] as f64;
            self.pixels[i + c] = (existing + (src as f64 - existing) * a).round() as u8;
        }
    }
}

/// An overlay drawn onto the front buffer once per composition cycle.
///
/// Implementations must be thread-safe (`Send + Sync`): in threaded mode
/// the compositor calls `draw` from its worker thread.
pub trait DrawElement: Send + Sync {
    /// Write or blend pixels through the cycle's coordinate transform.
    fn draw(&self, canvas: &mut Canvas<'_>, transform: &ViewTransform);

    /// Back-to-front ordering key; lower draws earlier. Ties break by
    /// insertion order.
    fn draw_order(&self) -> i32 {
        0
    }

    /// Telemetry category.
    fn kind(&self) -> ElementKind {
        ElementKind::Vector
    }
}

/// Insertion-ordered collection of overlay elements.
#[derive(Default)]
pub struct ElementRegistry {
    elements: Vec<Arc<dyn DrawElement>>,
}

impl ElementRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element.
    pub fn add(&mut self, element: Arc<dyn DrawElement>) {
        self.elements.push(element);
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Remove all elements.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Draw every element in comparator order.
    ///
    /// The dispose flag is re-checked between elements so teardown mid-cycle
    /// aborts promptly.
    pub(crate) fn draw_all(
        &self,
        canvas: &mut Canvas<'_>,
        transform: &ViewTransform,
        metrics: &CompositorMetrics,
        dispose: &DisposeFlag,
    ) -> Result<(), ComposeError> {
        let mut ordered: Vec<(usize, &Arc<dyn DrawElement>)> =
            self.elements.iter().enumerate().collect();
        ordered.sort_by_key(|(seq, e)| (e.draw_order(), *seq));

        for (_, element) in ordered {
            if dispose.is_disposed() {
                return Err(ComposeError::Disposed);
            }
            element.draw(canvas, transform);
            metrics.element_drawn();
            if element.kind() == ElementKind::Marker {
                metrics.marker_drawn();
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementRegistry")
            .field("len", &self.elements.len())
            .finish()
    }
}
