//! Vector drawing elements rasterized with tiny-skia.

use tiny_skia::{FillRule, Paint, PathBuilder, PixmapMut, Stroke, Transform};

use super::{Canvas, DrawElement, ViewTransform};
use crate::coord::GeoPoint;

fn build_path(
    points: &[GeoPoint],
    transform: &ViewTransform,
    close: bool,
) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    let mut iter = points.iter();
    let first = iter.next()?;
    let (x, y) = transform.geo_to_screen(*first);
    pb.move_to(x as f32, y as f32);
    for point in iter {
        let (x, y) = transform.geo_to_screen(*point);
        pb.line_to(x as f32, y as f32);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

/// Offsets at which a path must be rasterized: the principal position, plus
/// ±world-width copies under whole-world viewports.
fn world_offsets(transform: &ViewTransform) -> Vec<f32> {
    if transform.spans_world() {
        let world = transform.world_px() as f32;
        vec![-world, 0.0, world]
    } else {
        vec![0.0]
    }
}

/// A stroked polyline over geographic points.
pub struct Polyline {
    points: Vec<GeoPoint>,
    color: [u8; 4],
    stroke_width: f32,
    order: i32,
}

impl Polyline {
    /// Create a polyline. Fewer than two points draws nothing.
    pub fn new(points: Vec<GeoPoint>, color: [u8; 4], stroke_width: f32) -> Self {
        Self {
            points,
            color,
            stroke_width,
            order: 0,
        }
    }

    /// Set the back-to-front ordering key.
    pub fn with_draw_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl DrawElement for Polyline {
    fn draw(&self, canvas: &mut Canvas<'_>, transform: &ViewTransform) {
        if self.points.len() < 2 {
            return;
        }
        let Some(path) = build_path(&self.points, transform, false) else {
            return;
        };
        let offsets = world_offsets(transform);

        let (w, h) = (canvas.width(), canvas.height());
        let Some(mut pixmap) = PixmapMut::from_bytes(canvas.pixels_mut(), w, h) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(self.color[0], self.color[1], self.color[2], self.color[3]);
        paint.anti_alias = true;
        let stroke = Stroke {
            width: self.stroke_width,
            ..Stroke::default()
        };
        for dx in offsets {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::from_translate(dx, 0.0), None);
        }
    }

    fn draw_order(&self) -> i32 {
        self.order
    }
}

/// A filled polygon over geographic points.
pub struct Polygon {
    points: Vec<GeoPoint>,
    fill: [u8; 4],
    order: i32,
}

impl Polygon {
    /// Create a polygon. Fewer than three points draws nothing.
    pub fn new(points: Vec<GeoPoint>, fill: [u8; 4]) -> Self {
        Self {
            points,
            fill,
            order: 0,
        }
    }

    /// Set the back-to-front ordering key.
    pub fn with_draw_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl DrawElement for Polygon {
    fn draw(&self, canvas: &mut Canvas<'_>, transform: &ViewTransform) {
        if self.points.len() < 3 {
            return;
        }
        let Some(path) = build_path(&self.points, transform, true) else {
            return;
        };
        let offsets = world_offsets(transform);

        let (w, h) = (canvas.width(), canvas.height());
        let Some(mut pixmap) = PixmapMut::from_bytes(canvas.pixels_mut(), w, h) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(self.fill[0], self.fill[1], self.fill[2], self.fill[3]);
        paint.anti_alias = true;
        for dx in offsets {
            pixmap.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                Transform::from_translate(dx, 0.0),
                None,
            );
        }
    }

    fn draw_order(&self) -> i32 {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateProps;

    fn draw_on_blank(element: &dyn DrawElement, width: u32, height: u32) -> Vec<u8> {
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, width, height).unwrap();
        let mut pixels = vec![0u8; (width * height) as usize * 4];
        let mut canvas = Canvas::new(&mut pixels, width, height);
        let transform = ViewTransform::new(state, 256);
        element.draw(&mut canvas, &transform);
        pixels
    }

    #[test]
    fn test_polyline_strokes_pixels() {
        // A short east-west line through the view center
        let line = Polyline::new(
            vec![GeoPoint::new(-1.0, 0.0), GeoPoint::new(1.0, 0.0)],
            [255, 0, 0, 255],
            2.0,
        );
        let pixels = draw_on_blank(&line, 128, 128);
        let red = pixels.chunks_exact(4).filter(|p| p[0] > 128).count();
        assert!(red > 0, "stroke left no pixels");
    }

    #[test]
    fn test_polyline_single_point_draws_nothing() {
        let line = Polyline::new(vec![GeoPoint::new(0.0, 0.0)], [255, 0, 0, 255], 2.0);
        let pixels = draw_on_blank(&line, 32, 32);
        assert!(pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_polygon_fills_interior() {
        // A quad around the view center
        let poly = Polygon::new(
            vec![
                GeoPoint::new(-2.0, 2.0),
                GeoPoint::new(2.0, 2.0),
                GeoPoint::new(2.0, -2.0),
                GeoPoint::new(-2.0, -2.0),
            ],
            [0, 0, 255, 255],
        );
        let pixels = draw_on_blank(&poly, 128, 128);

        // The view center lies inside the quad
        let i = (64 * 128 + 64) * 4;
        assert!(pixels[i + 2] > 128, "interior not filled");
    }

    #[test]
    fn test_polygon_two_points_draws_nothing() {
        let poly = Polygon::new(
            vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)],
            [0, 0, 255, 255],
        );
        let pixels = draw_on_blank(&poly, 32, 32);
        assert!(pixels.iter().all(|&b| b == 0));
    }
}
