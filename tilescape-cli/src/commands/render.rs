//! Render command - composite one viewport to a PNG.
//!
//! Stands in for the external collaborators around the engine: a
//! deterministic procedural painter plays the tile fetch layer, and the
//! PNG writer plays the presentation layer reading the front buffer.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::Args;
use tracing::info;

use tilescape::buffer::Buffer;
use tilescape::config::EngineConfig;
use tilescape::coord::GeoPoint;
use tilescape::overlay::{Marker, Polyline};
use tilescape::state::StateProps;
use tilescape::tile::{TileId, TileManager, TileStatus};

use crate::error::CliError;

/// Arguments for the render command.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Longitude of the view center in degrees
    #[arg(long, default_value_t = 0.0)]
    pub lon: f64,

    /// Latitude of the view center in degrees
    #[arg(long, default_value_t = 0.0)]
    pub lat: f64,

    /// Fractional zoom level
    #[arg(long, short = 'z', default_value_t = 3.0)]
    pub zoom: f64,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 512)]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 512)]
    pub height: u32,

    /// Output PNG path
    #[arg(long, short = 'o', default_value = "tilescape.png")]
    pub output: PathBuf,

    /// Optional engine configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Leave every Nth tile unloaded to demonstrate fallback resampling
    #[arg(long)]
    pub holes: Option<u32>,

    /// Draw a demo marker and polyline at the view center
    #[arg(long, default_value_t = false)]
    pub overlays: bool,
}

/// Run the render command.
pub fn run(args: RenderArgs) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };

    let tiles = Arc::new(TileManager::new(config.tile_size));
    let mut buffer = Buffer::new(config, Arc::clone(&tiles))?;

    if args.overlays {
        let center = GeoPoint::new(args.lon, args.lat);
        buffer.add_element(Arc::new(Polyline::new(
            vec![
                GeoPoint::new(args.lon - 2.0, args.lat - 2.0),
                center,
                GeoPoint::new(args.lon + 2.0, args.lat - 2.0),
            ],
            [230, 60, 30, 255],
            3.0,
        )));
        buffer.add_element(Arc::new(
            Marker::new(center, 15, 15, disc_sprite(15, [30, 90, 220, 255]))?
                .with_draw_order(10),
        ));
    }

    let state = StateProps::new(
        GeoPoint::new(args.lon, args.lat),
        args.zoom,
        args.width,
        args.height,
    )?;

    // First cycle selects the window and creates its tiles
    buffer.compose(state)?;

    // Play the fetch layer: paint every idle tile procedurally
    let painted = paint_idle_tiles(&tiles, config.tile_size, args.holes);
    info!(painted, live = tiles.len(), "Painted window tiles");

    // Second cycle composites the now-loaded pyramid
    buffer.compose(state)?;

    let (fw, fh) = buffer.front_size();
    let image = image::RgbaImage::from_raw(fw, fh, buffer.front().to_vec())
        .ok_or(CliError::BufferShape)?;
    image.save(&args.output)?;

    info!(
        output = %args.output.display(),
        "{}",
        buffer.metrics().snapshot()
    );
    println!("Wrote {}x{} frame to {}", fw, fh, args.output.display());
    Ok(())
}

/// Apply deterministic pixels to every idle tile in the cache.
///
/// Skips every `holes`-th tile when requested, leaving it in `Idle` status
/// so the compositor exercises the fallback path. Coarse levels paint
/// first, so a skipped tile always has a loaded ancestor to fall back to.
fn paint_idle_tiles(tiles: &TileManager, tile_size: u32, holes: Option<u32>) -> usize {
    let mut ids = tiles.live_ids();
    ids.sort_by_key(|id| (id.zoom, id.y, id.x));

    let mut painted = 0;
    let mut index = 0u32;
    for id in ids {
        let Some(tile) = tiles.get(&id) else { continue };
        if tile.status() != TileStatus::Idle {
            continue;
        }
        index += 1;
        if let Some(n) = holes {
            if n > 0 && index % n == 0 && id.zoom > 0 {
                continue;
            }
        }
        tile.mark_loading();
        if tile.apply_pixel_data(paint_tile(id, tile_size)).is_ok() {
            painted += 1;
        }
    }
    painted
}

/// Deterministic tile pattern: a flat fill keyed off the tile address with
/// a darker one-pixel border marking tile boundaries.
fn paint_tile(id: TileId, tile_size: u32) -> Bytes {
    let base = [
        90u8.wrapping_add((id.x as u8).wrapping_mul(37)),
        110u8.wrapping_add((id.y as u8).wrapping_mul(53)),
        130u8.wrapping_add(id.zoom.wrapping_mul(29)),
        255,
    ];
    let border = [base[0] / 2, base[1] / 2, base[2] / 2, 255];

    let ts = tile_size as usize;
    let mut data = vec![0u8; ts * ts * 4];
    for y in 0..ts {
        for x in 0..ts {
            let edge = x == 0 || y == 0 || x == ts - 1 || y == ts - 1;
            let px = if edge { border } else { base };
            data[(y * ts + x) * 4..(y * ts + x) * 4 + 4].copy_from_slice(&px);
        }
    }
    Bytes::from(data)
}

/// A filled disc sprite with transparent corners.
fn disc_sprite(size: u32, rgba: [u8; 4]) -> Bytes {
    let s = size as i64;
    let r = s as f64 / 2.0 - 0.5;
    let mut data = vec![0u8; (size * size) as usize * 4];
    for y in 0..s {
        for x in 0..s {
            let dx = x as f64 - r;
            let dy = y as f64 - r;
            if (dx * dx + dy * dy).sqrt() <= r {
                let i = ((y * s + x) as usize) * 4;
                data[i..i + 4].copy_from_slice(&rgba);
            }
        }
    }
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_tile_is_deterministic() {
        let a = paint_tile(TileId::new(3, 4, 4), 32);
        let b = paint_tile(TileId::new(3, 4, 4), 32);
        assert_eq!(a, b);
        assert_ne!(a, paint_tile(TileId::new(3, 5, 4), 32));
    }

    #[test]
    fn test_paint_tile_has_border() {
        let pixels = paint_tile(TileId::new(2, 1, 1), 16);
        // Corner is border-shaded, center is base-shaded
        assert_ne!(&pixels[0..4], &pixels[(8 * 16 + 8) * 4..(8 * 16 + 8) * 4 + 4]);
    }

    #[test]
    fn test_paint_idle_tiles_fills_window() {
        let tiles = Arc::new(TileManager::new(16));
        let config = EngineConfig {
            tile_size: 16,
            parent_levels: 1,
            ..Default::default()
        };
        let mut buffer = Buffer::new(config, Arc::clone(&tiles)).unwrap();
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 64, 64).unwrap();
        buffer.compose(state).unwrap();

        let painted = paint_idle_tiles(&tiles, 16, None);
        assert!(painted > 0);
        let tile = tiles.get(&TileId::new(3, 4, 4)).unwrap();
        assert_eq!(tile.status(), TileStatus::Loaded);
    }

    #[test]
    fn test_holes_leave_tiles_idle() {
        let tiles = Arc::new(TileManager::new(16));
        let config = EngineConfig {
            tile_size: 16,
            parent_levels: 1,
            ..Default::default()
        };
        let mut buffer = Buffer::new(config, Arc::clone(&tiles)).unwrap();
        let state = StateProps::new(GeoPoint::new(0.0, 0.0), 3.0, 64, 64).unwrap();
        buffer.compose(state).unwrap();

        let total = tiles.len();
        let painted = paint_idle_tiles(&tiles, 16, Some(3));
        assert!(painted < total, "holes should leave some tiles unloaded");
    }

    #[test]
    fn test_disc_sprite_transparent_corners() {
        let sprite = disc_sprite(9, [1, 2, 3, 255]);
        assert_eq!(sprite[3], 0, "corner alpha");
        let center = ((4 * 9 + 4) * 4) as usize;
        assert_eq!(sprite[center + 3], 255, "center alpha");
    }
}
