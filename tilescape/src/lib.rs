//! Tilescape - slippy-map raster compositing engine
//!
//! This library maintains a pyramid of raster map tiles addressed by
//! (zoom, column, row), composites the visible subset into a pixel buffer
//! for the current viewport, and keeps that buffer in sync with a changing
//! camera while tiles stream in asynchronously at variable latency.
//!
//! # Architecture
//!
//! ```text
//! camera state ──► StateProps ──► Buffer ──► TileManager ──► Tiles
//!                  (snapshot)     (compositor)  (cache)        ▲
//!                                     │                        │ apply_pixel_data
//!                                     ▼                   fetch layer (external)
//!                              back-buffer ──► front-buffer ──► presentation (external)
//!                                             (+ overlays)
//! ```
//!
//! The engine never blocks on tile fetches: a tile that has not loaded yet
//! is rendered from the nearest loaded ancestor by box-replicated fallback
//! resampling, and simply sharpens once its own pixels arrive.
//!
//! Composition runs either single-shot on the caller's thread
//! ([`buffer::Buffer::compose`]) or on a dedicated worker
//! ([`worker::CompositorThread`]) synchronized with the consumer through a
//! condition-variable handoff.

pub mod buffer;
pub mod config;
pub mod coord;
pub mod overlay;
pub mod state;
pub mod telemetry;
pub mod tile;
pub mod worker;
