//! Atomic counters recorded during composition.

use std::sync::atomic::{AtomicU64, Ordering};

use super::TelemetrySnapshot;

/// Cumulative compositor counters.
///
/// All counters use relaxed atomics: they are instrumentation, not
/// synchronization, and single-increment costs stay negligible on the
/// compositing path.
#[derive(Debug, Default)]
pub struct CompositorMetrics {
    frames_started: AtomicU64,
    frames_completed: AtomicU64,
    frames_aborted: AtomicU64,
    tiles_blitted: AtomicU64,
    fallback_blits: AtomicU64,
    fallback_misses: AtomicU64,
    elements_drawn: AtomicU64,
    markers_drawn: AtomicU64,
}

impl CompositorMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A composition cycle began.
    pub fn frame_started(&self) {
        self.frames_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A composition cycle reached `Complete`.
    pub fn frame_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A composition cycle aborted early (disposal mid-cycle).
    pub fn frame_aborted(&self) {
        self.frames_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile's own pixels were copied into the back-buffer.
    pub fn tile_blitted(&self) {
        self.tiles_blitted.fetch_add(1, Ordering::Relaxed);
    }

    /// An ancestor's pixels were substituted for a missing tile.
    pub fn fallback_blit(&self) {
        self.fallback_blits.fetch_add(1, Ordering::Relaxed);
    }

    /// No loaded ancestor existed anywhere up the chain.
    pub fn fallback_miss(&self) {
        self.fallback_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A drawing element ran against the front buffer.
    pub fn element_drawn(&self) {
        self.elements_drawn.fetch_add(1, Ordering::Relaxed);
    }

    /// A marker sprite was blended into the front buffer.
    pub fn marker_drawn(&self) {
        self.markers_drawn.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters into a snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let tiles_blitted = self.tiles_blitted.load(Ordering::Relaxed);
        let fallback_blits = self.fallback_blits.load(Ordering::Relaxed);
        let total_blits = tiles_blitted + fallback_blits;
        TelemetrySnapshot {
            frames_started: self.frames_started.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            frames_aborted: self.frames_aborted.load(Ordering::Relaxed),
            tiles_blitted,
            fallback_blits,
            fallback_misses: self.fallback_misses.load(Ordering::Relaxed),
            elements_drawn: self.elements_drawn.load(Ordering::Relaxed),
            markers_drawn: self.markers_drawn.load(Ordering::Relaxed),
            fallback_ratio: if total_blits > 0 {
                fallback_blits as f64 / total_blits as f64
            } else {
                0.0
            },
        }
    }
}
