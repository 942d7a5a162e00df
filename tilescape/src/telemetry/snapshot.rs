//! Point-in-time copies of compositor counters.

use std::fmt;

/// A consistent-enough copy of [`CompositorMetrics`](super::CompositorMetrics)
/// taken for display. Individual fields are loaded independently; exact
/// cross-field consistency is not guaranteed or needed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Composition cycles started.
    pub frames_started: u64,
    /// Composition cycles completed.
    pub frames_completed: u64,
    /// Composition cycles aborted by disposal.
    pub frames_aborted: u64,
    /// Tiles blitted from their own pixels.
    pub tiles_blitted: u64,
    /// Tiles blitted from an ancestor (fallback resampling).
    pub fallback_blits: u64,
    /// Tiles with no loaded ancestor anywhere in the chain.
    pub fallback_misses: u64,
    /// Drawing elements run.
    pub elements_drawn: u64,
    /// Markers blended.
    pub markers_drawn: u64,
    /// Share of blits served by fallback, in `[0, 1]`.
    pub fallback_ratio: f64,
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames: {}/{} completed ({} aborted), blits: {} direct + {} fallback ({:.0}% fallback), {} misses",
            self.frames_completed,
            self.frames_started,
            self.frames_aborted,
            self.tiles_blitted,
            self.fallback_blits,
            self.fallback_ratio * 100.0,
            self.fallback_misses,
        )
    }
}
