//! Compositor telemetry for observability.
//!
//! Lock-free atomic counters recorded by the compositor and cache, copied
//! out as point-in-time snapshots for display.
//!
//! ```text
//! Compositor cycle ----> CompositorMetrics ----> TelemetrySnapshot ----> Views
//!                        (atomic counters)       (point-in-time copy)    (CLI, logs)
//! ```
//!
//! # Example
//!
//! ```
//! use tilescape::telemetry::CompositorMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(CompositorMetrics::new());
//! metrics.frame_started();
//! metrics.tile_blitted();
//! metrics.frame_completed();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.frames_completed, 1);
//! ```

mod metrics;
mod snapshot;

pub use metrics::CompositorMetrics;
pub use snapshot::TelemetrySnapshot;

use tracing_subscriber::EnvFilter;

/// Initialize process-wide structured logging.
///
/// Respects `RUST_LOG`; defaults to `info` when unset. Safe to call once at
/// startup; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
