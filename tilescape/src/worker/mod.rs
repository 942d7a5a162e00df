//! Threaded compositor execution.
//!
//! [`CompositorThread`] runs the composition cycle on a dedicated thread,
//! synchronized with the foreground consumer through a small state machine:
//! the worker parks in `Wait` until the consumer submits a snapshot
//! (`Start`), runs the cycle to `Complete`, and parks again. The handoff
//! uses a condition variable rather than a spin-wait, so the parked worker
//! costs no CPU while idle.
//!
//! The consumer side never blocks on composition: [`CompositorThread::submit`]
//! just deposits the latest snapshot (a newer submission replaces an
//! unrendered older one), and [`CompositorThread::with_frame`] reads the
//! front buffer only when a completed frame is available right now.
//!
//! `Disposed` is reachable from any state: teardown raises the shared
//! dispose flag (checked inside every compositor loop), marks the machine
//! disposed, wakes the worker, and joins it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{info, warn};

use crate::buffer::{Buffer, BufferStatus, ComposeError, DisposeFlag};
use crate::state::StateProps;

/// Errors starting the compositor thread.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The OS refused to spawn the thread.
    #[error("Failed to spawn compositor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// State shared between the worker and the consumer.
struct Slot {
    status: BufferStatus,
    pending: Option<StateProps>,
    /// The compositor, present whenever a cycle is not running. The worker
    /// takes it out for the duration of a cycle so composition happens
    /// without holding the lock.
    buffer: Option<Buffer>,
}

struct Shared {
    slot: Mutex<Slot>,
    cv: Condvar,
}

/// Read access to a completed frame, valid for the duration of the
/// consumer's closure.
pub struct FrameRef<'a> {
    buffer: &'a Buffer,
}

impl FrameRef<'_> {
    /// The front-buffer pixels (RGBA8, row-major, top-left origin).
    pub fn pixels(&self) -> &[u8] {
        self.buffer.front()
    }

    /// Front-buffer dimensions in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.buffer.front_size()
    }

    /// The snapshot this frame was rendered from, for coordinate mapping.
    pub fn state(&self) -> Option<&StateProps> {
        self.buffer.last_state()
    }
}

/// Handle to a compositor running on its own thread.
///
/// Dropping the handle disposes the compositor and joins the thread.
pub struct CompositorThread {
    shared: Arc<Shared>,
    dispose: Arc<DisposeFlag>,
    join: Option<JoinHandle<()>>,
}

impl CompositorThread {
    /// Move a compositor onto a dedicated thread.
    pub fn spawn(buffer: Buffer) -> Result<Self, WorkerError> {
        let dispose = buffer.dispose_handle();
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                status: BufferStatus::Wait,
                pending: None,
                buffer: Some(buffer),
            }),
            cv: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let thread_dispose = Arc::clone(&dispose);
        let join = thread::Builder::new()
            .name("tilescape-compositor".into())
            .spawn(move || run_loop(thread_shared, thread_dispose))?;

        Ok(Self {
            shared,
            dispose,
            join: Some(join),
        })
    }

    /// Current machine status.
    pub fn status(&self) -> BufferStatus {
        self.shared.slot.lock().status
    }

    /// Deposit the next camera snapshot and wake the worker.
    ///
    /// Never blocks on composition. If a cycle is mid-flight the snapshot
    /// parks until that cycle finishes; a newer submission replaces an
    /// unrendered older one (latest wins). Returns `false` once disposed.
    pub fn submit(&self, state: StateProps) -> bool {
        let mut slot = self.shared.slot.lock();
        if slot.status == BufferStatus::Disposed {
            return false;
        }
        slot.pending = Some(state);
        if slot.status != BufferStatus::Working {
            slot.status = BufferStatus::Start;
        }
        self.shared.cv.notify_all();
        true
    }

    /// Run `f` against the completed frame, if one is available right now.
    ///
    /// Returns `None` without blocking when no frame is complete (a cycle
    /// is mid-flight, nothing was submitted yet, or the compositor is
    /// disposed). The frame and its snapshot stay consistent for the
    /// duration of the closure.
    pub fn with_frame<R>(&self, f: impl FnOnce(FrameRef<'_>) -> R) -> Option<R> {
        let slot = self.shared.slot.lock();
        if slot.status != BufferStatus::Complete {
            return None;
        }
        let buffer = slot.buffer.as_ref()?;
        Some(f(FrameRef { buffer }))
    }

    /// Block up to `timeout` for a completed frame, then run `f` against it.
    ///
    /// A convenience for callers that want frame-paced consumption; returns
    /// `None` on timeout or disposal.
    pub fn wait_frame<R>(&self, timeout: Duration, f: impl FnOnce(FrameRef<'_>) -> R) -> Option<R> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        loop {
            match slot.status {
                BufferStatus::Complete => {
                    let buffer = slot.buffer.as_ref()?;
                    return Some(f(FrameRef { buffer }));
                }
                BufferStatus::Disposed => return None,
                _ => {
                    if self.shared.cv.wait_until(&mut slot, deadline).timed_out() {
                        return None;
                    }
                }
            }
        }
    }

    /// Tear the compositor down and join its thread.
    ///
    /// Safe to call while a cycle is mid-flight: the dispose flag is
    /// re-checked inside every compositor loop, so the worker aborts
    /// promptly and exits.
    pub fn dispose(&mut self) {
        self.dispose.dispose();
        {
            let mut slot = self.shared.slot.lock();
            slot.status = BufferStatus::Disposed;
        }
        self.shared.cv.notify_all();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for CompositorThread {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run_loop(shared: Arc<Shared>, dispose: Arc<DisposeFlag>) {
    info!("Compositor thread starting");
    loop {
        // Park until there is a snapshot to render or we are torn down
        let (mut buffer, state) = {
            let mut slot = shared.slot.lock();
            loop {
                if slot.status == BufferStatus::Disposed || dispose.is_disposed() {
                    slot.status = BufferStatus::Disposed;
                    shared.cv.notify_all();
                    info!("Compositor thread stopped");
                    return;
                }
                if slot.status == BufferStatus::Start {
                    break;
                }
                shared.cv.wait(&mut slot);
            }

            let Some(state) = slot.pending.take() else {
                slot.status = BufferStatus::Wait;
                continue;
            };
            let Some(buffer) = slot.buffer.take() else {
                warn!("Compositor slot lost its buffer; stopping");
                slot.status = BufferStatus::Disposed;
                shared.cv.notify_all();
                return;
            };
            slot.status = BufferStatus::Working;
            (buffer, state)
        };

        // Compose without holding the lock; the dispose flag inside the
        // buffer aborts mid-cycle teardowns
        let result = buffer.compose(state);

        let mut slot = shared.slot.lock();
        slot.buffer = Some(buffer);
        match result {
            Ok(()) => {
                if slot.status == BufferStatus::Disposed || dispose.is_disposed() {
                    slot.status = BufferStatus::Disposed;
                    shared.cv.notify_all();
                    info!("Compositor thread stopped");
                    return;
                }
                // A snapshot submitted during the cycle starts immediately
                slot.status = if slot.pending.is_some() {
                    BufferStatus::Start
                } else {
                    BufferStatus::Complete
                };
                shared.cv.notify_all();
            }
            Err(ComposeError::Disposed) => {
                slot.status = BufferStatus::Disposed;
                shared.cv.notify_all();
                info!("Compositor thread stopped");
                return;
            }
        }
    }
}
