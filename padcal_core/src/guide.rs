//! Guide timer: the periodic prompt source for the guided workflow.
//!
//! Spawns a thread that sends ticks on a bounded channel at the guide
//! refresh cadence. Ticks carry no meaning by themselves; the controller
//! decides what a tick does (display refresh, blink toggle).
//!
//! Safety: each `GuideTimer` spawns exactly one thread that is shut down
//! on `stop()` or drop, preventing thread leaks. `stop()` is idempotent:
//! calling it on an already-stopped timer is a no-op, never an error.

use crossbeam_channel as xch;
use padcal_traits::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct GuideTimer {
    rx: xch::Receiver<()>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle; taken on the first stop()
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl GuideTimer {
    pub fn spawn(interval: Duration, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            // Sleep in short slices so stop() never waits a full interval
            // for the join.
            const SLICE: Duration = Duration::from_millis(10);
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("guide timer received shutdown signal");
                    break;
                }

                // Latest-wins: a full channel means the consumer has not
                // drained the previous tick yet, so this one coalesces.
                if let Err(xch::TrySendError::Disconnected(())) = tx.try_send(()) {
                    tracing::debug!("guide timer consumer disconnected, exiting thread");
                    break;
                }

                let mut remaining = interval;
                while !remaining.is_zero() && !shutdown_clone.load(Ordering::Relaxed) {
                    let step = remaining.min(SLICE);
                    clock.sleep(step);
                    remaining = remaining.saturating_sub(step);
                }
            }
            tracing::trace!("guide timer thread exiting cleanly");
        });

        Self {
            rx,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// True when at least one tick arrived since the last check; drains
    /// the channel so coalesced ticks count once.
    pub fn tick_pending(&self) -> bool {
        self.rx.try_iter().last().is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.join_handle.is_none()
    }

    /// Stop the timer thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("guide timer thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (callers may be in Drop)
                    tracing::warn!(?e, "guide timer thread panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for GuideTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
