//! Deferred groove replacement.
//!
//! Control threads enqueue replacement grooves into a bounded queue; the
//! broadcast loop polls the queue at loop boundaries only. A request is
//! first *armed* (detected, threshold recorded) and applied once the
//! active groove has finished looping the requested number of times, so a
//! groove mid-loop is never interrupted.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use groovecast_core::Groove;

use super::error::PlaybackError;
use super::transport::TransportState;

/// Pending replacement requests buffered beyond this are rejected.
pub const SWAP_QUEUE_CAPACITY: usize = 4;

/// How long an enqueue may block on a full queue before failing.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(250);

/// Slice used while blocking for the first groove.
const INITIAL_RECV_SLICE: Duration = Duration::from_millis(50);

/// A replacement groove plus how many times the *current* groove must
/// finish looping before it takes over. The loop in progress when the
/// request arrives counts toward the threshold.
pub struct SwapRequest {
    pub groove: Groove,
    pub loops_before_swap: u32,
}

/// Create the swap queue, returning the control-side sender and the
/// scheduler-side controller.
pub fn swap_channel(transport: Arc<TransportState>) -> (SwapSender, SwapController) {
    let (tx, rx) = bounded(SWAP_QUEUE_CAPACITY);
    (
        SwapSender {
            tx,
            transport: transport.clone(),
        },
        SwapController {
            rx,
            armed: None,
            transport,
        },
    )
}

/// Control-thread half of the swap queue.
#[derive(Clone)]
pub struct SwapSender {
    tx: Sender<SwapRequest>,
    transport: Arc<TransportState>,
}

impl SwapSender {
    /// Enqueue a replacement groove.
    ///
    /// Blocks with backpressure for up to [`ENQUEUE_TIMEOUT`] when the
    /// queue is full, then fails with [`PlaybackError::QueueFull`].
    pub fn request_swap(&self, groove: Groove, loops_before_swap: u32) -> Result<(), PlaybackError> {
        let request = SwapRequest {
            groove,
            loops_before_swap,
        };
        match self.tx.send_timeout(request, ENQUEUE_TIMEOUT) {
            Ok(()) => {
                self.transport.mark_swap_requested();
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => Err(PlaybackError::QueueFull),
            Err(SendTimeoutError::Disconnected(_)) => Err(PlaybackError::Disconnected),
        }
    }
}

struct ArmedSwap {
    groove: Groove,
    /// Loop index at which the replacement becomes active
    switch_at: u64,
}

/// Scheduler-side half of the swap queue. Owned by the broadcast thread;
/// never touched from control threads.
pub struct SwapController {
    rx: Receiver<SwapRequest>,
    armed: Option<ArmedSwap>,
    transport: Arc<TransportState>,
}

impl SwapController {
    /// Block until the first groove arrives, checking the stop flag in
    /// bounded slices. Returns `None` on stop or if every sender is gone.
    pub fn wait_initial(&mut self) -> Option<Groove> {
        loop {
            if self.transport.stop_requested() {
                return None;
            }
            match self.rx.recv_timeout(INITIAL_RECV_SLICE) {
                Ok(request) => {
                    if self.rx.is_empty() {
                        self.transport.clear_swap_requested();
                    }
                    return Some(request.groove);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Called at each loop boundary, before loop `loop_index` is
    /// dispatched (`loop_index` loops of the active groove have completed).
    ///
    /// A newly observed request is armed with a switch threshold of
    /// `(loop_index - 1) + loops_before_swap`: the loop that was already in
    /// progress when the request arrived counts toward it. The armed
    /// groove is returned once `loop_index` reaches the threshold; the
    /// caller must then re-anchor before dispatching anything.
    pub fn poll(&mut self, loop_index: u64) -> Option<Groove> {
        if self.armed.is_none() {
            if let Ok(request) = self.rx.try_recv() {
                let switch_at = loop_index.saturating_sub(1) + request.loops_before_swap as u64;
                self.armed = Some(ArmedSwap {
                    groove: request.groove,
                    switch_at,
                });
            }
        }

        match self.armed.take() {
            Some(armed) if loop_index >= armed.switch_at => {
                if self.rx.is_empty() {
                    self.transport.clear_swap_requested();
                }
                Some(armed.groove)
            }
            not_due => {
                self.armed = not_due;
                None
            }
        }
    }

    /// Whether a replacement has been detected and is awaiting its
    /// loop-count condition.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}
