//! Shared transport state: pause/stop flags and the live tempo override.
//!
//! One instance is shared between the control surface and the broadcast
//! loop. Each field is synchronized independently; no compound atomicity
//! is needed across them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Control flags and live tempo, mutated by control threads and observed
/// by the broadcast loop.
#[derive(Default)]
pub struct TransportState {
    paused: AtomicBool,
    stop_requested: AtomicBool,
    swap_requested: AtomicBool,
    /// Live tempo override as f32 bits; zero bits means "no override"
    tempo_override: AtomicU64,
}

impl TransportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend event dispatch. The broadcast loop stalls without advancing
    /// its schedule until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    /// Resume event dispatch after a pause.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Request a non-recoverable stop. Observed within one wait slice.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Relaxed)
    }

    /// Clear a previous stop so a fresh broadcast session can start.
    /// A loop that already observed the stop stays stopped.
    pub fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::Relaxed);
    }

    /// The stop flag itself, for handing to cancellable waits.
    pub fn stop_flag(&self) -> &AtomicBool {
        &self.stop_requested
    }

    /// Set the live tempo override. Rejects non-finite or non-positive
    /// values and returns whether the value was accepted.
    pub fn set_tempo(&self, bpm: f32) -> bool {
        if !bpm.is_finite() || bpm <= 0.0 {
            return false;
        }
        self.tempo_override
            .store(bpm.to_bits() as u64, Ordering::Relaxed);
        true
    }

    /// The live tempo override, if one has been set this session.
    pub fn tempo_override(&self) -> Option<f32> {
        let bits = self.tempo_override.load(Ordering::Relaxed);
        if bits == 0 {
            None
        } else {
            Some(f32::from_bits(bits as u32))
        }
    }

    pub(crate) fn mark_swap_requested(&self) {
        self.swap_requested.store(true, Ordering::Relaxed);
    }

    pub(crate) fn clear_swap_requested(&self) {
        self.swap_requested.store(false, Ordering::Relaxed);
    }

    /// Whether a groove replacement has been requested and not yet applied.
    pub fn swap_requested(&self) -> bool {
        self.swap_requested.load(Ordering::Relaxed)
    }
}
