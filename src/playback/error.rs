//! Errors raised by the playback engine.

use thiserror::Error;

/// What went wrong on the playback side of the system.
///
/// Queue errors surface synchronously to the control caller; loop errors
/// terminate the broadcast thread and release the output port.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The pending-swap queue was still full after the enqueue timeout.
    /// The request was rejected, not dropped silently.
    #[error("swap queue is full, request rejected")]
    QueueFull,

    /// The broadcast loop has exited and no longer accepts requests.
    #[error("broadcast loop is no longer running")]
    Disconnected,

    /// The MIDI sink rejected too many events in a row to keep going.
    #[error("MIDI output lost after {0} consecutive send failures")]
    OutputLost(u32),

    /// The logical clock reported a reading earlier than a prior one.
    /// An internal-invariant violation; the loop aborts.
    #[error("logical clock went backwards (previous {previous:.6}s, observed {observed:.6}s)")]
    ClockBackwards { previous: f64, observed: f64 },
}
