//! Logical clock for the broadcast loop.
//!
//! A monotonically advancing time source measured from a fixed origin,
//! with a live-settable tempo used to interpret beat-relative waits.
//! Waits sleep in short bounded slices and poll a cancellation flag, so a
//! stop request is observed within one slice no matter how long the
//! remaining wait is.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on a single sleep slice inside a wait.
pub const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Wall-clock time source with a tempo attached.
pub struct LogicalClock {
    origin: Instant,
    /// BPM stored as f32 bits for atomic access
    bpm: AtomicU64,
}

impl LogicalClock {
    /// Create a clock starting at time zero with the given tempo.
    pub fn new(bpm: f32) -> Self {
        Self {
            origin: Instant::now(),
            bpm: AtomicU64::new(bpm.to_bits() as u64),
        }
    }

    /// Seconds elapsed since the clock was created.
    ///
    /// Readings are monotonically non-decreasing; the broadcast loop treats
    /// a backwards reading as a fatal invariant violation.
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    /// Set the tempo. Affects only waits that begin after this call; a
    /// wait already in progress is measured in absolute time and keeps its
    /// deadline.
    pub fn set_bpm(&self, bpm: f32) {
        self.bpm.store(bpm.to_bits() as u64, Ordering::Relaxed);
    }

    /// Get the current tempo.
    pub fn bpm(&self) -> f32 {
        f32::from_bits(self.bpm.load(Ordering::Relaxed) as u32)
    }

    /// Seconds per beat at the current tempo.
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm() as f64
    }

    /// Convert a beat count to seconds at the tempo in effect right now.
    ///
    /// Callers that want a "beats at current tempo" wait must convert at
    /// the moment the wait begins, not earlier: this is the conversion
    /// point.
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.seconds_per_beat()
    }

    /// Block until `now() >= deadline`, sleeping in bounded slices and
    /// checking `cancel` between slices. Returns `false` if cancelled.
    pub fn wait_until(&self, deadline: f64, cancel: &AtomicBool) -> bool {
        while self.now() < deadline {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            let remaining = deadline - self.now();
            if remaining <= 0.0 {
                break;
            }
            thread::sleep(WAIT_SLICE.min(Duration::from_secs_f64(remaining)));
        }
        true
    }

    /// Block for a relative duration, with the same cancellation behavior
    /// as [`wait_until`](Self::wait_until).
    pub fn wait_for(&self, seconds: f64, cancel: &AtomicBool) -> bool {
        self.wait_until(self.now() + seconds.max(0.0), cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_now_is_monotonic() {
        let clock = LogicalClock::new(120.0);
        let mut previous = clock.now();
        for _ in 0..100 {
            let reading = clock.now();
            assert!(reading >= previous);
            previous = reading;
        }
    }

    #[test]
    fn test_bpm_set_and_get() {
        let clock = LogicalClock::new(120.0);
        assert_eq!(clock.bpm(), 120.0);

        clock.set_bpm(90.0);
        assert_eq!(clock.bpm(), 90.0);
    }

    #[test]
    fn test_beats_convert_at_current_tempo() {
        let clock = LogicalClock::new(120.0);
        // one beat at 120 BPM = 0.5s
        assert!((clock.beats_to_seconds(1.0) - 0.5).abs() < 1e-9);

        // conversion must track the tempo at call time
        clock.set_bpm(60.0);
        assert!((clock.beats_to_seconds(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_wait_until_past_deadline_returns_immediately() {
        let clock = LogicalClock::new(120.0);
        let cancel = AtomicBool::new(false);
        let start = Instant::now();
        assert!(clock.wait_until(0.0, &cancel));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_wait_for_completes_close_to_deadline() {
        let clock = LogicalClock::new(120.0);
        let cancel = AtomicBool::new(false);
        let start = Instant::now();
        assert!(clock.wait_for(0.05, &cancel));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(45));
        assert!(elapsed <= Duration::from_millis(250));
    }

    #[test]
    fn test_cancellation_is_observed_within_slices() {
        let clock = Arc::new(LogicalClock::new(120.0));
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::Relaxed);
        });

        let start = Instant::now();
        // ten-second deadline, cancelled after ~30ms
        let completed = clock.wait_for(10.0, &cancel);
        assert!(!completed);
        assert!(start.elapsed() < Duration::from_millis(500));
        handle.join().unwrap();
    }
}
