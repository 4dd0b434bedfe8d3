//! The real-time broadcast loop.
//!
//! Owns the active groove and streams its note events to the output sink,
//! looping until stopped. Every loop's start time is computed from a fixed
//! reference ("anchor") rather than from the previous loop's actual end,
//! so per-loop wait inaccuracy never accumulates. Queued replacement
//! grooves are applied only at loop boundaries, never mid-dispatch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use groovecast_core::{bpm_to_micros_per_beat, Groove, NoteEvent};
use tracing::{debug, error, info, warn};

use super::clock::LogicalClock;
use super::error::PlaybackError;
use super::sink::NoteSink;
use super::swap::{swap_channel, SwapController, SwapSender};
use super::transport::TransportState;

/// Consecutive sink failures tolerated before playback aborts.
const MAX_SINK_FAILURES: u32 = 8;

/// Sleep slice while paused.
const PAUSE_SLICE: Duration = Duration::from_millis(10);

/// Re-check interval for a groove whose total tick length is zero.
const EMPTY_GROOVE_BACKOFF: f64 = 0.05;

/// Compact description of the active groove, for status reporting.
#[derive(Clone, Debug)]
pub struct GrooveSummary {
    pub events: usize,
    pub total_ticks: u64,
    pub ticks_per_beat: u16,
    pub tempo_micros_per_beat: u32,
    pub duration_seconds: f64,
}

impl GrooveSummary {
    fn of(groove: &Groove) -> Self {
        Self {
            events: groove.events().len(),
            total_ticks: groove.total_ticks(),
            ticks_per_beat: groove.ticks_per_beat(),
            tempo_micros_per_beat: groove.tempo_micros_per_beat(),
            duration_seconds: groove.duration_seconds(),
        }
    }
}

/// Point-in-time view of the playback state.
#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    pub playing: bool,
    pub loop_index: u64,
    pub swap_armed: bool,
    pub bpm: f32,
    pub active: Option<GrooveSummary>,
}

#[derive(Default)]
struct SharedStatus {
    playing: AtomicBool,
    loop_index: AtomicU64,
    swap_armed: AtomicBool,
    active: Mutex<Option<GrooveSummary>>,
}

/// Handle to a running broadcast thread.
///
/// Dropping the handle stops playback and joins the thread.
pub struct Broadcaster {
    transport: Arc<TransportState>,
    clock: Arc<LogicalClock>,
    swap_tx: SwapSender,
    status: Arc<SharedStatus>,
    thread: Option<JoinHandle<()>>,
}

impl Broadcaster {
    /// Spawn the broadcast thread. It blocks until the first groove is
    /// enqueued, then loops it until stopped or replaced.
    pub fn spawn<S>(sink: S, transport: Arc<TransportState>, clock: Arc<LogicalClock>) -> Self
    where
        S: NoteSink + Send + 'static,
    {
        let (swap_tx, swap_rx) = swap_channel(transport.clone());
        let status = Arc::new(SharedStatus::default());

        let thread = {
            let clock = clock.clone();
            let transport = transport.clone();
            let status = status.clone();
            thread::spawn(move || {
                let mut broadcast = BroadcastLoop {
                    sink,
                    clock,
                    transport,
                    swap: swap_rx,
                    status: status.clone(),
                    sink_failures: 0,
                };
                match broadcast.run() {
                    Ok(()) => info!("broadcast loop finished"),
                    Err(e) => error!("broadcast loop aborted: {e}"),
                }
                status.playing.store(false, Ordering::Relaxed);
            })
        };

        Self {
            transport,
            clock,
            swap_tx,
            status,
            thread: Some(thread),
        }
    }

    /// Queue a replacement groove, deferred by `loops_before_swap` loops
    /// of the currently active groove. The first groove enqueued starts
    /// playback immediately.
    pub fn enqueue_groove(
        &self,
        groove: Groove,
        loops_before_swap: u32,
    ) -> Result<(), PlaybackError> {
        self.swap_tx.request_swap(groove, loops_before_swap)
    }

    /// Suspend dispatch without advancing the schedule.
    pub fn pause(&self) {
        self.transport.pause();
    }

    /// Resume dispatch after a pause.
    pub fn resume(&self) {
        self.transport.resume();
    }

    /// Stop playback for good. Takes effect within one wait slice.
    pub fn stop(&self) {
        self.transport.request_stop();
    }

    /// Set the live tempo. Rescales the active groove's effective tempo
    /// and the clock's beat rate together, so displayed and audible tempo
    /// always agree. Returns whether the value was accepted.
    pub fn set_tempo(&self, bpm: f32) -> bool {
        if self.transport.set_tempo(bpm) {
            self.clock.set_bpm(bpm);
            true
        } else {
            false
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status.playing.load(Ordering::Relaxed)
    }

    /// Snapshot the playback state for status reporting.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            playing: self.status.playing.load(Ordering::Relaxed),
            loop_index: self.status.loop_index.load(Ordering::Relaxed),
            swap_armed: self.status.swap_armed.load(Ordering::Relaxed),
            bpm: self.clock.bpm(),
            active: self.status.active.lock().unwrap().clone(),
        }
    }

    /// Stop playback and wait for the broadcast thread to exit.
    pub fn shutdown(mut self) {
        self.transport.request_stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.transport.request_stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The loop body, running on its own thread with exclusive ownership of
/// the sink.
struct BroadcastLoop<S> {
    sink: S,
    clock: Arc<LogicalClock>,
    transport: Arc<TransportState>,
    swap: SwapController,
    status: Arc<SharedStatus>,
    sink_failures: u32,
}

impl<S: NoteSink> BroadcastLoop<S> {
    fn run(&mut self) -> Result<(), PlaybackError> {
        let Some(mut groove) = self.swap.wait_initial() else {
            return Ok(());
        };
        self.activate(&groove);

        let mut reference_time = self.clock.now();
        let mut loop_index: u64 = 0;
        let mut micros_per_beat = self.effective_tempo(&groove);
        let mut last_reading = reference_time;

        loop {
            if self.transport.stop_requested() {
                break;
            }

            // A live tempo edit rescales the active groove. Rebase the
            // anchor so completed loops keep the duration they actually
            // played at and future anchors stay continuous.
            let current = self.effective_tempo(&groove);
            if current != micros_per_beat {
                let old_duration = groove.duration_seconds_at(micros_per_beat);
                let new_duration = groove.duration_seconds_at(current);
                reference_time += loop_index as f64 * (old_duration - new_duration);
                micros_per_beat = current;
                debug!(micros_per_beat, "tempo changed, anchor rebased");
            }

            let duration = groove.duration_seconds_at(micros_per_beat);
            let expected_start = reference_time + loop_index as f64 * duration;
            if !self
                .clock
                .wait_until(expected_start, self.transport.stop_flag())
            {
                break;
            }

            let now = self.clock.now();
            if now < last_reading {
                return Err(PlaybackError::ClockBackwards {
                    previous: last_reading,
                    observed: now,
                });
            }
            last_reading = now;

            if let Some(next) = self.swap.poll(loop_index) {
                info!(
                    events = next.events().len(),
                    total_ticks = next.total_ticks(),
                    "switched to queued groove"
                );
                groove = next;
                reference_time = self.clock.now();
                loop_index = 0;
                micros_per_beat = self.effective_tempo(&groove);
                self.activate(&groove);
                // fresh anchor: recompute the duration before dispatching
                continue;
            }
            self.status
                .swap_armed
                .store(self.swap.is_armed(), Ordering::Relaxed);

            if duration <= 0.0 {
                // a zero-length groove would spin the anchor loop flat out
                if !self
                    .clock
                    .wait_for(EMPTY_GROOVE_BACKOFF, self.transport.stop_flag())
                {
                    break;
                }
            }

            // One pass over the groove: place each event at its tick
            // offset from the loop anchor.
            let seconds_per_tick = groove.seconds_per_tick_at(micros_per_beat);
            let mut anchor = expected_start;
            let mut elapsed_ticks: u64 = 0;
            let mut aborted = false;

            for event in groove.events() {
                if self.transport.stop_requested() {
                    aborted = true;
                    break;
                }
                if self.transport.is_paused() {
                    let stalled = self.stall_while_paused();
                    if self.transport.stop_requested() {
                        aborted = true;
                        break;
                    }
                    // paused time is not part of the schedule; shift every
                    // future deadline by the stall
                    anchor += stalled;
                    reference_time += stalled;
                }

                elapsed_ticks += event.delta_ticks as u64;
                let event_time = anchor + elapsed_ticks as f64 * seconds_per_tick;
                if !self.clock.wait_until(event_time, self.transport.stop_flag()) {
                    aborted = true;
                    break;
                }
                self.dispatch(event)?;
            }
            if aborted {
                break;
            }

            loop_index += 1;
            self.status.loop_index.store(loop_index, Ordering::Relaxed);
            debug!(loop_index, "groove loop completed");
        }
        Ok(())
    }

    /// Send one event, tolerating isolated sink failures. A failed send is
    /// logged and skipped; too many in a row abort playback.
    fn dispatch(&mut self, event: &NoteEvent) -> Result<(), PlaybackError> {
        match self
            .sink
            .send_note(event.kind, event.pitch, event.velocity)
        {
            Ok(()) => {
                self.sink_failures = 0;
                Ok(())
            }
            Err(e) => {
                self.sink_failures += 1;
                warn!(
                    failures = self.sink_failures,
                    "MIDI output rejected event, skipping: {e}"
                );
                if self.sink_failures >= MAX_SINK_FAILURES {
                    Err(PlaybackError::OutputLost(self.sink_failures))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Stall until resumed or stopped, returning the stalled duration as
    /// measured on the logical clock.
    fn stall_while_paused(&self) -> f64 {
        let start = self.clock.now();
        while self.transport.is_paused() && !self.transport.stop_requested() {
            thread::sleep(PAUSE_SLICE);
        }
        self.clock.now() - start
    }

    fn effective_tempo(&self, groove: &Groove) -> u32 {
        match self.transport.tempo_override() {
            Some(bpm) => bpm_to_micros_per_beat(bpm as f64),
            None => groove.tempo_micros_per_beat(),
        }
    }

    fn activate(&self, groove: &Groove) {
        self.status.playing.store(true, Ordering::Relaxed);
        self.status.loop_index.store(0, Ordering::Relaxed);
        self.status.swap_armed.store(false, Ordering::Relaxed);
        *self.status.active.lock().unwrap() = Some(GrooveSummary::of(groove));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use groovecast_core::NoteKind;
    use std::time::Instant;

    /// Sink that records every event with an arrival timestamp.
    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<(Instant, NoteKind, u8, u8)>>>,
        fail: Arc<AtomicBool>,
    }

    impl RecordingSink {
        fn recorded(&self) -> Vec<(Instant, NoteKind, u8, u8)> {
            self.events.lock().unwrap().clone()
        }

        fn pitches(&self) -> Vec<u8> {
            self.recorded().iter().map(|(_, _, p, _)| *p).collect()
        }
    }

    impl NoteSink for RecordingSink {
        fn send_note(&mut self, kind: NoteKind, pitch: u8, velocity: u8) -> anyhow::Result<()> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(anyhow!("sink offline"));
            }
            self.events
                .lock()
                .unwrap()
                .push((Instant::now(), kind, pitch, velocity));
            Ok(())
        }
    }

    /// A groove of `(delta_ticks, kind, pitch)` at 1000 ticks per beat and
    /// 1 ms per tick (tempo = one second per beat).
    fn millis_groove(events: &[(u32, NoteKind, u8)]) -> Groove {
        let events = events
            .iter()
            .map(|&(delta_ticks, kind, pitch)| NoteEvent {
                delta_ticks,
                kind,
                pitch,
                velocity: 100,
            })
            .collect();
        Groove::new(events, 1_000_000, 1000).unwrap()
    }

    fn spawn_recording() -> (Broadcaster, RecordingSink) {
        let sink = RecordingSink::default();
        let transport = Arc::new(TransportState::new());
        let clock = Arc::new(LogicalClock::new(90.0));
        let broadcaster = Broadcaster::spawn(sink.clone(), transport, clock);
        (broadcaster, sink)
    }

    #[test]
    fn test_events_dispatch_in_source_order_across_loops() {
        let (broadcaster, sink) = spawn_recording();
        // 60ms loop: four notes 15ms apart
        let groove = millis_groove(&[
            (0, NoteKind::NoteOn, 60),
            (15, NoteKind::NoteOn, 61),
            (15, NoteKind::NoteOn, 62),
            (15, NoteKind::NoteOff, 60),
        ]);
        broadcaster.enqueue_groove(groove, 1).unwrap();

        thread::sleep(Duration::from_millis(200));
        broadcaster.shutdown();

        let pitches = sink.pitches();
        assert!(pitches.len() >= 4, "expected at least one full loop");
        for (i, pitch) in pitches.iter().enumerate() {
            let expected = [60, 61, 62, 60][i % 4];
            assert_eq!(*pitch, expected, "event {} out of order", i);
        }
    }

    #[test]
    fn test_loop_starts_track_the_anchor_without_drift() {
        let (broadcaster, sink) = spawn_recording();
        // 40ms loop, one marker note per loop
        let groove = millis_groove(&[(0, NoteKind::NoteOn, 60), (40, NoteKind::NoteOff, 60)]);
        broadcaster.enqueue_groove(groove, 1).unwrap();

        thread::sleep(Duration::from_millis(900));
        broadcaster.shutdown();

        let onsets: Vec<Instant> = sink
            .recorded()
            .iter()
            .filter(|(_, kind, _, _)| *kind == NoteKind::NoteOn)
            .map(|(at, _, _, _)| *at)
            .collect();
        assert!(onsets.len() >= 10, "expected many loops in 900ms");

        // every loop start sits near first_onset + k * 40ms; errors from
        // individual waits must not accumulate
        let origin = onsets[0];
        for (k, onset) in onsets.iter().enumerate() {
            let expected = Duration::from_millis(40 * k as u64);
            let actual = onset.duration_since(origin);
            let error = if actual > expected {
                actual - expected
            } else {
                expected - actual
            };
            assert!(
                error < Duration::from_millis(35),
                "loop {} drifted {:?} from its anchor",
                k,
                error
            );
        }
    }

    #[test]
    fn test_queued_groove_takes_over_after_loop_count() {
        let (broadcaster, sink) = spawn_recording();
        // 150ms loops so the arm/apply boundaries are unambiguous
        let first = millis_groove(&[(0, NoteKind::NoteOn, 60), (150, NoteKind::NoteOff, 60)]);
        let second = millis_groove(&[(0, NoteKind::NoteOn, 72), (150, NoteKind::NoteOff, 72)]);

        broadcaster.enqueue_groove(first, 1).unwrap();
        // request the replacement while loop 0 of the first groove plays
        thread::sleep(Duration::from_millis(40));
        broadcaster.enqueue_groove(second, 2).unwrap();

        thread::sleep(Duration::from_millis(700));
        broadcaster.shutdown();

        let onsets: Vec<u8> = sink
            .recorded()
            .iter()
            .filter(|(_, kind, _, _)| *kind == NoteKind::NoteOn)
            .map(|(_, _, pitch, _)| *pitch)
            .collect();

        let first_loops = onsets.iter().take_while(|&&p| p == 60).count();
        assert_eq!(
            first_loops, 2,
            "first groove must finish exactly two loops before the swap"
        );
        assert!(
            onsets[first_loops..].iter().all(|&p| p == 72),
            "replacement must own every loop after the swap"
        );
    }

    #[test]
    fn test_pause_defers_dispatch_without_dropping_events() {
        let (broadcaster, sink) = spawn_recording();
        broadcaster.pause();

        let groove = millis_groove(&[(0, NoteKind::NoteOn, 60), (30, NoteKind::NoteOff, 60)]);
        broadcaster.enqueue_groove(groove, 1).unwrap();

        thread::sleep(Duration::from_millis(200));
        assert!(
            sink.recorded().is_empty(),
            "no events may be dispatched while paused"
        );

        broadcaster.resume();
        thread::sleep(Duration::from_millis(150));
        broadcaster.shutdown();

        let pitches = sink.pitches();
        assert!(!pitches.is_empty(), "dispatch must resume after pause");
        assert_eq!(pitches[0], 60, "event order is unaffected by pausing");
    }

    #[test]
    fn test_stop_aborts_mid_loop_within_a_slice() {
        let (broadcaster, sink) = spawn_recording();
        // NoteOff sits two seconds out; stop must not wait for it
        let groove = millis_groove(&[(0, NoteKind::NoteOn, 60), (2000, NoteKind::NoteOff, 60)]);
        broadcaster.enqueue_groove(groove, 1).unwrap();

        thread::sleep(Duration::from_millis(80));
        let stopped_at = Instant::now();
        broadcaster.stop();
        broadcaster.shutdown();
        assert!(
            stopped_at.elapsed() < Duration::from_millis(300),
            "stop must take effect within a wait slice, not the remaining wait"
        );

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 1, "no events may follow a stop");
        assert_eq!(recorded[0].2, 60);
    }

    #[test]
    fn test_live_tempo_change_rescales_active_groove() {
        let (broadcaster, sink) = spawn_recording();
        // groove tempo is one second per beat: 100ms loops
        let groove = millis_groove(&[(0, NoteKind::NoteOn, 60), (100, NoteKind::NoteOff, 60)]);
        broadcaster.enqueue_groove(groove, 1).unwrap();

        thread::sleep(Duration::from_millis(250));
        // 240 BPM = 0.25s per beat: loops shrink to 25ms
        assert!(broadcaster.set_tempo(240.0));
        thread::sleep(Duration::from_millis(400));
        broadcaster.shutdown();

        let onsets: Vec<Instant> = sink
            .recorded()
            .iter()
            .filter(|(_, kind, _, _)| *kind == NoteKind::NoteOn)
            .map(|(at, _, _, _)| *at)
            .collect();
        assert!(onsets.len() >= 5);

        let last_gap = onsets[onsets.len() - 1].duration_since(onsets[onsets.len() - 2]);
        assert!(
            last_gap < Duration::from_millis(70),
            "loops must audibly speed up after a live tempo change, got {:?}",
            last_gap
        );
    }

    #[test]
    fn test_persistent_sink_failure_aborts_playback() {
        let (broadcaster, sink) = spawn_recording();
        let groove = millis_groove(&[(0, NoteKind::NoteOn, 60), (10, NoteKind::NoteOff, 60)]);

        sink.fail.store(true, Ordering::Relaxed);
        broadcaster.enqueue_groove(groove, 1).unwrap();

        thread::sleep(Duration::from_millis(500));
        assert!(
            !broadcaster.is_playing(),
            "a dead sink must promote to a fatal stop"
        );
        assert!(sink.recorded().is_empty());
        broadcaster.shutdown();
    }

    #[test]
    fn test_status_reports_active_groove() {
        let (broadcaster, _sink) = spawn_recording();
        assert!(!broadcaster.is_playing());

        let groove = millis_groove(&[(0, NoteKind::NoteOn, 60), (50, NoteKind::NoteOff, 60)]);
        broadcaster.enqueue_groove(groove, 1).unwrap();
        thread::sleep(Duration::from_millis(150));

        let status = broadcaster.status();
        assert!(status.playing);
        assert!(status.loop_index >= 1);
        let active = status.active.expect("active groove summary");
        assert_eq!(active.events, 2);
        assert_eq!(active.total_ticks, 50);
        broadcaster.shutdown();
    }
}
