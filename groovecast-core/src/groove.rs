//! The groove data model: a short, loopable sequence of timed MIDI note
//! events plus the tempo metadata needed to place them on a wall clock.

use crate::error::GrooveError;

/// Whether a note event starts or ends a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

/// A single note event, timed relative to the event before it.
///
/// `delta_ticks` is the MIDI-native delta of the source message: the number
/// of ticks since the previous event in the same groove. Events are
/// immutable once extracted and keep their source order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub delta_ticks: u32,
    pub kind: NoteKind,
    pub pitch: u8,
    pub velocity: u8,
}

/// A validated, loopable pattern of note events.
///
/// Invariants, enforced at construction: `ticks_per_beat > 0` and
/// `tempo_micros_per_beat > 0`. A groove is owned by exactly one component
/// at a time: extractor, swap queue, then the broadcast loop.
#[derive(Clone, Debug)]
pub struct Groove {
    events: Vec<NoteEvent>,
    tempo_micros_per_beat: u32,
    ticks_per_beat: u16,
}

impl Groove {
    /// Build a groove, rejecting metadata that would break timing math.
    pub fn new(
        events: Vec<NoteEvent>,
        tempo_micros_per_beat: u32,
        ticks_per_beat: u16,
    ) -> Result<Self, GrooveError> {
        if ticks_per_beat == 0 {
            return Err(GrooveError::InvalidTicksPerBeat);
        }
        if tempo_micros_per_beat == 0 {
            return Err(GrooveError::InvalidTempo);
        }
        Ok(Self {
            events,
            tempo_micros_per_beat,
            ticks_per_beat,
        })
    }

    /// The note events in source order.
    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    /// Tempo recorded in the source container, in microseconds per beat.
    pub fn tempo_micros_per_beat(&self) -> u32 {
        self.tempo_micros_per_beat
    }

    /// Tick resolution from the container header.
    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// Total length of one pass over the groove, in ticks.
    pub fn total_ticks(&self) -> u64 {
        self.events.iter().map(|e| e.delta_ticks as u64).sum()
    }

    /// Duration of one loop in seconds at the groove's own tempo.
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds_at(self.tempo_micros_per_beat)
    }

    /// Duration of one loop in seconds at an overridden tempo.
    pub fn duration_seconds_at(&self, micros_per_beat: u32) -> f64 {
        let seconds_per_beat = micros_per_beat as f64 / 1_000_000.0;
        seconds_per_beat * (self.total_ticks() as f64 / self.ticks_per_beat as f64)
    }

    /// Seconds represented by a single tick at an overridden tempo.
    pub fn seconds_per_tick_at(&self, micros_per_beat: u32) -> f64 {
        micros_per_beat as f64 / 1_000_000.0 / self.ticks_per_beat as f64
    }

    /// The groove's tempo expressed as beats per minute.
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.tempo_micros_per_beat as f64
    }
}

/// Convert beats per minute into microseconds per beat.
///
/// The result is clamped to at least one microsecond so a huge BPM can
/// never produce a zero (invalid) tempo.
pub fn bpm_to_micros_per_beat(bpm: f64) -> u32 {
    ((60_000_000.0 / bpm).round() as u32).max(1)
}
