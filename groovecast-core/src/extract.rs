//! Extraction of a playable groove from a Standard MIDI File container.
//!
//! The container is flattened into a single time-ordered event list: every
//! NoteOn/NoteOff message is kept with its MIDI-native fields and delta
//! time, all other messages are ignored, and the last-seen tempo
//! meta-message becomes the groove's tempo.

use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::GrooveError;
use crate::groove::{Groove, NoteEvent, NoteKind};

/// Flatten a parsed MIDI container into a [`Groove`].
///
/// Tracks are walked in file order and their note messages concatenated;
/// no events are dropped, reordered, or rewritten (a NoteOn with velocity
/// zero stays a NoteOn). If the container has no tempo meta-message,
/// `default_tempo` (microseconds per beat) is used instead; with neither,
/// extraction fails with [`GrooveError::MissingTempo`].
pub fn extract_groove(smf: &Smf, default_tempo: Option<u32>) -> Result<Groove, GrooveError> {
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(_, _) => return Err(GrooveError::UnsupportedTiming),
    };

    let mut events = Vec::new();
    let mut tempo: Option<u32> = None;

    for track in &smf.tracks {
        for event in track {
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } => events.push(NoteEvent {
                    delta_ticks: event.delta.as_int(),
                    kind: NoteKind::NoteOn,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                }),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, vel },
                    ..
                } => events.push(NoteEvent {
                    delta_ticks: event.delta.as_int(),
                    kind: NoteKind::NoteOff,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                }),
                // Last tempo event wins when a file carries several
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => tempo = Some(t.as_int()),
                _ => {}
            }
        }
    }

    let tempo = tempo.or(default_tempo).ok_or(GrooveError::MissingTempo)?;
    Groove::new(events, tempo, ticks_per_beat)
}

/// Read a Standard MIDI File from disk and extract it.
pub fn load_groove(
    path: impl AsRef<Path>,
    default_tempo: Option<u32>,
) -> Result<Groove, GrooveError> {
    let data = std::fs::read(path.as_ref())?;
    let smf = Smf::parse(&data)?;
    extract_groove(&smf, default_tempo)
}
