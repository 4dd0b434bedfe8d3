//! # groovecast
//!
//! groovecast streams a short, looping rhythmic pattern ("groove") of MIDI
//! note events to an output port in real time. Playback keeps strict
//! tempo across loops, tempo can be changed live, and a replacement
//! groove can be queued to take over after the current one has finished
//! looping a requested number of times: all without audible timing
//! glitches at loop or swap boundaries.
//!
//! ## Modules
//!
//! - `playback`: the engine: logical clock, transport flags, swap queue,
//!   MIDI sink, and the broadcast loop thread.
//! - `commands`: the command registry backing the interactive control
//!   surface.
//! - `repl`: the interactive control surface (readline plus a file
//!   watcher that re-queues a groove when its MIDI file changes).
//!
//! Groove types and MIDI-file extraction live in the `groovecast-core`
//! crate and are re-exported here for convenience.

pub mod commands;
pub mod playback;
pub mod repl;

// Re-export commonly used types
pub use groovecast_core::{
    bpm_to_micros_per_beat, extract_groove, load_groove, Groove, GrooveError, NoteEvent, NoteKind,
};
pub use playback::{
    Broadcaster, GrooveSummary, LogicalClock, MidiPortSink, NoteSink, PlaybackError,
    StatusSnapshot, TransportState,
};
