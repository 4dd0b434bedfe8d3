//! # groovecast-core
//!
//! Core library for groovecast: the groove data model and Standard MIDI
//! File extraction, with no audio or MIDI-device dependencies. The playback
//! engine and control surface live in the `groovecast` crate; this crate
//! only knows how to turn a MIDI container into a validated, loopable
//! sequence of note events plus tempo metadata.
//!
//! ## Modules
//!
//! - `groove`: the `Groove` pattern type (ordered note events, tempo and
//!   tick resolution metadata) and its timing math.
//! - `extract`: conversion from a `midly::Smf` container into a `Groove`.
//! - `error`: the extraction/validation error taxonomy.

pub mod error;
pub mod extract;
pub mod groove;

// Re-export commonly used types
pub use error::GrooveError;
pub use extract::{extract_groove, load_groove};
pub use groove::{bpm_to_micros_per_beat, Groove, NoteEvent, NoteKind};
