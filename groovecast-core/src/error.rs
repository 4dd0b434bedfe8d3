//! Errors produced while extracting or validating a groove.

use thiserror::Error;

/// Why a MIDI container could not be turned into a playable groove.
///
/// Extraction fails fast: a groove that would be rejected here never
/// reaches the playback queue.
#[derive(Debug, Error)]
pub enum GrooveError {
    /// The container carried no tempo meta-message and the caller did not
    /// supply a default. A tempo is never invented silently.
    #[error("no tempo event in the MIDI container and no default tempo supplied")]
    MissingTempo,

    /// The container header declared a non-positive tick resolution.
    #[error("ticks per beat must be positive")]
    InvalidTicksPerBeat,

    /// A tempo of zero microseconds per beat would make every duration
    /// collapse to nothing.
    #[error("tempo must be a positive number of microseconds per beat")]
    InvalidTempo,

    /// SMPTE timecode timing carries no ticks-per-beat to convert against.
    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,

    /// The bytes were not a well-formed Standard MIDI File.
    #[error("malformed MIDI container: {0}")]
    Parse(#[from] midly::Error),

    /// The file could not be read from disk.
    #[error("failed to read MIDI file: {0}")]
    Io(#[from] std::io::Error),
}
