//! Real-time groove playback: logical clock, transport state, deferred
//! groove swapping, the MIDI output sink, and the broadcast loop itself.

pub mod broadcast;
pub mod clock;
pub mod error;
pub mod sink;
pub mod swap;
pub mod transport;

pub use broadcast::{Broadcaster, GrooveSummary, StatusSnapshot};
pub use clock::LogicalClock;
pub use error::PlaybackError;
pub use sink::{MidiPortSink, NoteSink};
pub use transport::TransportState;
