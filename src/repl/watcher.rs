use crossbeam_channel::Sender;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;

/// Watches groove files (via notify's internal threads) and forwards
/// filesystem events into the control surface's channel, so a changed
/// MIDI file can be re-queued as a groove swap.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a watcher that sends events to the provided channel.
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            // Send errors mean the control surface is gone; nothing to do
            let _ = tx.send(res);
        })?;

        Ok(Self { watcher })
    }

    /// Start watching a single groove file.
    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        self.watcher
            .watch(path.as_ref(), RecursiveMode::NonRecursive)
    }
}
