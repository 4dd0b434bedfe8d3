//! Command registry for the control surface.
//!
//! Commands are matched by longest prefix and handed the remainder of the
//! line as arguments. The registry only knows the call contract of the
//! playback engine: pause, resume, stop, tempo, enqueue: not how lines
//! reach it.

pub mod groove;
pub mod transport;

use std::sync::Arc;

use groovecast_core::bpm_to_micros_per_beat;

use crate::playback::{Broadcaster, LogicalClock, TransportState};

/// Session default tempo when a MIDI file carries none of its own.
pub const DEFAULT_BPM: f32 = 90.0;

/// Default number of loops the active groove finishes before a queued
/// replacement takes over.
pub const DEFAULT_LOOPS: u32 = 2;

/// Result of executing a command
#[derive(Debug)]
pub enum CommandResult {
    /// Command executed successfully, continue
    Success,
    /// Command executed, show this message
    Message(String),
    /// Not a command
    NotACommand,
    /// Error occurred
    Error(String),
    /// Exit the control surface
    Exit,
    /// Watch a groove file for changes
    Watch(String),
}

/// Context passed to command handlers
pub struct CommandContext {
    pub transport: Arc<TransportState>,
    pub clock: Arc<LogicalClock>,
    /// Running broadcast thread, once an output port is open
    pub broadcaster: Option<Broadcaster>,
    pub default_loops: u32,
}

impl CommandContext {
    pub fn new(transport: Arc<TransportState>, clock: Arc<LogicalClock>) -> Self {
        Self {
            transport,
            clock,
            broadcaster: None,
            default_loops: DEFAULT_LOOPS,
        }
    }

    /// Set the live tempo on both the transport and the clock.
    pub fn set_tempo(&self, bpm: f32) -> bool {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.set_tempo(bpm)
        } else if self.transport.set_tempo(bpm) {
            self.clock.set_bpm(bpm);
            true
        } else {
            false
        }
    }

    /// Default tempo supplied to extraction for files without a tempo
    /// event, derived from the session BPM.
    pub fn default_tempo_micros(&self) -> u32 {
        bpm_to_micros_per_beat(self.clock.bpm() as f64)
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Commands indexed by their prefix, sorted by prefix length
    /// descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command with its prefix
    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = if input.len() > prefix.len() {
                    input[prefix.len()..].trim()
                } else {
                    ""
                };
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// Get all registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Output port commands
    registry.register("ports", groove::cmd_ports);
    registry.register("connect", groove::cmd_connect);
    registry.register("virtual", groove::cmd_virtual);

    // Groove commands
    registry.register("load", groove::cmd_load);
    registry.register("queue", groove::cmd_load);
    registry.register("loops", groove::cmd_loops);
    registry.register("watch", groove::cmd_watch);

    // Transport commands
    registry.register("pause", transport::cmd_pause);
    registry.register("resume", transport::cmd_resume);
    registry.register("stop", transport::cmd_stop);
    registry.register("tempo", transport::cmd_tempo);
    registry.register("status", transport::cmd_status);

    // General commands
    registry.register("help", transport::cmd_help);
    registry.register("quit", transport::cmd_quit);
    registry.register("exit", transport::cmd_quit);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CommandContext {
        CommandContext::new(
            Arc::new(TransportState::new()),
            Arc::new(LogicalClock::new(DEFAULT_BPM)),
        )
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut registry = CommandRegistry::new();
        registry.register("loops", |args, _| CommandResult::Message(args.to_string()));
        registry.register("load", |_, _| CommandResult::Success);

        let mut ctx = context();
        // "loops 3" must hit the longer prefix even though "load" overlaps
        match registry.execute("loops 3", &mut ctx) {
            CommandResult::Message(args) => assert_eq!(args, "3"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_input_is_not_a_command() {
        let registry = create_registry();
        let mut ctx = context();
        assert!(matches!(
            registry.execute("frobnicate", &mut ctx),
            CommandResult::NotACommand
        ));
    }

    #[test]
    fn test_default_tempo_micros_follows_clock() {
        let ctx = context();
        // 90 BPM -> 666_667 microseconds per beat
        assert_eq!(ctx.default_tempo_micros(), 666_667);

        ctx.clock.set_bpm(120.0);
        assert_eq!(ctx.default_tempo_micros(), 500_000);
    }

    #[test]
    fn test_set_tempo_without_broadcaster_updates_clock() {
        let ctx = context();
        assert!(ctx.set_tempo(140.0));
        assert_eq!(ctx.clock.bpm(), 140.0);
        assert_eq!(ctx.transport.tempo_override(), Some(140.0));

        assert!(!ctx.set_tempo(-3.0));
    }
}
