//! Interactive control surface for groovecast.
//!
//! A readline loop on its own thread feeds lines into the main event
//! loop, which multiplexes them with file-watcher events so a watched
//! groove file can be re-queued the moment it changes on disk.

pub mod watcher;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use colored::*;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use groovecast_core::load_groove;
use notify::{Event, EventKind};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult, DEFAULT_BPM};
use crate::playback::{LogicalClock, TransportState};
use crate::repl::watcher::FileWatcher;

/// Types of events the control loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// Interactive control surface driving the broadcast engine.
pub struct Repl {
    registry: CommandRegistry,
    ctx: CommandContext,

    // Event channels
    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,

    // File watcher
    watcher: Option<FileWatcher>,
    watched: HashSet<PathBuf>,
}

impl Repl {
    /// Create the control surface with a fresh transport and clock.
    pub fn new() -> Self {
        let transport = Arc::new(TransportState::new());
        let clock = Arc::new(LogicalClock::new(DEFAULT_BPM));

        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Repl {
            registry: create_registry(),
            ctx: CommandContext::new(transport, clock),
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
            watched: HashSet::new(),
        }
    }

    /// Run until the user quits. Stops playback on the way out.
    pub fn run(&mut self) -> Result<()> {
        print_banner();
        self.spawn_input_thread()?;

        loop {
            select! {
                recv(self.rx_input) -> event => match event {
                    Ok(ReplEvent::Input(line)) => {
                        if !self.handle_input(line) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(self.rx_watcher) -> event => match event {
                    Ok(Ok(event)) => self.handle_watch_event(event),
                    Ok(Err(e)) => warn!("file watcher error: {e}"),
                    Err(_) => {}
                },
            }
        }

        if let Some(broadcaster) = self.ctx.broadcaster.take() {
            broadcaster.stop();
            broadcaster.shutdown();
        }
        println!("{}", "Goodbye! 🥁".dimmed());
        Ok(())
    }

    /// Readline runs on its own thread so watcher events are handled
    /// while the prompt is idle.
    fn spawn_input_thread(&self) -> Result<()> {
        let tx = self.tx_input.clone();
        thread::spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(e) => {
                    let _ = tx.send(ReplEvent::Input(Err(e)));
                    return;
                }
            };
            loop {
                let line = editor.readline("groovecast> ");
                let done = line.is_err();
                if let Ok(text) = &line {
                    let _ = editor.add_history_entry(text);
                }
                if tx.send(ReplEvent::Input(line)).is_err() || done {
                    break;
                }
            }
        });
        Ok(())
    }

    /// Dispatch one input line. Returns false when the loop should exit.
    fn handle_input(&mut self, line: Result<String, ReadlineError>) -> bool {
        let line = match line {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return false,
            Err(e) => {
                eprintln!("{}", format!("Input error: {}", e).red());
                return false;
            }
        };
        let input = line.trim();
        if input.is_empty() {
            return true;
        }

        match self.registry.execute(input, &mut self.ctx) {
            CommandResult::Success => {}
            CommandResult::Message(message) => println!("{}", message),
            CommandResult::Error(message) => eprintln!("{}", message.red()),
            CommandResult::NotACommand => {
                eprintln!(
                    "{}",
                    format!(
                        "Unknown command '{}'. Commands: {}.",
                        input,
                        self.registry.list_commands().join(", ")
                    )
                    .red()
                );
            }
            CommandResult::Exit => return false,
            CommandResult::Watch(path) => self.add_watch(path),
        }
        true
    }

    fn add_watch(&mut self, path: String) {
        if self.watcher.is_none() {
            match FileWatcher::new(self.tx_watcher.clone()) {
                Ok(watcher) => self.watcher = Some(watcher),
                Err(e) => {
                    eprintln!("{}", format!("Could not start file watcher: {}", e).red());
                    return;
                }
            }
        }
        if let Some(watcher) = &mut self.watcher {
            match watcher.watch(&path) {
                Ok(()) => {
                    // notify reports absolute paths; match against the same form
                    let canonical =
                        std::fs::canonicalize(&path).unwrap_or_else(|_| PathBuf::from(&path));
                    self.watched.insert(canonical);
                    println!(
                        "👀 Watching {}: saved changes will be queued as a new groove",
                        path.green()
                    );
                }
                Err(e) => eprintln!("{}", format!("Could not watch '{}': {}", path, e).red()),
            }
        }
    }

    /// A watched groove file changed: extract it again and queue the swap.
    fn handle_watch_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }

        let changed: Vec<PathBuf> = event
            .paths
            .iter()
            .filter(|p| self.watched.contains(*p))
            .cloned()
            .collect();

        for path in changed {
            let broadcaster = match &self.ctx.broadcaster {
                Some(b) => b,
                None => return,
            };
            match load_groove(&path, Some(self.ctx.default_tempo_micros())) {
                Ok(groove) => {
                    match broadcaster.enqueue_groove(groove, self.ctx.default_loops) {
                        Ok(()) => println!(
                            "\n🔁 {} changed, queued after {} more loop(s)",
                            path.display().to_string().green(),
                            self.ctx.default_loops
                        ),
                        Err(e) => eprintln!("\n{}", format!("Could not queue groove: {}", e).red()),
                    }
                }
                Err(e) => eprintln!(
                    "\n{}",
                    format!("Could not reload '{}': {}", path.display(), e).red()
                ),
            }
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

fn print_banner() {
    println!("{}", "🥁 groovecast: looping MIDI groove broadcaster".bold());
    println!(
        "{}",
        "Type 'ports' to list outputs, 'virtual' for a virtual port, 'help' for everything else."
            .dimmed()
    );
}
