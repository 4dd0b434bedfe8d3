//! Output-port and groove commands (ports/connect/virtual, load, watch).

use colored::*;
use groovecast_core::load_groove;

use crate::commands::{CommandContext, CommandResult};
use crate::playback::{Broadcaster, MidiPortSink};

/// Handle `ports`: list available MIDI output ports.
pub fn cmd_ports(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    match MidiPortSink::list_ports() {
        Ok(ports) => {
            if ports.is_empty() {
                CommandResult::Message(
                    "No MIDI output ports found. Connect a device or open a virtual port."
                        .yellow()
                        .to_string(),
                )
            } else {
                let mut output = format!("{}\n", "🎹 Available MIDI output ports:".bold());
                for (i, port) in ports.iter().enumerate() {
                    output.push_str(&format!("  {}. {}\n", i + 1, port.cyan()));
                }
                output.push_str(&format!(
                    "{} {}",
                    "Use".dimmed(),
                    "connect <port name>".green()
                ));
                CommandResult::Message(output)
            }
        }
        Err(e) => CommandResult::Error(format!("Failed to list MIDI ports: {}", e)),
    }
}

/// Handle `connect <port>`: open an output port and start the broadcast
/// thread on it.
pub fn cmd_connect(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error(
            "Usage: connect <port name>\nUse 'ports' to see available outputs".to_string(),
        );
    }
    if ctx.broadcaster.is_some() {
        return CommandResult::Error("Already connected. 'stop' first to switch ports".to_string());
    }

    match MidiPortSink::connect(args) {
        Ok(sink) => {
            let name = sink.port_name().to_string();
            start_broadcast(ctx, sink);
            CommandResult::Message(format!(
                "🎹 Connected to {}. 'load <file>' to start a groove",
                name.green()
            ))
        }
        Err(e) => CommandResult::Error(format!("Failed to connect to '{}': {}", args, e)),
    }
}

/// Handle `virtual [name]`: open a virtual output port other
/// applications can record from.
pub fn cmd_virtual(args: &str, ctx: &mut CommandContext) -> CommandResult {
    #[cfg(unix)]
    {
        if ctx.broadcaster.is_some() {
            return CommandResult::Error(
                "Already connected. 'stop' first to switch ports".to_string(),
            );
        }
        let name = if args.is_empty() {
            "groovecast output"
        } else {
            args
        };
        match MidiPortSink::virtual_port(name) {
            Ok(sink) => {
                start_broadcast(ctx, sink);
                CommandResult::Message(format!(
                    "🎹 Opened virtual port {}. 'load <file>' to start a groove",
                    name.green()
                ))
            }
            Err(e) => CommandResult::Error(format!("Failed to open virtual port: {}", e)),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (args, ctx);
        CommandResult::Error("Virtual MIDI ports are not supported on this platform".to_string())
    }
}

fn start_broadcast(ctx: &mut CommandContext, sink: MidiPortSink) {
    // a previous session may have left the stop flag set
    ctx.transport.clear_stop();
    ctx.broadcaster = Some(Broadcaster::spawn(
        sink,
        ctx.transport.clone(),
        ctx.clock.clone(),
    ));
}

/// Handle `load <file> [loops]`: extract a groove and enqueue it. The
/// first groove starts playback; later ones replace the active groove
/// after it finishes `loops` more loops.
pub fn cmd_load(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: load <file.mid> [loops]".to_string());
    }
    let (path, loops) = split_path_and_loops(args, ctx.default_loops);

    let broadcaster = match &ctx.broadcaster {
        Some(b) => b,
        None => {
            return CommandResult::Error(
                "Not connected. Use 'connect <name>' or 'virtual' first".to_string(),
            )
        }
    };

    match load_groove(path, Some(ctx.default_tempo_micros())) {
        Ok(groove) => {
            let events = groove.events().len();
            let duration = groove.duration_seconds();
            let was_playing = broadcaster.is_playing();
            match broadcaster.enqueue_groove(groove, loops) {
                Ok(()) => {
                    if was_playing {
                        CommandResult::Message(format!(
                            "🥁 Queued {} ({} events, {:.3}s) after {} more loop(s)",
                            path.green(),
                            events,
                            duration,
                            loops
                        ))
                    } else {
                        CommandResult::Message(format!(
                            "🥁 Playing {} ({} events, {:.3}s per loop)",
                            path.green(),
                            events,
                            duration
                        ))
                    }
                }
                Err(e) => CommandResult::Error(format!("Could not queue groove: {}", e)),
            }
        }
        Err(e) => CommandResult::Error(format!("Could not load '{}': {}", path, e)),
    }
}

/// Handle `loops [n]`: show or set the default loops-before-swap count.
pub fn cmd_loops(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!(
            "Queued grooves take over after {} loop(s) of the current one",
            ctx.default_loops
        ));
    }
    match args.parse::<u32>() {
        Ok(n) => {
            ctx.default_loops = n;
            CommandResult::Message(format!("Default loops before swap set to {}", n))
        }
        Err(_) => CommandResult::Error("Usage: loops <non-negative integer>".to_string()),
    }
}

/// Handle `watch <file>`: the control surface re-queues the groove
/// whenever the file changes on disk.
pub fn cmd_watch(args: &str, _ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: watch <file.mid>".to_string());
    }
    if std::fs::metadata(args).is_err() {
        return CommandResult::Error(format!("Cannot watch '{}': file not found", args));
    }
    CommandResult::Watch(args.to_string())
}

/// Split "<path> [loops]": a trailing integer is a loop count, the rest
/// is the path (which may contain spaces).
fn split_path_and_loops(args: &str, default_loops: u32) -> (&str, u32) {
    if let Some((path, last)) = args.rsplit_once(char::is_whitespace) {
        if let Ok(loops) = last.parse::<u32>() {
            return (path.trim_end(), loops);
        }
    }
    (args, default_loops)
}
