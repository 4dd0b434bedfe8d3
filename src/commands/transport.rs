//! Transport and general commands (pause/resume/stop, tempo, status).

use colored::*;

use crate::commands::{CommandContext, CommandResult};

/// Handle `pause`: suspend dispatch without advancing the schedule.
pub fn cmd_pause(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.transport.pause();
    CommandResult::Message("⏸  Paused".yellow().to_string())
}

/// Handle `resume`: continue dispatch where it left off.
pub fn cmd_resume(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.transport.resume();
    CommandResult::Message("▶  Resumed".green().to_string())
}

/// Handle `stop`: end playback and release the output port.
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.transport.request_stop();
    if let Some(broadcaster) = ctx.broadcaster.take() {
        broadcaster.shutdown();
        CommandResult::Message(
            "⏹  Stopped, output port released. Use 'connect' or 'virtual' to start again."
                .to_string(),
        )
    } else {
        CommandResult::Message("⏹  Nothing is playing".to_string())
    }
}

/// Handle `tempo [bpm]`: show or set the live tempo.
pub fn cmd_tempo(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("Current tempo: {:.1} BPM", ctx.clock.bpm()));
    }

    match args.parse::<f32>() {
        Ok(bpm) if bpm > 0.0 && bpm <= 400.0 => {
            if ctx.set_tempo(bpm) {
                CommandResult::Message(
                    format!("🎵 Tempo set to {:.1} BPM", bpm)
                        .bright_green()
                        .to_string(),
                )
            } else {
                CommandResult::Error("Tempo was rejected".to_string())
            }
        }
        _ => CommandResult::Error("Invalid tempo. Use a value between 1-400 BPM".to_string()),
    }
}

/// Handle `status`: report what the broadcast loop is doing.
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let broadcaster = match &ctx.broadcaster {
        Some(b) => b,
        None => {
            return CommandResult::Message(
                "Not connected. Use 'ports' to list outputs, then 'connect <name>' or 'virtual'."
                    .to_string(),
            )
        }
    };

    let status = broadcaster.status();
    let mut output = String::new();
    if status.playing {
        output.push_str(&format!(
            "{} loop {} at {:.1} BPM\n",
            "▶ playing".green(),
            status.loop_index,
            status.bpm
        ));
    } else {
        output.push_str(&format!("{} at {:.1} BPM\n", "■ idle".dimmed(), status.bpm));
    }
    match &status.active {
        Some(groove) => output.push_str(&format!(
            "  groove: {} events, {} ticks ({:.3}s at {} ticks/beat)\n",
            groove.events, groove.total_ticks, groove.duration_seconds, groove.ticks_per_beat
        )),
        None => output.push_str("  groove: none yet\n"),
    }
    if status.swap_armed {
        output.push_str(&format!("  {}\n", "swap armed, waiting on loop count".cyan()));
    } else if ctx.transport.swap_requested() {
        output.push_str(&format!("  {}\n", "swap queued".cyan()));
    }
    output.push_str(&format!("  default loops before swap: {}", ctx.default_loops));
    CommandResult::Message(output)
}

/// Handle `help`
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit`
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Print help information
fn print_help() {
    println!("{}", "🥁 groovecast".bold());
    println!("{}", "=============".bold());
    println!();
    println!("{}", "Output:".green());
    println!("  {}               - list MIDI output ports", "ports".cyan());
    println!(
        "  {}      - open the port whose name contains <name>",
        "connect <name>".cyan()
    );
    println!(
        "  {}      - open a virtual output port (Unix only)",
        "virtual [name]".cyan()
    );
    println!();
    println!("{}", "Grooves:".green());
    println!(
        "  {} - play a MIDI file; queues a swap if one is playing",
        "load <file> [loops]".cyan()
    );
    println!(
        "  {}           - default loops a groove finishes before a swap",
        "loops [n]".cyan()
    );
    println!(
        "  {}        - re-queue a groove whenever its file changes",
        "watch <file>".cyan()
    );
    println!();
    println!("{}", "Transport:".green());
    println!("  {}         - show or set the live tempo", "tempo [bpm]".cyan());
    println!(
        "  {} / {} / {}",
        "pause".cyan(),
        "resume".cyan(),
        "stop".cyan()
    );
    println!("  {}              - playback state", "status".cyan());
    println!();
    println!("  {} / {}", "help".cyan(), "quit".cyan());
}
