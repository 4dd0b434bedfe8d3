//! MIDI note output.
//!
//! The broadcast loop writes through the [`NoteSink`] trait; the real
//! implementation owns a midir port connection. The connection is owned
//! exclusively by the broadcast thread once playback starts and is never
//! shared.

use anyhow::{anyhow, Result};
use groovecast_core::NoteKind;
use midir::{MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "groovecast";

/// Where dispatched note events go.
pub trait NoteSink {
    /// Deliver one note event. A failure is reported to the caller; the
    /// broadcast loop decides whether to skip or abort.
    fn send_note(&mut self, kind: NoteKind, pitch: u8, velocity: u8) -> Result<()>;
}

/// Build the raw 3-byte channel message for a note event (channel 0).
pub fn note_message(kind: NoteKind, pitch: u8, velocity: u8) -> [u8; 3] {
    let status: u8 = match kind {
        NoteKind::NoteOn => 0x90,
        NoteKind::NoteOff => 0x80,
    };
    [status, pitch & 0x7F, velocity & 0x7F]
}

/// A midir-backed output port.
pub struct MidiPortSink {
    connection: Option<MidiOutputConnection>,
    port_name: String,
}

impl MidiPortSink {
    /// List available MIDI output ports.
    ///
    /// Creating a temporary MIDI client can sometimes fail on macOS, so
    /// this retries up to 3 times with a small delay.
    pub fn list_ports() -> Result<Vec<String>> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            match MidiOutput::new(CLIENT_NAME) {
                Ok(midi_out) => {
                    let ports = midi_out.ports();
                    let names: Vec<String> = ports
                        .iter()
                        .filter_map(|p| midi_out.port_name(p).ok())
                        .collect();
                    return Ok(names);
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }
        Err(anyhow!(
            "MIDI initialization failed after 3 attempts: {:?}",
            last_err
        ))
    }

    /// Connect to an output port whose name contains `port_name`.
    pub fn connect(port_name: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();

        let port = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|name| name.contains(port_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("MIDI port '{}' not found", port_name))?;

        let actual_name = midi_out.port_name(port)?;
        let connection = midi_out.connect(port, "groovecast-out")?;

        Ok(Self {
            connection: Some(connection),
            port_name: actual_name,
        })
    }

    /// Open a virtual output port other applications can connect to.
    #[cfg(unix)]
    pub fn virtual_port(name: &str) -> Result<Self> {
        use midir::os::unix::VirtualOutput;

        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let connection = midi_out.create_virtual(name)?;

        Ok(Self {
            connection: Some(connection),
            port_name: name.to_string(),
        })
    }

    /// Name of the connected or virtual port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl NoteSink for MidiPortSink {
    fn send_note(&mut self, kind: NoteKind, pitch: u8, velocity: u8) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow!("MIDI port already released"))?;
        connection
            .send(&note_message(kind, pitch, velocity))
            .map_err(|e| anyhow!("MIDI send failed: {}", e))?;
        Ok(())
    }
}

impl Drop for MidiPortSink {
    fn drop(&mut self) {
        // All Notes Off (CC 123) so nothing is left ringing on the port
        if let Some(connection) = self.connection.as_mut() {
            let _ = connection.send(&[0xB0, 123, 0]);
        }
    }
}
