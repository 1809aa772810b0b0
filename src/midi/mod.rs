use midir::{MidiOutput, MidiOutputConnection};
use thiserror::Error;

mod scheduler;

pub use scheduler::NoteScheduler;

const CLIENT_NAME: &str = "darkmaquina";
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("failed to create MIDI output: {0}")]
    Init(String),
    #[error("MIDI port '{name}' not available (found: {available:?})")]
    PortNotFound { name: String, available: Vec<String> },
    #[error("failed to connect to '{name}': {reason}")]
    Connect { name: String, reason: String },
    #[error("failed to send to '{name}': {reason}")]
    Send { name: String, reason: String },
}

/// Anything that can sound a note. The engine only ever needs these two.
pub trait NoteSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<(), MidiError>;
    fn note_off(&mut self, pitch: u8) -> Result<(), MidiError>;
}

/// A connected MIDI output port, channel 1.
pub struct MidiPort {
    name: String,
    conn: MidiOutputConnection,
}

impl MidiPort {
    // empty name = first port; otherwise exact match, then case-insensitive substring
    pub fn open(name: &str) -> Result<Self, MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_out.port_name(p).unwrap_or_default())
            .collect();

        let idx = pick_port(&names, name).ok_or_else(|| MidiError::PortNotFound {
            name: name.to_string(),
            available: names.clone(),
        })?;
        let port_name = names[idx].clone();

        let conn = midi_out
            .connect(&ports[idx], CLIENT_NAME)
            .map_err(|e| MidiError::Connect {
                name: port_name.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(port = %port_name, "opened MIDI output");
        Ok(Self { name: port_name, conn })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, msg: &[u8]) -> Result<(), MidiError> {
        self.conn.send(msg).map_err(|e| MidiError::Send {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

impl NoteSink for MidiPort {
    fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<(), MidiError> {
        self.send(&[NOTE_ON, pitch & 0x7f, velocity & 0x7f])
    }

    fn note_off(&mut self, pitch: u8) -> Result<(), MidiError> {
        self.send(&[NOTE_OFF, pitch & 0x7f, 0])
    }
}

pub fn available_ports() -> Result<Vec<String>, MidiError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

fn pick_port(names: &[String], wanted: &str) -> Option<usize> {
    if names.is_empty() {
        return None;
    }
    if wanted.is_empty() {
        return Some(0);
    }
    if let Some(i) = names.iter().position(|n| n == wanted) {
        return Some(i);
    }
    let wanted = wanted.to_lowercase();
    names.iter().position(|n| n.to_lowercase().contains(&wanted))
}

pub fn note_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}

#[cfg(test)]
pub mod testing {
    use super::{MidiError, NoteSink};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Sent {
        On(u8, u8),
        Off(u8),
    }

    /// Remembers everything sent to it; can be told to start failing.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub sent: Vec<Sent>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn onsets(&self) -> usize {
            self.sent.iter().filter(|s| matches!(s, Sent::On(..))).count()
        }

        pub fn releases(&self) -> usize {
            self.sent.iter().filter(|s| matches!(s, Sent::Off(..))).count()
        }

        fn check(&self) -> Result<(), MidiError> {
            if self.fail {
                return Err(MidiError::Send {
                    name: "recording".into(),
                    reason: "unplugged".into(),
                });
            }
            Ok(())
        }
    }

    impl NoteSink for RecordingSink {
        fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<(), MidiError> {
            self.check()?;
            self.sent.push(Sent::On(pitch, velocity));
            Ok(())
        }

        fn note_off(&mut self, pitch: u8) -> Result<(), MidiError> {
            self.check()?;
            self.sent.push(Sent::Off(pitch));
            Ok(())
        }
    }
}
