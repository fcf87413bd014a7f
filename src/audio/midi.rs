// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI click output.
//!
//! Sends each click as a General MIDI percussion hit so an external drum
//! machine or synth can voice the metronome.

use std::sync::Mutex;

use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use super::{AudioError, ClickOutput};

/// Client name shown to the MIDI system
const CLIENT_NAME: &str = "steady";

/// MIDI message constants
pub mod messages {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;

    /// General MIDI percussion channel (channel 10, zero-based)
    pub const PERCUSSION_CHANNEL: u8 = 9;

    /// GM percussion key for the accent click
    pub const HI_WOOD_BLOCK: u8 = 76;
    /// GM percussion key for the regular click
    pub const LOW_WOOD_BLOCK: u8 = 77;
}

/// Note-on and matching note-off for one percussion hit
pub fn percussion_hit(note: u8, velocity: u8) -> [[u8; 3]; 2] {
    [
        [messages::NOTE_ON | messages::PERCUSSION_CHANNEL, note, velocity],
        [messages::NOTE_OFF | messages::PERCUSSION_CHANNEL, note, 0],
    ]
}

/// Clicks sent to a MIDI output port
pub struct MidiClickOutput {
    connection: Mutex<MidiOutputConnection>,
    port_name: String,
}

impl MidiClickOutput {
    /// Connect to output port `port_index` (see `list_midi_ports`)
    pub fn connect(port_index: usize) -> Result<Self, AudioError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| AudioError::Midi(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports.get(port_index).ok_or(AudioError::PortNotFound(port_index))?;
        let port_name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("port {}", port_index));

        let connection = midi_out
            .connect(port, "steady-click")
            .map_err(|e| AudioError::Midi(format!("Failed to connect to {}: {}", port_name, e)))?;

        info!(port = %port_name, "MIDI click output connected");

        Ok(Self {
            connection: Mutex::new(connection),
            port_name,
        })
    }

    /// Name of the connected port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn hit(&self, note: u8, velocity: u8) -> Result<(), AudioError> {
        let mut connection = self.connection.lock().map_err(|_| AudioError::LockFailed)?;
        for message in percussion_hit(note, velocity) {
            connection
                .send(&message)
                .map_err(|e| AudioError::Midi(e.to_string()))?;
        }
        Ok(())
    }
}

impl ClickOutput for MidiClickOutput {
    fn play_normal_click(&self) -> Result<(), AudioError> {
        self.hit(messages::LOW_WOOD_BLOCK, 96)
    }

    fn play_accent_click(&self) -> Result<(), AudioError> {
        self.hit(messages::HI_WOOD_BLOCK, 127)
    }
}

impl std::fmt::Debug for MidiClickOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiClickOutput")
            .field("port_name", &self.port_name)
            .finish()
    }
}

/// Names of the available MIDI output ports, in index order
pub fn list_midi_ports() -> Vec<String> {
    let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) else {
        return Vec::new();
    };
    midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            midi_out
                .port_name(port)
                .unwrap_or_else(|_| format!("port {}", i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percussion_hit_bytes() {
        let [on, off] = percussion_hit(messages::HI_WOOD_BLOCK, 127);
        assert_eq!(on, [0x99, 76, 127]);
        assert_eq!(off, [0x89, 76, 0]);
    }

    #[test]
    fn test_missing_port() {
        let result = MidiClickOutput::connect(usize::MAX);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_midi_ports() {
        // Must not panic without MIDI hardware
        let _ = list_midi_ports();
    }
}
