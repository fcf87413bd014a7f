// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Click output for the Steady metronome.
//!
//! This module provides:
//! - The `ClickOutput` trait the engine plays clicks through
//! - Synthesized click sounds and a voice that renders them
//! - Audio output via cpal
//! - MIDI percussion output via midir

pub mod click;
pub mod midi;
pub mod output;

pub use click::{ClickSounds, ClickVoice};
pub use midi::{list_midi_ports, MidiClickOutput};
pub use output::{default_device_name, list_devices, AudioConfig, AudioOutput, ClickPlayer};

/// Something that can make the two metronome sounds.
///
/// Both calls are made from the clock thread on every audible beat, so they
/// must return quickly. Errors are reported, never retried: the engine
/// skips the click and keeps time.
pub trait ClickOutput: Send + Sync {
    /// Play the regular click
    fn play_normal_click(&self) -> Result<(), AudioError>;

    /// Play the accent click
    fn play_accent_click(&self) -> Result<(), AudioError>;
}

/// Output that accepts every click and plays nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentOutput;

impl ClickOutput for SilentOutput {
    fn play_normal_click(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_accent_click(&self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Audio error types
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No audio device available
    #[error("No audio device available")]
    NoDevice,
    /// Failed to initialize audio
    #[error("Audio initialization failed: {0}")]
    InitFailed(String),
    /// Failed to build or start the audio stream
    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
    /// Failed to acquire lock
    #[error("Failed to acquire audio lock")]
    LockFailed,
    /// MIDI port index out of range
    #[error("MIDI port {0} not found")]
    PortNotFound(usize),
    /// MIDI connection or send failure
    #[error("MIDI error: {0}")]
    Midi(String),
}
