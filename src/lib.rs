// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Steady - a metronome engine.
//!
//! A drift-free beat clock drives a measure counter; each beat is turned
//! into an accent click, a regular click or silence and handed to an audio
//! or MIDI output. Settings persist to a TOML file between runs.

pub mod audio;
pub mod config;
pub mod control;
pub mod engine;
pub mod sequencer;
pub mod timing;

pub use audio::{AudioError, ClickOutput, SilentOutput};
pub use config::{BeatsPlayed, SettingKey, SettingValue, Settings, SettingsError, SettingsStore};
pub use engine::{EngineSnapshot, EngineState, MetronomeEngine};
pub use sequencer::{BeatSequencer, Click, ClickPolicy};
pub use timing::{ManualClock, TempoClock, TickSource};
