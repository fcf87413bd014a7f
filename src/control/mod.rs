// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Control system for keyboard input.
//!
//! This module provides:
//! - The actions a user can trigger on the metronome
//! - Keyboard shortcut handling

pub mod keyboard;

pub use keyboard::{format_shortcut, KeyBinding, KeyboardController, Shortcut};

use tracing::debug;

use crate::engine::MetronomeEngine;

/// Action that can be triggered by controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    // Transport
    /// Start if stopped, stop if running
    TogglePlay,

    // Tempo
    /// Adjust tempo by delta BPM
    AdjustTempo(i32),
    /// Tap tempo
    TapTempo,

    // Measure
    /// Adjust measure length by delta beats
    AdjustMeasure(i32),
    /// Toggle the first-beat accent
    ToggleAccent,
    /// Cycle all, odd, even beats
    CycleBeatsPlayed,
    /// Toggle sound on or off
    ToggleSound,

    // UI
    /// Quit application
    Quit,
}

impl ControlAction {
    /// Carry out the action on `engine`.
    ///
    /// Returns false for `Quit`, true otherwise.
    pub fn apply(self, engine: &MetronomeEngine) -> bool {
        debug!(action = ?self, "Control action");

        let settings = engine.settings();
        match self {
            ControlAction::TogglePlay => engine.toggle(),
            ControlAction::AdjustTempo(delta) => {
                engine.set_beats_per_minute(offset(settings.beats_per_minute, delta))
            }
            ControlAction::TapTempo => {
                engine.tap_tempo();
            }
            ControlAction::AdjustMeasure(delta) => {
                engine.set_beats_per_measure(offset(settings.beats_per_measure, delta))
            }
            ControlAction::ToggleAccent => {
                engine.set_accent_first_beat_enabled(!settings.accent_first_beat_enabled)
            }
            ControlAction::CycleBeatsPlayed => engine.set_beats_played(settings.beats_played.next()),
            ControlAction::ToggleSound => engine.set_sound_enabled(!settings.sound_enabled),
            ControlAction::Quit => return false,
        }
        true
    }
}

/// `value + delta`, saturating at zero; the engine clamps the rest
fn offset(value: u32, delta: i32) -> u32 {
    value.saturating_add_signed(delta)
}
