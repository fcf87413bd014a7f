// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-beat sound decision.

use crate::config::{BeatsPlayed, Settings};

/// What to play on a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Click {
    /// Silence
    None,
    /// The regular click
    Normal,
    /// The accent click
    Accent,
}

/// Maps a beat and the playback rules to a click
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickPolicy;

impl ClickPolicy {
    /// Decide what beat `beat_index` (1-based) plays.
    ///
    /// Mute wins over everything. An accented first beat always sounds,
    /// even when the beats-played filter would drop it.
    pub fn decide(
        beat_index: u32,
        accent_first_beat_enabled: bool,
        beats_played: BeatsPlayed,
        sound_enabled: bool,
    ) -> Click {
        debug_assert!(beat_index >= 1, "beat index is 1-based");

        if !sound_enabled {
            Click::None
        } else if accent_first_beat_enabled && beat_index == 1 {
            Click::Accent
        } else if beats_played.includes(beat_index) {
            Click::Normal
        } else {
            Click::None
        }
    }

    /// `decide` with the rules taken from `settings`
    pub fn for_settings(beat_index: u32, settings: &Settings) -> Click {
        Self::decide(
            beat_index,
            settings.accent_first_beat_enabled,
            settings.beats_played,
            settings.sound_enabled,
        )
    }
}
