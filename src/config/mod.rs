// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for Steady.
//!
//! This module provides the metronome settings, their validation, and the
//! key-value stores that persist them between runs.

pub mod store;
pub mod watcher;

pub use store::{FileSettingsStore, MemorySettingsStore, SettingsStore};
pub use watcher::{SettingsEvent, SettingsWatcher};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Slowest accepted tempo
pub const MIN_BPM: u32 = 30;
/// Fastest accepted tempo
pub const MAX_BPM: u32 = 300;
/// Shortest accepted measure
pub const MIN_BEATS_PER_MEASURE: u32 = 2;
/// Longest accepted measure
pub const MAX_BEATS_PER_MEASURE: u32 = 16;

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error("Setting {key} expects {expected}, got {found:?}")]
    WrongType {
        key: SettingKey,
        expected: &'static str,
        found: SettingValue,
    },
    #[error("Invalid beats played value: {0}")]
    InvalidBeatsPlayed(String),
    #[error("Failed to read settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Settings writer has stopped")]
    WriterClosed,
}

/// Which beats of a measure produce a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatsPlayed {
    /// Every beat
    #[default]
    All,
    /// Beats 1, 3, 5, ...
    Odd,
    /// Beats 2, 4, 6, ...
    Even,
}

impl BeatsPlayed {
    /// Every variant, in picker order
    pub const ALL: [BeatsPlayed; 3] = [BeatsPlayed::All, BeatsPlayed::Odd, BeatsPlayed::Even];

    /// Whether this filter lets the given 1-based beat through
    pub fn includes(self, beat_index: u32) -> bool {
        match self {
            BeatsPlayed::All => true,
            BeatsPlayed::Odd => beat_index % 2 == 1,
            BeatsPlayed::Even => beat_index % 2 == 0,
        }
    }

    /// Stored form
    pub fn as_str(self) -> &'static str {
        match self {
            BeatsPlayed::All => "all",
            BeatsPlayed::Odd => "odd",
            BeatsPlayed::Even => "even",
        }
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            BeatsPlayed::All => "All beats",
            BeatsPlayed::Odd => "Odd beats",
            BeatsPlayed::Even => "Even beats",
        }
    }

    /// The following variant, wrapping around
    pub fn next(self) -> Self {
        match self {
            BeatsPlayed::All => BeatsPlayed::Odd,
            BeatsPlayed::Odd => BeatsPlayed::Even,
            BeatsPlayed::Even => BeatsPlayed::All,
        }
    }
}

impl FromStr for BeatsPlayed {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(BeatsPlayed::All),
            "odd" => Ok(BeatsPlayed::Odd),
            "even" => Ok(BeatsPlayed::Even),
            _ => Err(SettingsError::InvalidBeatsPlayed(s.to_string())),
        }
    }
}

impl fmt::Display for BeatsPlayed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys under which settings are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    BeatsPerMinute,
    BeatsPerMeasure,
    AccentFirstBeatEnabled,
    BeatsPlayed,
    SoundEnabled,
}

impl SettingKey {
    /// Every key
    pub const ALL: [SettingKey; 5] = [
        SettingKey::BeatsPerMinute,
        SettingKey::BeatsPerMeasure,
        SettingKey::AccentFirstBeatEnabled,
        SettingKey::BeatsPlayed,
        SettingKey::SoundEnabled,
    ];

    /// Stored key name
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::BeatsPerMinute => "beats_per_minute",
            SettingKey::BeatsPerMeasure => "beats_per_measure",
            SettingKey::AccentFirstBeatEnabled => "accent_first_beat_enabled",
            SettingKey::BeatsPlayed => "beats_played",
            SettingKey::SoundEnabled => "sound_enabled",
        }
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// String value
    Text(String),
}

impl SettingValue {
    fn as_int(&self, key: SettingKey) -> Result<i64, SettingsError> {
        match self {
            SettingValue::Int(v) => Ok(*v),
            other => Err(SettingsError::WrongType {
                key,
                expected: "an integer",
                found: other.clone(),
            }),
        }
    }

    fn as_bool(&self, key: SettingKey) -> Result<bool, SettingsError> {
        match self {
            SettingValue::Bool(v) => Ok(*v),
            other => Err(SettingsError::WrongType {
                key,
                expected: "a boolean",
                found: other.clone(),
            }),
        }
    }
}

/// Metronome settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Tempo, 30-300
    #[serde(default = "default_beats_per_minute")]
    pub beats_per_minute: u32,
    /// Measure length, 2-16
    #[serde(default = "default_beats_per_measure")]
    pub beats_per_measure: u32,
    /// Play the accent sound on beat 1
    #[serde(default)]
    pub accent_first_beat_enabled: bool,
    /// Which beats click at all
    #[serde(default)]
    pub beats_played: BeatsPlayed,
    /// Global mute switch
    #[serde(default = "default_sound_enabled")]
    pub sound_enabled: bool,
}

fn default_beats_per_minute() -> u32 {
    120
}
fn default_beats_per_measure() -> u32 {
    4
}
fn default_sound_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            beats_per_minute: default_beats_per_minute(),
            beats_per_measure: default_beats_per_measure(),
            accent_first_beat_enabled: false,
            beats_played: BeatsPlayed::All,
            sound_enabled: default_sound_enabled(),
        }
    }
}

impl Settings {
    /// Clamp a tempo into the accepted range
    pub fn clamp_bpm(bpm: u32) -> u32 {
        bpm.clamp(MIN_BPM, MAX_BPM)
    }

    /// Clamp a measure length into the accepted range
    pub fn clamp_beats_per_measure(beats: u32) -> u32 {
        beats.clamp(MIN_BEATS_PER_MEASURE, MAX_BEATS_PER_MEASURE)
    }

    /// Copy with every numeric field clamped into its domain
    pub fn validated(self) -> Self {
        Self {
            beats_per_minute: Self::clamp_bpm(self.beats_per_minute),
            beats_per_measure: Self::clamp_beats_per_measure(self.beats_per_measure),
            ..self
        }
    }

    /// Build settings from a store, using defaults for missing or
    /// malformed keys
    pub fn load(store: &dyn SettingsStore) -> Self {
        let mut settings = Self::default();
        for key in SettingKey::ALL {
            if let Some(value) = store.get(key) {
                if let Err(e) = settings.set_value(key, &value) {
                    warn!("Ignoring stored {}: {}", key, e);
                }
            }
        }
        settings
    }

    /// Stored form of one field
    pub fn value(&self, key: SettingKey) -> SettingValue {
        match key {
            SettingKey::BeatsPerMinute => SettingValue::Int(i64::from(self.beats_per_minute)),
            SettingKey::BeatsPerMeasure => SettingValue::Int(i64::from(self.beats_per_measure)),
            SettingKey::AccentFirstBeatEnabled => SettingValue::Bool(self.accent_first_beat_enabled),
            SettingKey::BeatsPlayed => SettingValue::Text(self.beats_played.as_str().to_string()),
            SettingKey::SoundEnabled => SettingValue::Bool(self.sound_enabled),
        }
    }

    /// Set one field from its stored form, clamping numbers into range
    pub fn set_value(&mut self, key: SettingKey, value: &SettingValue) -> Result<(), SettingsError> {
        match key {
            SettingKey::BeatsPerMinute => {
                self.beats_per_minute = Self::clamp_bpm(clamp_to_u32(value.as_int(key)?));
            }
            SettingKey::BeatsPerMeasure => {
                self.beats_per_measure = Self::clamp_beats_per_measure(clamp_to_u32(value.as_int(key)?));
            }
            SettingKey::AccentFirstBeatEnabled => {
                self.accent_first_beat_enabled = value.as_bool(key)?;
            }
            SettingKey::BeatsPlayed => match value {
                SettingValue::Text(text) => self.beats_played = text.parse()?,
                other => {
                    return Err(SettingsError::WrongType {
                        key,
                        expected: "a string",
                        found: other.clone(),
                    })
                }
            },
            SettingKey::SoundEnabled => {
                self.sound_enabled = value.as_bool(key)?;
            }
        }
        Ok(())
    }
}

fn clamp_to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
