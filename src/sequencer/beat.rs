// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat position within a measure.

/// Tracks the 1-based beat index within a measure.
///
/// Index 0 means "not in a measure": the state after `reset()`, before the
/// first beat. A measure length change made mid-measure waits for the next
/// wrap so the measure in progress is never cut short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatSequencer {
    /// Current beat, 0 when stopped
    index: u32,
    /// Length of the measure being played
    beats_per_measure: u32,
    /// Length to switch to at the next wrap
    pending_beats_per_measure: Option<u32>,
}

impl BeatSequencer {
    /// Create a sequencer for measures of the given length
    pub fn new(beats_per_measure: u32) -> Self {
        debug_assert!(beats_per_measure >= 1, "a measure needs at least one beat");
        Self {
            index: 0,
            beats_per_measure: beats_per_measure.max(1),
            pending_beats_per_measure: None,
        }
    }

    /// Current beat index (0 when not in a measure)
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Length of the measure currently being played
    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }

    /// Length the sequencer will use from the next measure on
    pub fn target_beats_per_measure(&self) -> u32 {
        self.pending_beats_per_measure.unwrap_or(self.beats_per_measure)
    }

    /// Return to the not-in-a-measure state
    pub fn reset(&mut self) {
        self.index = 0;
        self.apply_pending();
    }

    /// Move to the next beat and return it.
    ///
    /// Produces `1, 2, ..., N, 1, 2, ...` for a measure of length N.
    pub fn advance(&mut self) -> u32 {
        self.index = if self.index == 0 || self.index >= self.beats_per_measure {
            self.apply_pending();
            1
        } else {
            self.index + 1
        };
        self.index
    }

    /// Change the measure length.
    ///
    /// Applies at once when not in a measure, otherwise at the next wrap.
    pub fn set_beats_per_measure(&mut self, beats_per_measure: u32) {
        debug_assert!(beats_per_measure >= 1, "a measure needs at least one beat");
        let beats_per_measure = beats_per_measure.max(1);

        if self.index == 0 {
            self.beats_per_measure = beats_per_measure;
            self.pending_beats_per_measure = None;
        } else if beats_per_measure == self.beats_per_measure {
            self.pending_beats_per_measure = None;
        } else {
            self.pending_beats_per_measure = Some(beats_per_measure);
        }
    }

    fn apply_pending(&mut self) {
        if let Some(beats_per_measure) = self.pending_beats_per_measure.take() {
            self.beats_per_measure = beats_per_measure;
        }
    }
}
