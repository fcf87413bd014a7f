// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tap tempo.

use std::time::{Duration, Instant};

/// Tap tempo calculator
#[derive(Debug, Clone)]
pub struct TapTempo {
    /// Time of the previous tap
    last_tap: Option<Instant>,
    /// Shortest accepted gap between taps
    min_interval: Duration,
    /// Gaps at or above this start a new tap sequence
    max_interval: Duration,
}

impl TapTempo {
    /// Create a new tap tempo calculator
    pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            last_tap: None,
            min_interval,
            max_interval,
        }
    }

    /// Record a tap at `now`.
    ///
    /// The tempo comes from the gap since the previous tap, rounded to the
    /// nearest whole BPM. A gap outside `[min_interval, max_interval)` yields
    /// nothing but still counts as the new previous tap.
    pub fn tap_at(&mut self, now: Instant) -> Option<u32> {
        let bpm = self
            .last_tap
            .and_then(|last| now.checked_duration_since(last))
            .filter(|gap| *gap >= self.min_interval && *gap < self.max_interval)
            .map(|gap| (60.0 / gap.as_secs_f64()).round() as u32);

        self.last_tap = Some(now);
        bpm
    }
}

impl Default for TapTempo {
    fn default() -> Self {
        // 0.2s..2s covers 30-300 BPM
        Self::new(Duration::from_millis(200), Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tap_has_no_tempo() {
        let mut tap = TapTempo::default();
        assert_eq!(tap.tap_at(Instant::now()), None);
    }

    #[test]
    fn test_two_taps_give_tempo() {
        let mut tap = TapTempo::default();
        let start = Instant::now();

        tap.tap_at(start);
        assert_eq!(tap.tap_at(start + Duration::from_millis(500)), Some(120));
        assert_eq!(tap.tap_at(start + Duration::from_millis(1250)), Some(80));
    }

    #[test]
    fn test_tempo_is_rounded() {
        let mut tap = TapTempo::default();
        let start = Instant::now();

        tap.tap_at(start);
        // 60 / 0.701 = 85.59
        assert_eq!(tap.tap_at(start + Duration::from_millis(701)), Some(86));
    }

    #[test]
    fn test_gap_bounds() {
        let mut tap = TapTempo::default();
        let start = Instant::now();

        tap.tap_at(start);
        assert_eq!(tap.tap_at(start + Duration::from_millis(199)), None);

        // The rejected tap became the reference point
        let second = start + Duration::from_millis(199);
        assert_eq!(tap.tap_at(second + Duration::from_millis(200)), Some(300));

        let third = second + Duration::from_millis(200);
        assert_eq!(tap.tap_at(third + Duration::from_secs(2)), None);
    }
}
