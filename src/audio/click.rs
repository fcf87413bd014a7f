// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Synthesized click sounds.
//!
//! Clicks are short exponentially decaying sine bursts rendered once at
//! startup. The accent is pitched higher than the regular click.

use std::f32::consts::TAU;
use std::sync::Arc;

/// Pitch of the regular click in Hz
pub const NORMAL_CLICK_HZ: f32 = 1_000.0;
/// Pitch of the accent click in Hz
pub const ACCENT_CLICK_HZ: f32 = 1_600.0;
/// Length of either click in milliseconds
pub const CLICK_DURATION_MS: f32 = 30.0;

/// Render one click as mono samples in [-gain, gain]
pub fn synthesize_click(sample_rate: u32, frequency: f32, duration_ms: f32, gain: f32) -> Vec<f32> {
    let sample_rate = sample_rate as f32;
    let len = (sample_rate * duration_ms / 1000.0) as usize;
    // Decay to about -40 dB by the end of the burst
    let decay = 4.6 / len.max(1) as f32;

    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate;
            gain * (-decay * i as f32).exp() * (TAU * frequency * t).sin()
        })
        .collect()
}

/// The two pre-rendered metronome sounds
#[derive(Debug, Clone)]
pub struct ClickSounds {
    /// Regular click
    pub normal: Arc<[f32]>,
    /// Accent click
    pub accent: Arc<[f32]>,
}

impl ClickSounds {
    /// Render both clicks for a sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            normal: synthesize_click(sample_rate, NORMAL_CLICK_HZ, CLICK_DURATION_MS, 0.6).into(),
            accent: synthesize_click(sample_rate, ACCENT_CLICK_HZ, CLICK_DURATION_MS, 0.8).into(),
        }
    }
}

/// Plays one sound at a time; a new trigger cuts off the previous one
#[derive(Debug, Clone, Default)]
pub struct ClickVoice {
    samples: Option<Arc<[f32]>>,
    position: usize,
}

impl ClickVoice {
    /// Create a silent voice
    pub fn new() -> Self {
        Self::default()
    }

    /// Start playing `samples` from the beginning
    pub fn trigger(&mut self, samples: Arc<[f32]>) {
        self.samples = Some(samples);
        self.position = 0;
    }

    /// Whether a sound is still playing
    pub fn is_active(&self) -> bool {
        self.samples.is_some()
    }

    /// Mix the playing sound into an interleaved buffer, copying each mono
    /// sample to every channel
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        let Some(samples) = &self.samples else {
            return;
        };
        let channels = channels.max(1);

        for frame in buffer.chunks_mut(channels) {
            let Some(&sample) = samples.get(self.position) else {
                break;
            };
            for out in frame.iter_mut() {
                *out += sample;
            }
            self.position += 1;
        }

        if self.position >= samples.len() {
            self.samples = None;
            self.position = 0;
        }
    }
}
