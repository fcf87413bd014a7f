// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output via cpal.
//!
//! `AudioOutput` owns the device stream and has to stay on the thread that
//! opened it. The `ClickPlayer` it hands back is the thread-safe side: the
//! clock thread triggers clicks through it and the stream callback renders
//! them.

use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig,
};
use tracing::{error, info};

use super::click::{ClickSounds, ClickVoice};
use super::{AudioError, ClickOutput};

/// Audio output configuration, taken from what the device supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of output channels
    pub channels: u16,
}

impl AudioConfig {
    /// Use the device's own rate and channel count
    pub fn from_supported(supported: &SupportedStreamConfig) -> Self {
        Self {
            sample_rate: supported.sample_rate().0,
            channels: supported.channels(),
        }
    }

    /// Stream settings for cpal, leaving the buffer size to the host
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: self.channels,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: BufferSize::Default,
        }
    }
}

/// Thread-safe trigger for the stream's click voice
#[derive(Debug, Clone)]
pub struct ClickPlayer {
    voice: Arc<Mutex<ClickVoice>>,
    sounds: ClickSounds,
}

impl ClickPlayer {
    /// Create a player rendering into `voice`
    pub fn new(voice: Arc<Mutex<ClickVoice>>, sounds: ClickSounds) -> Self {
        Self { voice, sounds }
    }

    fn trigger(&self, samples: &Arc<[f32]>) -> Result<(), AudioError> {
        let mut voice = self.voice.lock().map_err(|_| AudioError::LockFailed)?;
        voice.trigger(Arc::clone(samples));
        Ok(())
    }
}

impl ClickOutput for ClickPlayer {
    fn play_normal_click(&self) -> Result<(), AudioError> {
        self.trigger(&self.sounds.normal)
    }

    fn play_accent_click(&self) -> Result<(), AudioError> {
        self.trigger(&self.sounds.accent)
    }
}

/// Audio output stream
pub struct AudioOutput {
    /// cpal stream
    _stream: Stream,
}

impl AudioOutput {
    /// Open the default output device at its default config and start
    /// rendering clicks
    pub fn open() -> Result<(Self, ClickPlayer), AudioError> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::InitFailed(format!("Failed to get default config: {}", e)))?;
        let config = AudioConfig::from_supported(&supported);

        let voice = Arc::new(Mutex::new(ClickVoice::new()));
        let render_voice = Arc::clone(&voice);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, render_voice),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, render_voice),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, render_voice),
            other => Err(AudioError::InitFailed(format!("Unsupported sample format: {:?}", other))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::StreamFailed(format!("Failed to start stream: {}", e)))?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            format = ?supported.sample_format(),
            "Audio output started"
        );

        let player = ClickPlayer::new(voice, ClickSounds::new(config.sample_rate));
        Ok((Self { _stream: stream }, player))
    }
}

impl std::fmt::Debug for AudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOutput").finish_non_exhaustive()
    }
}

/// Build a stream in the device's native sample format. Clicks are mixed
/// in f32 and converted on the way out.
fn build_stream<T>(device: &Device, config: &AudioConfig, voice: Arc<Mutex<ClickVoice>>) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut mix: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            &config.stream_config(),
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                mix.clear();
                mix.resize(data.len(), 0.0);
                voice
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .render(&mut mix, channels);
                for (out, &sample) in data.iter_mut().zip(mix.iter()) {
                    *out = T::from_sample(sample);
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None, // No timeout
        )
        .map_err(|e| AudioError::StreamFailed(format!("Failed to build stream: {}", e)))
}

/// List available audio output devices
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Get default device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}
