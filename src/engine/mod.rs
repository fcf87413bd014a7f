// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Metronome engine.
//!
//! `MetronomeEngine` wires the clock, the beat sequencer and the click
//! policy together behind a start/stop/retune state machine. It is the only
//! type the front end talks to.
//!
//! All beat and settings state sits behind one mutex. The tick handler and
//! every setter go through that lock, so a tick never sees a half-applied
//! change. Each started clock carries an epoch number; ticks from a clock
//! whose epoch is no longer current are dropped.
//!
//! Stopping is immediate for new ticks only. A tick that passed its state
//! check before `stop()` took the lock may still play its click.
//!
//! Setters hand the changed value to the store while still holding the
//! lock, so the store always ends up with the last value set.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::audio::ClickOutput;
use crate::config::{BeatsPlayed, SettingKey, Settings, SettingsStore};
use crate::sequencer::{BeatSequencer, Click, ClickPolicy};
use crate::timing::{interval_for_bpm, ClockHandle, FirstFire, TapTempo, TempoClock, Tick, TickSource};

/// Engine run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Run state
    pub state: EngineState,
    /// Current beat, 0 when stopped
    pub beat_index: u32,
    /// Current settings
    pub settings: Settings,
}

impl EngineSnapshot {
    /// Whether the metronome is running
    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }
}

impl fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = &self.settings;
        write!(
            f,
            "{} | {} bpm | {} beats/measure | accent {} | {} | sound {}",
            if self.is_running() { "RUNNING" } else { "STOPPED" },
            settings.beats_per_minute,
            settings.beats_per_measure,
            if settings.accent_first_beat_enabled { "on" } else { "off" },
            settings.beats_played.label(),
            if settings.sound_enabled { "on" } else { "off" },
        )
    }
}

/// State guarded by the engine lock
struct Core {
    state: EngineState,
    settings: Settings,
    sequencer: BeatSequencer,
    clock: Option<ClockHandle>,
    /// Identifies the clock whose ticks are current
    epoch: u64,
    tap_tempo: TapTempo,
}

impl Core {
    fn is_current(&self, epoch: u64) -> bool {
        self.state == EngineState::Running && self.epoch == epoch
    }
}

/// State shared with the tick handler
struct Shared {
    core: Mutex<Core>,
    output: Arc<dyn ClickOutput>,
    beat_tx: watch::Sender<u32>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        // Every critical section leaves Core consistent, so a panic elsewhere
        // does not invalidate it.
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_tick(&self, epoch: u64, tick: Tick) {
        let (beat, click) = {
            let mut core = self.lock();
            if !core.is_current(epoch) {
                trace!(sequence = tick.sequence, "Dropping tick from cancelled clock");
                return;
            }
            let beat = core.sequencer.advance();
            (beat, ClickPolicy::for_settings(beat, &core.settings))
        };

        trace!(beat, ?click, sequence = tick.sequence, "Tick");

        let played = match click {
            Click::None => Ok(()),
            Click::Normal => self.output.play_normal_click(),
            Click::Accent => self.output.play_accent_click(),
        };
        if let Err(e) = played {
            debug!(beat, "Click skipped: {}", e);
        }

        // Publish only if nothing moved the beat in the meantime, so a stop
        // racing this tick leaves 0 as the last published value.
        let core = self.lock();
        if core.state == EngineState::Running && core.sequencer.index() == beat {
            self.beat_tx.send_replace(beat);
        }
    }
}

/// The metronome
pub struct MetronomeEngine {
    shared: Arc<Shared>,
    clock: Arc<dyn TickSource>,
    store: Arc<dyn SettingsStore>,
}

impl MetronomeEngine {
    /// Create an engine driven by a `TempoClock`, with settings loaded from
    /// `store`
    pub fn new(store: Arc<dyn SettingsStore>, output: Arc<dyn ClickOutput>) -> Self {
        Self::with_clock(store, output, Arc::new(TempoClock::new()))
    }

    /// Create an engine driven by the given tick source
    pub fn with_clock(
        store: Arc<dyn SettingsStore>,
        output: Arc<dyn ClickOutput>,
        clock: Arc<dyn TickSource>,
    ) -> Self {
        let settings = Settings::load(store.as_ref());
        let (beat_tx, _) = watch::channel(0);

        debug!(?settings, "Engine created");

        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    state: EngineState::Stopped,
                    settings,
                    sequencer: BeatSequencer::new(settings.beats_per_measure),
                    clock: None,
                    epoch: 0,
                    tap_tempo: TapTempo::default(),
                }),
                output,
                beat_tx,
            }),
            clock,
            store,
        }
    }

    /// Start clicking. The first beat sounds immediately. Does nothing if
    /// already running.
    pub fn start(&self) {
        let mut core = self.shared.lock();
        if core.state == EngineState::Running {
            debug!("Start ignored, already running");
            return;
        }

        core.sequencer.reset();
        core.state = EngineState::Running;
        core.epoch += 1;
        if self.launch_clock(&mut core, FirstFire::Immediately) {
            info!(bpm = core.settings.beats_per_minute, "Metronome started");
        }
    }

    /// Stop clicking and reset the beat to 0. Does nothing if already
    /// stopped.
    ///
    /// Once this returns no new tick begins; a tick already past its state
    /// check may still finish playing its click.
    pub fn stop(&self) {
        let handle = {
            let mut core = self.shared.lock();
            if core.state == EngineState::Stopped {
                debug!("Stop ignored, already stopped");
                return;
            }

            core.state = EngineState::Stopped;
            core.epoch += 1;
            core.sequencer.reset();
            self.shared.beat_tx.send_replace(0);
            core.clock.take()
        };

        if let Some(handle) = handle {
            handle.cancel();
        }
        info!("Metronome stopped");
    }

    /// Start if stopped, stop if running
    pub fn toggle(&self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Whether the metronome is running
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Run state
    pub fn state(&self) -> EngineState {
        self.shared.lock().state
    }

    /// Current beat, 0 when stopped
    pub fn beat_index(&self) -> u32 {
        self.shared.lock().sequencer.index()
    }

    /// Current settings
    pub fn settings(&self) -> Settings {
        self.shared.lock().settings
    }

    /// Consistent view of state, beat and settings
    pub fn snapshot(&self) -> EngineSnapshot {
        let core = self.shared.lock();
        EngineSnapshot {
            state: core.state,
            beat_index: core.sequencer.index(),
            settings: core.settings,
        }
    }

    /// Watch the beat index. The value is 0 while stopped.
    ///
    /// Publishing never waits on receivers, so a slow observer cannot hold
    /// up the clock.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.shared.beat_tx.subscribe()
    }

    /// Change the tempo, clamped to 30-300.
    ///
    /// While running the clock restarts at the new interval with its first
    /// tick one new interval from now. The beat position is kept.
    pub fn set_beats_per_minute(&self, beats_per_minute: u32) {
        let bpm = Settings::clamp_bpm(beats_per_minute);
        let mut core = self.shared.lock();
        if core.settings.beats_per_minute == bpm {
            return;
        }
        core.settings.beats_per_minute = bpm;
        self.persist(&core, SettingKey::BeatsPerMinute);

        if core.state == EngineState::Running {
            if let Some(previous) = core.clock.take() {
                previous.cancel();
            }
            core.epoch += 1;
            if self.launch_clock(&mut core, FirstFire::AfterInterval) {
                info!(bpm, beat = core.sequencer.index(), "Retuned");
            }
        } else {
            debug!(bpm, "Tempo changed");
        }
    }

    /// Change the measure length, clamped to 2-16.
    ///
    /// While running the new length takes effect at the next wrap.
    pub fn set_beats_per_measure(&self, beats_per_measure: u32) {
        let beats = Settings::clamp_beats_per_measure(beats_per_measure);
        let mut core = self.shared.lock();
        if core.settings.beats_per_measure == beats {
            return;
        }
        core.settings.beats_per_measure = beats;
        core.sequencer.set_beats_per_measure(beats);
        self.persist(&core, SettingKey::BeatsPerMeasure);
        debug!(beats, "Measure length changed");
    }

    /// Turn the first-beat accent on or off. Applies from the next tick.
    pub fn set_accent_first_beat_enabled(&self, enabled: bool) {
        if self.update(SettingKey::AccentFirstBeatEnabled, |settings| {
            std::mem::replace(&mut settings.accent_first_beat_enabled, enabled) != enabled
        }) {
            debug!(enabled, "Accent changed");
        }
    }

    /// Choose which beats click. Applies from the next tick.
    pub fn set_beats_played(&self, beats_played: BeatsPlayed) {
        if self.update(SettingKey::BeatsPlayed, |settings| {
            std::mem::replace(&mut settings.beats_played, beats_played) != beats_played
        }) {
            debug!(%beats_played, "Beats played changed");
        }
    }

    /// Mute or unmute. Beats keep advancing while muted.
    pub fn set_sound_enabled(&self, enabled: bool) {
        if self.update(SettingKey::SoundEnabled, |settings| {
            std::mem::replace(&mut settings.sound_enabled, enabled) != enabled
        }) {
            debug!(enabled, "Sound changed");
        }
    }

    /// Apply every field of `settings` through its setter. Unchanged values
    /// are not persisted again.
    pub fn apply_settings(&self, settings: Settings) {
        let settings = settings.validated();
        self.set_beats_per_minute(settings.beats_per_minute);
        self.set_beats_per_measure(settings.beats_per_measure);
        self.set_accent_first_beat_enabled(settings.accent_first_beat_enabled);
        self.set_beats_played(settings.beats_played);
        self.set_sound_enabled(settings.sound_enabled);
    }

    /// Register a tap now; see `tap_tempo_at`
    pub fn tap_tempo(&self) -> Option<u32> {
        self.tap_tempo_at(Instant::now())
    }

    /// Register a tap at `now`. When the gap since the previous tap implies
    /// a tempo, apply it and return the resulting (clamped) BPM.
    pub fn tap_tempo_at(&self, now: Instant) -> Option<u32> {
        let tapped = self.shared.lock().tap_tempo.tap_at(now)?;
        self.set_beats_per_minute(tapped);
        Some(self.settings().beats_per_minute)
    }

    /// Start a clock for the current epoch. If the clock cannot start the
    /// engine falls back to stopped. Returns whether a clock is running.
    fn launch_clock(&self, core: &mut Core, first_fire: FirstFire) -> bool {
        match self.start_clock(core, first_fire) {
            Ok(handle) => {
                core.clock = Some(handle);
                true
            }
            Err(e) => {
                error!("Failed to start clock, metronome stopped: {}", e);
                core.state = EngineState::Stopped;
                core.epoch += 1;
                core.sequencer.reset();
                self.shared.beat_tx.send_replace(0);
                false
            }
        }
    }

    fn start_clock(&self, core: &Core, first_fire: FirstFire) -> io::Result<ClockHandle> {
        let interval = interval_for_bpm(core.settings.beats_per_minute);
        let epoch = core.epoch;
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);

        self.clock.start(
            interval,
            first_fire,
            Box::new(move |tick| {
                if let Some(shared) = shared.upgrade() {
                    shared.on_tick(epoch, tick);
                }
            }),
        )
    }

    /// Mutate a setting that does not affect timing and persist it if it
    /// changed. Returns whether anything changed.
    fn update<F>(&self, key: SettingKey, change: F) -> bool
    where
        F: FnOnce(&mut Settings) -> bool,
    {
        let mut core = self.shared.lock();
        let changed = change(&mut core.settings);
        if changed {
            self.persist(&core, key);
        }
        changed
    }

    /// Write one setting to the store. Called with the engine lock held.
    /// Failures are logged, not returned.
    fn persist(&self, core: &Core, key: SettingKey) {
        if let Err(e) = self.store.set(key, core.settings.value(key)) {
            warn!("Failed to persist {}: {}", key, e);
        }
    }
}

impl Drop for MetronomeEngine {
    fn drop(&mut self) {
        let handle = {
            let mut core = self.shared.lock();
            core.state = EngineState::Stopped;
            core.epoch += 1;
            core.clock.take()
        };
        if let Some(handle) = handle {
            handle.cancel();
        }
    }
}

impl fmt::Debug for MetronomeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetronomeEngine")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioError;
    use crate::config::{MemorySettingsStore, SettingValue};
    use crate::timing::{ManualClock, TickFn};
    use std::thread;
    use std::time::Duration;

    /// Records every click it is asked to play
    #[derive(Default)]
    struct RecordingOutput {
        clicks: Mutex<Vec<Click>>,
    }

    impl RecordingOutput {
        fn clicks(&self) -> Vec<Click> {
            self.clicks.lock().unwrap().clone()
        }
    }

    impl ClickOutput for RecordingOutput {
        fn play_normal_click(&self) -> Result<(), AudioError> {
            self.clicks.lock().unwrap().push(Click::Normal);
            Ok(())
        }

        fn play_accent_click(&self) -> Result<(), AudioError> {
            self.clicks.lock().unwrap().push(Click::Accent);
            Ok(())
        }
    }

    /// Fails every click
    struct BrokenOutput;

    impl ClickOutput for BrokenOutput {
        fn play_normal_click(&self) -> Result<(), AudioError> {
            Err(AudioError::NoDevice)
        }

        fn play_accent_click(&self) -> Result<(), AudioError> {
            Err(AudioError::NoDevice)
        }
    }

    /// Counts writes
    #[derive(Default)]
    struct CountingStore {
        inner: MemorySettingsStore,
        writes: Mutex<usize>,
    }

    impl SettingsStore for CountingStore {
        fn get(&self, key: SettingKey) -> Option<SettingValue> {
            self.inner.get(key)
        }

        fn set(&self, key: SettingKey, value: SettingValue) -> Result<(), crate::config::SettingsError> {
            *self.writes.lock().unwrap() += 1;
            self.inner.set(key, value)
        }
    }

    /// Tick source that can never start a timer
    struct FailingClock;

    impl TickSource for FailingClock {
        fn start(&self, _: Duration, _: FirstFire, _: TickFn) -> io::Result<ClockHandle> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "no threads left"))
        }
    }

    struct Harness {
        engine: MetronomeEngine,
        clock: ManualClock,
        output: Arc<RecordingOutput>,
        store: Arc<MemorySettingsStore>,
    }

    fn harness(settings: Settings) -> Harness {
        let store = Arc::new(MemorySettingsStore::new());
        for key in SettingKey::ALL {
            store.set(key, settings.value(key)).unwrap();
        }
        let clock = ManualClock::new();
        let output = Arc::new(RecordingOutput::default());
        let engine = MetronomeEngine::with_clock(
            Arc::clone(&store) as Arc<dyn SettingsStore>,
            Arc::clone(&output) as Arc<dyn ClickOutput>,
            Arc::new(clock.clone()),
        );
        Harness {
            engine,
            clock,
            output,
            store,
        }
    }

    #[test]
    fn test_engine_starts_stopped() {
        let h = harness(Settings::default());
        assert_eq!(h.engine.state(), EngineState::Stopped);
        assert_eq!(h.engine.beat_index(), 0);
        assert!(h.clock.started().is_empty());
    }

    #[test]
    fn test_settings_loaded_from_store() {
        let h = harness(Settings {
            beats_per_minute: 90,
            beats_per_measure: 3,
            ..Settings::default()
        });
        assert_eq!(h.engine.settings().beats_per_minute, 90);
        assert_eq!(h.engine.settings().beats_per_measure, 3);
    }

    #[test]
    fn test_start_fires_first_beat_immediately() {
        let h = harness(Settings::default());
        h.engine.start();

        let started = h.clock.started();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].first_fire, FirstFire::Immediately);
        assert_eq!(started[0].interval, Duration::from_millis(500));

        assert!(h.clock.fire());
        assert_eq!(h.engine.beat_index(), 1);
    }

    #[test]
    fn test_accent_measure() {
        let h = harness(Settings {
            accent_first_beat_enabled: true,
            ..Settings::default()
        });
        h.engine.start();
        h.clock.fire_n(8);

        assert_eq!(
            h.output.clicks(),
            vec![
                Click::Accent,
                Click::Normal,
                Click::Normal,
                Click::Normal,
                Click::Accent,
                Click::Normal,
                Click::Normal,
                Click::Normal,
            ]
        );
    }

    #[test]
    fn test_stop_resets_beat() {
        let h = harness(Settings::default());
        let beats = h.engine.subscribe();
        h.engine.start();
        h.clock.fire_n(3);
        assert_eq!(*beats.borrow(), 3);

        h.engine.stop();
        assert_eq!(h.engine.state(), EngineState::Stopped);
        assert_eq!(h.engine.beat_index(), 0);
        assert_eq!(*beats.borrow(), 0);
        assert_eq!(h.clock.active_count(), 0);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let h = harness(Settings::default());
        h.engine.start();
        h.engine.start();
        assert_eq!(h.clock.started().len(), 1);

        h.engine.stop();
        h.engine.stop();
        assert_eq!(h.engine.state(), EngineState::Stopped);
        assert_eq!(h.clock.started().len(), 1);
    }

    #[test]
    fn test_restart_begins_new_measure() {
        let h = harness(Settings::default());
        h.engine.start();
        h.clock.fire_n(3);
        h.engine.stop();

        h.engine.start();
        h.clock.fire();
        assert_eq!(h.engine.beat_index(), 1);
    }

    #[test]
    fn test_retune_keeps_beat_position() {
        let h = harness(Settings {
            beats_per_minute: 90,
            ..Settings::default()
        });
        h.engine.start();
        h.clock.fire_n(2);
        assert_eq!(h.engine.beat_index(), 2);

        h.engine.set_beats_per_minute(150);

        let started = h.clock.started();
        assert_eq!(started.len(), 2);
        assert!(started[0].cancelled);
        assert_eq!(started[1].interval, Duration::from_millis(400));
        assert_eq!(started[1].first_fire, FirstFire::AfterInterval);
        assert_eq!(h.engine.beat_index(), 2);

        h.clock.fire();
        assert_eq!(h.engine.beat_index(), 3);
    }

    #[test]
    fn test_retune_while_stopped_only_updates_settings() {
        let h = harness(Settings::default());
        h.engine.set_beats_per_minute(200);

        assert!(h.clock.started().is_empty());
        assert_eq!(h.engine.settings().beats_per_minute, 200);

        h.engine.start();
        assert_eq!(h.clock.active_interval(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_same_tempo_does_not_restart_clock() {
        let h = harness(Settings::default());
        h.engine.start();
        h.engine.set_beats_per_minute(120);
        assert_eq!(h.clock.started().len(), 1);
    }

    #[test]
    fn test_tempo_is_clamped() {
        let h = harness(Settings::default());
        h.engine.set_beats_per_minute(1000);
        assert_eq!(h.engine.settings().beats_per_minute, 300);
        assert_eq!(h.store.get(SettingKey::BeatsPerMinute), Some(SettingValue::Int(300)));

        h.engine.set_beats_per_minute(0);
        assert_eq!(h.engine.settings().beats_per_minute, 30);
    }

    #[test]
    fn test_stale_tick_after_stop_is_ignored() {
        let h = harness(Settings::default());
        let beats = h.engine.subscribe();
        h.engine.start();
        h.clock.fire();
        h.engine.stop();

        assert!(h.clock.fire_stale());
        assert_eq!(h.output.clicks().len(), 1);
        assert_eq!(h.engine.beat_index(), 0);
        assert_eq!(*beats.borrow(), 0);
    }

    #[test]
    fn test_stale_tick_after_retune_is_ignored() {
        let h = harness(Settings::default());
        h.engine.start();
        h.clock.fire();
        h.engine.set_beats_per_minute(60);

        // Cancelled clock delivers one more tick
        assert!(h.clock.fire_stale());
        assert_eq!(h.engine.beat_index(), 1);

        h.clock.fire();
        assert_eq!(h.engine.beat_index(), 2);
    }

    #[test]
    fn test_mute_still_advances() {
        let h = harness(Settings {
            sound_enabled: false,
            ..Settings::default()
        });
        h.engine.start();
        h.clock.fire_n(3);

        assert!(h.output.clicks().is_empty());
        assert_eq!(h.engine.beat_index(), 3);
    }

    #[test]
    fn test_settings_apply_on_next_tick() {
        let h = harness(Settings::default());
        h.engine.start();
        h.clock.fire();

        h.engine.set_beats_played(BeatsPlayed::Odd);
        h.clock.fire(); // beat 2, filtered
        h.engine.set_accent_first_beat_enabled(true);
        h.clock.fire(); // beat 3
        h.clock.fire(); // beat 4, filtered
        h.clock.fire(); // beat 1, accented

        assert_eq!(h.output.clicks(), vec![Click::Normal, Click::Normal, Click::Accent]);
        assert_eq!(h.clock.started().len(), 1);
    }

    #[test]
    fn test_audio_failure_keeps_time() {
        let clock = ManualClock::new();
        let engine = MetronomeEngine::with_clock(
            Arc::new(MemorySettingsStore::new()),
            Arc::new(BrokenOutput),
            Arc::new(clock.clone()),
        );

        engine.start();
        assert_eq!(clock.fire_n(5), 5);
        assert!(engine.is_running());
        assert_eq!(engine.beat_index(), 1);
    }

    #[test]
    fn test_measure_change_waits_for_wrap() {
        let h = harness(Settings::default());
        h.engine.start();
        h.clock.fire_n(2);

        h.engine.set_beats_per_measure(2);
        assert_eq!(h.engine.settings().beats_per_measure, 2);

        let mut beats = Vec::new();
        for _ in 0..4 {
            h.clock.fire();
            beats.push(h.engine.beat_index());
        }
        assert_eq!(beats, vec![3, 4, 1, 2]);
    }

    #[test]
    fn test_setters_persist_changes() {
        let h = harness(Settings::default());
        h.engine.set_beats_per_measure(7);
        h.engine.set_accent_first_beat_enabled(true);
        h.engine.set_beats_played(BeatsPlayed::Even);
        h.engine.set_sound_enabled(false);

        let stored = Settings::load(h.store.as_ref());
        assert_eq!(stored.beats_per_measure, 7);
        assert!(stored.accent_first_beat_enabled);
        assert_eq!(stored.beats_played, BeatsPlayed::Even);
        assert!(!stored.sound_enabled);
    }

    #[test]
    fn test_apply_settings_writes_only_changes() {
        let store = Arc::new(CountingStore::default());
        let engine = MetronomeEngine::with_clock(
            Arc::clone(&store) as Arc<dyn SettingsStore>,
            Arc::new(RecordingOutput::default()),
            Arc::new(ManualClock::new()),
        );

        engine.apply_settings(Settings::default());
        assert_eq!(*store.writes.lock().unwrap(), 0);

        engine.apply_settings(Settings {
            beats_per_minute: 100,
            sound_enabled: false,
            ..Settings::default()
        });
        assert_eq!(*store.writes.lock().unwrap(), 2);
        assert_eq!(engine.settings().beats_per_minute, 100);
    }

    #[test]
    fn test_racing_setters_leave_store_in_sync() {
        let store = Arc::new(MemorySettingsStore::new());
        let engine = Arc::new(MetronomeEngine::with_clock(
            Arc::clone(&store) as Arc<dyn SettingsStore>,
            Arc::new(RecordingOutput::default()),
            Arc::new(ManualClock::new()),
        ));
        engine.start();

        let writers: Vec<_> = (0..4u32)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..500u32 {
                        engine.set_beats_per_minute(60 + (i * 7 + t * 13) % 200);
                        engine.set_beats_per_measure(2 + (i + t) % 15);
                        engine.set_sound_enabled((i + t) % 2 == 0);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let settings = engine.settings();
        for key in SettingKey::ALL {
            assert_eq!(store.get(key), Some(settings.value(key)), "{} out of sync", key);
        }
    }

    #[test]
    fn test_clock_failure_leaves_engine_stopped() {
        let store = Arc::new(MemorySettingsStore::new());
        let engine = MetronomeEngine::with_clock(
            Arc::clone(&store) as Arc<dyn SettingsStore>,
            Arc::new(RecordingOutput::default()),
            Arc::new(FailingClock),
        );
        let beats = engine.subscribe();

        engine.start();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(engine.beat_index(), 0);
        assert_eq!(*beats.borrow(), 0);

        // Tempo is still recorded, and stop is a no-op
        engine.set_beats_per_minute(90);
        assert_eq!(store.get(SettingKey::BeatsPerMinute), Some(SettingValue::Int(90)));
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_tap_tempo() {
        let h = harness(Settings::default());
        let start = Instant::now();

        assert_eq!(h.engine.tap_tempo_at(start), None);
        assert_eq!(h.engine.tap_tempo_at(start + Duration::from_millis(750)), Some(80));
        assert_eq!(h.engine.settings().beats_per_minute, 80);
    }

    #[test]
    fn test_toggle() {
        let h = harness(Settings::default());
        h.engine.toggle();
        assert!(h.engine.is_running());
        h.engine.toggle();
        assert!(!h.engine.is_running());
    }

    #[test]
    fn test_drop_cancels_clock() {
        let h = harness(Settings::default());
        h.engine.start();
        let clock = h.clock.clone();
        drop(h);

        assert_eq!(clock.active_count(), 0);
        assert!(!clock.fire());
    }

    #[test]
    fn test_snapshot_display() {
        let h = harness(Settings {
            beats_per_minute: 96,
            beats_per_measure: 3,
            accent_first_beat_enabled: true,
            beats_played: BeatsPlayed::Odd,
            sound_enabled: true,
        });
        assert_eq!(
            h.engine.snapshot().to_string(),
            "STOPPED | 96 bpm | 3 beats/measure | accent on | Odd beats | sound on"
        );
    }
}
