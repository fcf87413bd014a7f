// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, execute};
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;

use steady::audio::{default_device_name, list_devices, list_midi_ports, AudioOutput, MidiClickOutput};
use steady::config::{FileSettingsStore, SettingsEvent, SettingsWatcher};
use steady::control::{format_shortcut, KeyboardController};
use steady::{BeatsPlayed, ClickOutput, MetronomeEngine, Settings, SettingsStore, SilentOutput};

const DEFAULT_SETTINGS_PATH: &str = "steady.toml";

/// How often the key loop wakes to check for settings file changes
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn print_usage() {
    println!("Steady - Metronome");
    println!();
    println!("Usage: steady [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --settings <PATH>       Settings file (default {})", DEFAULT_SETTINGS_PATH);
    println!("  --bpm <N>               Tempo, 30-300");
    println!("  --measure <N>           Beats per measure, 2-16");
    println!("  --accent | --no-accent  Accent the first beat of each measure");
    println!("  --beats <all|odd|even>  Which beats click");
    println!("  --mute                  Start with sound off");
    println!("  --midi <N>              Send clicks to MIDI output port N");
    println!("  --list-devices          List available audio output devices");
    println!("  --list-midi             List available MIDI output ports");
    println!("  --verbose               Debug logging");
    println!("  --help                  Show this help message");
}

/// Options for an interactive run
#[derive(Debug, Default)]
struct Options {
    settings_path: Option<PathBuf>,
    bpm: Option<u32>,
    measure: Option<u32>,
    accent: Option<bool>,
    beats: Option<BeatsPlayed>,
    mute: bool,
    midi: Option<usize>,
    verbose: bool,
}

impl Options {
    fn settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH))
    }
}

#[derive(Debug)]
enum Command {
    Run(Options),
    ListDevices,
    ListMidi,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut options = Options::default();
    let mut iter = args.iter();

    fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> Result<&'a String> {
        iter.next().ok_or_else(|| anyhow!("{} requires a value", flag))
    }

    fn number<T: std::str::FromStr>(text: &str, flag: &str) -> Result<T> {
        text.parse()
            .map_err(|_| anyhow!("Invalid value for {}: {}", flag, text))
    }

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--settings" => options.settings_path = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--bpm" => options.bpm = Some(number(value(&mut iter, arg)?, arg)?),
            "--measure" => options.measure = Some(number(value(&mut iter, arg)?, arg)?),
            "--accent" => options.accent = Some(true),
            "--no-accent" => options.accent = Some(false),
            "--beats" => {
                let text = value(&mut iter, arg)?;
                let beats = text
                    .parse::<BeatsPlayed>()
                    .with_context(|| format!("Invalid value for --beats: {}", text))?;
                options.beats = Some(beats);
            }
            "--mute" => options.mute = true,
            "--midi" => options.midi = Some(number(value(&mut iter, arg)?, arg)?),
            "--verbose" | "-v" => options.verbose = true,
            "--list-devices" => return Ok(Command::ListDevices),
            "--list-midi" => return Ok(Command::ListMidi),
            "--help" | "-h" => return Ok(Command::Help),
            other => bail!("Unknown option: {}", other),
        }
    }

    Ok(Command::Run(options))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "steady=debug" } else { "steady=info" };
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_owned());

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::builder().parse_lossy(filter))
        .init();
}

fn print_devices() {
    let devices = list_devices();
    if devices.is_empty() {
        println!("No audio output devices found");
    }
    let default = default_device_name();
    for (i, name) in devices.iter().enumerate() {
        let marker = if default.as_ref() == Some(name) { " (default)" } else { "" };
        println!("  {}: {}{}", i, name, marker);
    }
}

fn print_midi_ports() {
    let ports = list_midi_ports();
    if ports.is_empty() {
        println!("No MIDI output ports found");
    }
    for (i, name) in ports.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
}

/// Open the requested click output, falling back to silence.
///
/// The audio stream owner is returned alongside and must be kept alive for
/// as long as clicks should sound.
fn open_output(midi_port: Option<usize>) -> (Arc<dyn ClickOutput>, Option<AudioOutput>) {
    if let Some(port) = midi_port {
        match MidiClickOutput::connect(port) {
            Ok(output) => return (Arc::new(output), None),
            Err(e) => warn!("MIDI output unavailable, falling back to audio: {}", e),
        }
    }

    match AudioOutput::open() {
        Ok((stream, player)) => (Arc::new(player), Some(stream)),
        Err(e) => {
            warn!("Audio output unavailable, running silent: {}", e);
            (Arc::new(SilentOutput), None)
        }
    }
}

fn apply_overrides(engine: &MetronomeEngine, options: &Options) {
    if let Some(bpm) = options.bpm {
        engine.set_beats_per_minute(bpm);
    }
    if let Some(measure) = options.measure {
        engine.set_beats_per_measure(measure);
    }
    if let Some(accent) = options.accent {
        engine.set_accent_first_beat_enabled(accent);
    }
    if let Some(beats) = options.beats {
        engine.set_beats_played(beats);
    }
    if options.mute {
        engine.set_sound_enabled(false);
    }
}

fn print_bindings(keyboard: &KeyboardController) {
    for (category, bindings) in keyboard.bindings_by_category() {
        let keys: Vec<String> = bindings
            .iter()
            .map(|b| format!("{} {}", format_shortcut(&b.shortcut), b.description))
            .collect();
        println!("{:<10} {}", category, keys.join(", "));
    }
    println!();
}

/// Leaves raw mode when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw terminal mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        println!();
    }
}

fn draw_status(engine: &MetronomeEngine) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    write!(stdout, "{}", engine.snapshot())?;
    stdout.flush()?;
    Ok(())
}

fn reload_settings(engine: &MetronomeEngine, store: &FileSettingsStore) {
    // Our own queued writes land first, so the reload sees them
    let reloaded = store.flush().and_then(|()| store.reload());
    match reloaded {
        Ok(()) => {
            info!(path = %store.path().display(), "Settings file changed, reloading");
            engine.apply_settings(Settings::load(store));
        }
        Err(e) => warn!("Failed to reload settings: {}", e),
    }
}

fn key_loop(engine: &MetronomeEngine, store: &FileSettingsStore, watcher: Option<SettingsWatcher>) -> Result<()> {
    let keyboard = KeyboardController::with_defaults();
    let _raw = RawModeGuard::enable()?;
    draw_status(engine)?;

    loop {
        if let Some(watcher) = &watcher {
            for settings_event in watcher.recv_all() {
                match settings_event {
                    SettingsEvent::Changed(_) => reload_settings(engine, store),
                    SettingsEvent::Error(e) => warn!("Settings watcher error: {}", e),
                }
                draw_status(engine)?;
            }
        }

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(action) = keyboard.get_action(key.code, key.modifiers) {
            if !action.apply(engine) {
                return Ok(());
            }
            draw_status(engine)?;
        }
    }
}

async fn run(options: Options) -> Result<()> {
    let settings_path = options.settings_path();
    let store = Arc::new(
        FileSettingsStore::open(&settings_path)
            .with_context(|| format!("Failed to open settings file {}", settings_path.display()))?,
    );

    let (output, _audio) = open_output(options.midi);
    let engine = Arc::new(MetronomeEngine::new(
        Arc::clone(&store) as Arc<dyn SettingsStore>,
        output,
    ));
    apply_overrides(&engine, &options);

    let watcher = match SettingsWatcher::new(&settings_path, None) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Settings file will not be watched: {}", e);
            None
        }
    };

    let mut beats = engine.subscribe();
    tokio::spawn(async move {
        while beats.changed().await.is_ok() {
            let beat = *beats.borrow_and_update();
            trace!(beat, "Beat");
        }
    });

    print_bindings(&KeyboardController::with_defaults());

    let loop_engine = Arc::clone(&engine);
    let loop_store = Arc::clone(&store);
    tokio::task::spawn_blocking(move || key_loop(&loop_engine, &loop_store, watcher))
        .await
        .context("Key loop panicked")??;

    engine.stop();
    store.flush().context("Failed to save settings")?;
    info!(path = %settings_path.display(), "Settings saved");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match command {
        Command::Help => print_usage(),
        Command::ListDevices => print_devices(),
        Command::ListMidi => print_midi_ports(),
        Command::Run(options) => {
            init_tracing(options.verbose);
            run(options).await?;
        }
    }

    Ok(())
}
