// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for hot-reload of the settings file.
//!
//! Edits made to the settings file while the metronome runs are reported
//! after a debounce period, so the front end can reload the store and push
//! the new values into the engine without stopping playback.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events emitted by the settings watcher
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEvent {
    /// The settings file was written and has settled
    Changed(PathBuf),
    /// The watcher reported an error
    Error(String),
}

/// Settings file watcher with debouncing
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<SettingsEvent>,
    watched_path: PathBuf,
}

impl SettingsWatcher {
    /// Create a new watcher for a settings file
    ///
    /// The file's directory is watched rather than the file itself, so
    /// editors that save by replacing the file are still seen.
    ///
    /// # Arguments
    /// * `path` - Settings file to watch (need not exist yet)
    /// * `debounce_ms` - Debounce duration in milliseconds (default: 250)
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce_duration = Duration::from_millis(debounce_ms.unwrap_or(250));

        let directory = match watched_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = watched_path
            .file_name()
            .ok_or_else(|| anyhow!("Settings path has no file name: {:?}", watched_path))?
            .to_os_string();

        let (event_tx, event_rx): (Sender<SettingsEvent>, Receiver<SettingsEvent>) = mpsc::channel();
        let (notify_tx, notify_rx) = mpsc::channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = notify_tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", directory, e))?;

        let reported_path = watched_path.clone();

        // Debounce thread
        std::thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;

            loop {
                match notify_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(Ok(event)) => {
                        let touches_file = event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                        let relevant = matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_)
                        );
                        if touches_file && relevant {
                            last_event_time = Some(Instant::now());
                        }
                    }
                    Ok(Err(e)) => {
                        if event_tx.send(SettingsEvent::Error(e.to_string())).is_err() {
                            break;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if let Some(last_time) = last_event_time {
                            if last_time.elapsed() >= debounce_duration {
                                last_event_time = None;
                                if event_tx
                                    .send(SettingsEvent::Changed(reported_path.clone()))
                                    .is_err()
                                {
                                    break;
                                }
                            }
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        // Watcher was dropped, exit thread
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next settings event (non-blocking)
    pub fn try_recv(&self) -> Option<SettingsEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending settings events
    pub fn recv_all(&self) -> Vec<SettingsEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait up to `timeout` for the next settings event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SettingsEvent> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Get the path being watched
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

impl std::fmt::Debug for SettingsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsWatcher")
            .field("watched_path", &self.watched_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("steady.toml");

        let watcher = SettingsWatcher::new(&file_path, Some(50)).unwrap();
        assert_eq!(watcher.watched_path(), file_path.as_path());
        assert!(watcher.try_recv().is_none());
    }

    #[test]
    fn test_watcher_detects_changes() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("steady.toml");
        fs::write(&file_path, "beats_per_minute = 120\n").unwrap();

        let watcher = SettingsWatcher::new(&file_path, Some(50)).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        fs::write(&file_path, "beats_per_minute = 140\n").unwrap();

        let event = watcher.recv_timeout(Duration::from_millis(1000));

        // File events are not delivered reliably in every CI sandbox, so
        // only check what arrives.
        if let Some(event) = event {
            assert_eq!(event, SettingsEvent::Changed(file_path.clone()));
        }
    }

    #[test]
    fn test_other_files_are_ignored() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("steady.toml");

        let watcher = SettingsWatcher::new(&file_path, Some(50)).unwrap();
        fs::write(dir.path().join("unrelated.txt"), "hello").unwrap();

        std::thread::sleep(Duration::from_millis(300));
        let changed = watcher
            .recv_all()
            .into_iter()
            .any(|event| matches!(event, SettingsEvent::Changed(_)));
        assert!(!changed);
    }
}
