// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Key-value settings persistence.
//!
//! `FileSettingsStore` keeps the current values in memory and writes the
//! file from a background thread, so a `set` never waits on the disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, warn};

use super::{SettingKey, SettingValue, SettingsError};

/// Persistence collaborator for settings
pub trait SettingsStore: Send + Sync {
    /// Stored value for a key, if any
    fn get(&self, key: SettingKey) -> Option<SettingValue>;

    /// Store a value
    fn set(&self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError>;
}

/// In-process settings store
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<SettingKey, SettingValue>>,
}

impl MemorySettingsStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SettingKey, SettingValue>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.lock().get(&key).cloned()
    }

    fn set(&self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        self.lock().insert(key, value);
        Ok(())
    }
}

/// Work for the writer thread
enum WriterCommand {
    /// Replace the file contents
    Write(String),
    /// Acknowledge once every earlier write is done
    Flush(Sender<()>),
}

/// TOML-file-backed settings store
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, SettingValue>>,
    writer: Sender<WriterCommand>,
}

impl FileSettingsStore {
    /// Open a settings file. A missing file reads as empty and is created on
    /// the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let values = read_values(&path)?;

        let (writer, commands) = mpsc::channel::<WriterCommand>();
        let writer_path = path.clone();
        thread::Builder::new()
            .name("steady-settings".to_string())
            .spawn(move || {
                for command in commands {
                    match command {
                        WriterCommand::Write(contents) => {
                            if let Err(e) = fs::write(&writer_path, contents) {
                                warn!("Failed to write settings file {:?}: {}", writer_path, e);
                            }
                        }
                        WriterCommand::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })
            .map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Opened settings file {:?} ({} keys)", path, values.len());

        Ok(Self {
            path,
            values: Mutex::new(values),
            writer,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the backing file, replacing the in-memory values
    pub fn reload(&self) -> Result<(), SettingsError> {
        let values = read_values(&self.path)?;
        *self.lock() = values;
        Ok(())
    }

    /// Block until every queued write has reached the file
    pub fn flush(&self) -> Result<(), SettingsError> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.writer
            .send(WriterCommand::Flush(ack_tx))
            .map_err(|_| SettingsError::WriterClosed)?;
        ack_rx.recv().map_err(|_| SettingsError::WriterClosed)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, SettingValue>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.lock().get(key.as_str()).cloned()
    }

    fn set(&self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        let mut values = self.lock();
        values.insert(key.as_str().to_string(), value);
        let contents = toml::to_string(&*values)?;

        // Queue while still holding the lock so file writes land in the
        // same order as the updates.
        self.writer
            .send(WriterCommand::Write(contents))
            .map_err(|_| SettingsError::WriterClosed)
    }
}

/// Read the settings file. Syntax errors fail the read; a single entry of
/// an unsupported type (float, array, table, datetime) is skipped.
fn read_values(path: &Path) -> Result<BTreeMap<String, SettingValue>, SettingsError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let table: toml::Table = toml::from_str(&contents)?;
    let values = table
        .into_iter()
        .filter_map(|(key, value)| match setting_value(value) {
            Ok(value) => Some((key, value)),
            Err(kind) => {
                warn!("Ignoring settings key {:?} in {:?}: unsupported {} value", key, path, kind);
                None
            }
        })
        .collect();
    Ok(values)
}

fn setting_value(value: toml::Value) -> Result<SettingValue, &'static str> {
    match value {
        toml::Value::Boolean(b) => Ok(SettingValue::Bool(b)),
        toml::Value::Integer(i) => Ok(SettingValue::Int(i)),
        toml::Value::String(s) => Ok(SettingValue::Text(s)),
        other => Err(other.type_str()),
    }
}
