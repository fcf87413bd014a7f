// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Keyboard shortcut handling.
//!
//! Maps terminal key events to metronome actions.

use std::collections::{BTreeMap, HashMap};

use crossterm::event::{KeyCode, KeyModifiers};

use super::ControlAction;

/// A keyboard shortcut definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    /// Key code
    pub code: KeyCode,
    /// Required modifiers
    pub modifiers: KeyModifiers,
}

impl Shortcut {
    /// Create a new shortcut
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Create a shortcut with no modifiers
    pub fn key(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    /// Create a shortcut with Ctrl modifier
    pub fn ctrl(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::CONTROL)
    }
}

/// A keyboard binding (shortcut to action)
#[derive(Debug, Clone)]
pub struct KeyBinding {
    /// The shortcut
    pub shortcut: Shortcut,
    /// The action to perform
    pub action: ControlAction,
    /// Description for help display
    pub description: String,
    /// Category for grouping in help
    pub category: String,
}

impl KeyBinding {
    /// Create a new key binding
    pub fn new(shortcut: Shortcut, action: ControlAction, description: impl Into<String>) -> Self {
        Self {
            shortcut,
            action,
            description: description.into(),
            category: "General".to_string(),
        }
    }

    /// Set the category
    pub fn category(mut self, cat: impl Into<String>) -> Self {
        self.category = cat.into();
        self
    }
}

/// Keyboard controller with configurable bindings
#[derive(Debug)]
pub struct KeyboardController {
    bindings: HashMap<Shortcut, KeyBinding>,
}

impl KeyboardController {
    /// Create an empty keyboard controller
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Create a keyboard controller with default bindings
    pub fn with_defaults() -> Self {
        let mut controller = Self::new();
        controller.add_default_bindings();
        controller
    }

    fn add_default_bindings(&mut self) {
        // Transport
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Char(' ')), ControlAction::TogglePlay, "Start/Stop")
                .category("Transport"),
        );

        // Tempo
        let tempo = [
            ('+', 1, "Tempo +1 BPM"),
            ('=', 1, "Tempo +1 BPM"),
            ('-', -1, "Tempo -1 BPM"),
            (']', 10, "Tempo +10 BPM"),
            ('[', -10, "Tempo -10 BPM"),
        ];
        for (c, delta, description) in tempo {
            self.add(
                KeyBinding::new(Shortcut::key(KeyCode::Char(c)), ControlAction::AdjustTempo(delta), description)
                    .category("Tempo"),
            );
        }
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Up), ControlAction::AdjustTempo(1), "Tempo +1 BPM")
                .category("Tempo"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Down), ControlAction::AdjustTempo(-1), "Tempo -1 BPM")
                .category("Tempo"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Char('t')), ControlAction::TapTempo, "Tap Tempo")
                .category("Tempo"),
        );

        // Measure
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Char('>')), ControlAction::AdjustMeasure(1), "One more beat")
                .category("Measure"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Char('<')), ControlAction::AdjustMeasure(-1), "One less beat")
                .category("Measure"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Char('a')), ControlAction::ToggleAccent, "Toggle Accent")
                .category("Measure"),
        );
        self.add(
            KeyBinding::new(
                Shortcut::key(KeyCode::Char('b')),
                ControlAction::CycleBeatsPlayed,
                "Cycle Beats Played",
            )
            .category("Measure"),
        );
        self.add(
            KeyBinding::new(Shortcut::key(KeyCode::Char('m')), ControlAction::ToggleSound, "Mute/Unmute")
                .category("Measure"),
        );

        // UI
        self.add(KeyBinding::new(Shortcut::key(KeyCode::Char('q')), ControlAction::Quit, "Quit").category("UI"));
        self.add(KeyBinding::new(Shortcut::key(KeyCode::Esc), ControlAction::Quit, "Quit").category("UI"));
        self.add(KeyBinding::new(Shortcut::ctrl(KeyCode::Char('c')), ControlAction::Quit, "Quit").category("UI"));
    }

    /// Add a key binding
    pub fn add(&mut self, binding: KeyBinding) {
        self.bindings.insert(binding.shortcut.clone(), binding);
    }

    /// Get action for a key event.
    ///
    /// Terminals report some punctuation (`+`, `>`, `<`) with Shift held, so
    /// a character key that misses falls back to its unshifted binding.
    pub fn get_action(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<ControlAction> {
        let lookup = |modifiers| self.bindings.get(&Shortcut::new(code, modifiers)).map(|b| b.action);

        lookup(modifiers).or_else(|| match code {
            KeyCode::Char(_) if modifiers == KeyModifiers::SHIFT => lookup(KeyModifiers::NONE),
            _ => None,
        })
    }

    /// Get all bindings for help display
    pub fn bindings(&self) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.values()
    }

    /// Get bindings grouped by category, sorted for display
    pub fn bindings_by_category(&self) -> BTreeMap<String, Vec<&KeyBinding>> {
        let mut grouped: BTreeMap<String, Vec<&KeyBinding>> = BTreeMap::new();

        for binding in self.bindings() {
            grouped
                .entry(binding.category.clone())
                .or_default()
                .push(binding);
        }
        for bindings in grouped.values_mut() {
            bindings.sort_by_key(|b| format_shortcut(&b.shortcut));
        }

        grouped
    }
}

impl Default for KeyboardController {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Format a shortcut for display
pub fn format_shortcut(shortcut: &Shortcut) -> String {
    let mut parts = Vec::new();

    if shortcut.modifiers.contains(KeyModifiers::CONTROL) {
        parts.push("Ctrl");
    }
    if shortcut.modifiers.contains(KeyModifiers::ALT) {
        parts.push("Alt");
    }
    if shortcut.modifiers.contains(KeyModifiers::SHIFT) {
        parts.push("Shift");
    }

    let key = match shortcut.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_uppercase().to_string(),
        KeyCode::Up => "↑".to_string(),
        KeyCode::Down => "↓".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        _ => "?".to_string(),
    };

    parts.push(&key);
    parts.join("+")
}
