// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and clock module.
//!
//! This module provides the repeating beat clock, a hand-driven clock for
//! tests, and tap tempo.

pub mod clock;
pub mod manual;
pub mod tap;

pub use clock::{interval_for_bpm, ClockHandle, FirstFire, TempoClock, Tick, TickFn, TickSource};
pub use manual::{ManualClock, StartedTimer};
pub use tap::TapTempo;
