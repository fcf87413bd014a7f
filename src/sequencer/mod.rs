// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat sequencing.
//!
//! This module provides the two pure pieces of the tick path:
//! - Beat position tracking within a measure
//! - The per-beat click decision

pub mod beat;
pub mod policy;

pub use beat::BeatSequencer;
pub use policy::{Click, ClickPolicy};
