// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Hand-driven tick source.
//!
//! `ManualClock` records every timer it is asked to start and only ticks
//! when told to. It makes the engine's timing decisions observable without
//! sleeping.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::clock::{ClockHandle, FirstFire, Tick, TickFn, TickSource};

/// What was requested of one timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedTimer {
    /// Requested interval
    pub interval: Duration,
    /// Requested first-fire policy
    pub first_fire: FirstFire,
    /// Whether the timer has since been cancelled
    pub cancelled: bool,
}

struct ManualTimer {
    interval: Duration,
    first_fire: FirstFire,
    started_at: Instant,
    next_sequence: u64,
    cancelled: Arc<AtomicBool>,
    on_tick: Arc<Mutex<TickFn>>,
}

impl ManualTimer {
    fn next_tick(&mut self) -> Tick {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let offset = self.interval.as_nanos().saturating_mul(u128::from(sequence));
        Tick {
            sequence,
            scheduled_at: self.started_at
                + Duration::from_nanos(u64::try_from(offset).unwrap_or(u64::MAX)),
        }
    }
}

/// Tick source that fires only on request
#[derive(Clone, Default)]
pub struct ManualClock {
    timers: Arc<Mutex<Vec<ManualTimer>>>,
}

impl ManualClock {
    /// Create a clock with no timers
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one tick to the most recently started live timer.
    ///
    /// Returns false when no timer is running.
    pub fn fire(&self) -> bool {
        self.fire_matching(false)
    }

    /// Deliver `count` ticks, returning how many reached a live timer
    pub fn fire_n(&self, count: usize) -> usize {
        (0..count).take_while(|_| self.fire()).count()
    }

    /// Deliver one tick to the most recently cancelled timer.
    ///
    /// Models a tick that was already in flight when its timer was
    /// cancelled.
    pub fn fire_stale(&self) -> bool {
        self.fire_matching(true)
    }

    /// Every timer started so far, oldest first
    pub fn started(&self) -> Vec<StartedTimer> {
        self.lock()
            .iter()
            .map(|timer| StartedTimer {
                interval: timer.interval,
                first_fire: timer.first_fire,
                cancelled: timer.cancelled.load(Ordering::SeqCst),
            })
            .collect()
    }

    /// Number of timers not yet cancelled
    pub fn active_count(&self) -> usize {
        self.started().iter().filter(|timer| !timer.cancelled).count()
    }

    /// Interval of the most recently started live timer
    pub fn active_interval(&self) -> Option<Duration> {
        self.started()
            .iter()
            .rev()
            .find(|timer| !timer.cancelled)
            .map(|timer| timer.interval)
    }

    fn fire_matching(&self, cancelled: bool) -> bool {
        // Take the callback out of the registry lock so it can call back
        // into whatever owns this clock.
        let target = {
            let mut timers = self.lock();
            timers
                .iter_mut()
                .rev()
                .find(|timer| timer.cancelled.load(Ordering::SeqCst) == cancelled)
                .map(|timer| (timer.next_tick(), Arc::clone(&timer.on_tick)))
        };

        match target {
            Some((tick, on_tick)) => {
                let mut on_tick = on_tick.lock().unwrap_or_else(PoisonError::into_inner);
                (*on_tick)(tick);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ManualTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TickSource for ManualClock {
    fn start(&self, interval: Duration, first_fire: FirstFire, on_tick: TickFn) -> io::Result<ClockHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.lock().push(ManualTimer {
            interval,
            first_fire,
            started_at: Instant::now(),
            next_sequence: match first_fire {
                FirstFire::Immediately => 0,
                FirstFire::AfterInterval => 1,
            },
            cancelled: Arc::clone(&cancelled),
            on_tick: Arc::new(Mutex::new(on_tick)),
        });

        Ok(ClockHandle::new(move || cancelled.store(true, Ordering::SeqCst)))
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("timers", &self.started())
            .finish()
    }
}
