// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Repeating beat clock.
//!
//! `TempoClock` fires a callback at a fixed interval from a dedicated thread.
//! Every deadline is computed from the clock's origin (`origin + n * interval`)
//! rather than from the moment the previous callback returned, so handler
//! latency never accumulates into drift.

use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Interval between beats at the given tempo
pub fn interval_for_bpm(bpm: u32) -> Duration {
    debug_assert!(bpm >= 1, "beats per minute must be at least 1");
    Duration::from_nanos(60_000_000_000 / u64::from(bpm.max(1)))
}

/// When the first tick of a freshly started clock is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstFire {
    /// Fire as soon as the clock starts
    Immediately,
    /// Fire one interval after the clock starts
    AfterInterval,
}

/// One firing of a clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Number of whole intervals between the clock's origin and this tick
    pub sequence: u64,
    /// The instant this tick was due
    pub scheduled_at: Instant,
}

/// Callback invoked on every tick
pub type TickFn = Box<dyn FnMut(Tick) + Send + 'static>;

/// A source of periodic ticks.
///
/// Implementations must deliver ticks for one timer in order and never run
/// two callbacks of the same timer concurrently.
pub trait TickSource: Send + Sync {
    /// Start a repeating timer. It runs until the returned handle is
    /// cancelled or dropped. Fails if the timer could not be set up, in which
    /// case no tick is ever delivered.
    fn start(&self, interval: Duration, first_fire: FirstFire, on_tick: TickFn) -> io::Result<ClockHandle>;
}

/// Ownership of a running timer.
///
/// Cancelling only signals the timer; it never waits for the timer thread.
/// A tick whose deadline had already passed when `cancel` ran may still be
/// delivered, so tick consumers must tolerate one late arrival.
pub struct ClockHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ClockHandle {
    /// Wrap the action that stops a timer
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop future ticks
    pub fn cancel(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for ClockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Thread-backed tick source
#[derive(Debug, Clone, Copy, Default)]
pub struct TempoClock;

impl TempoClock {
    /// Create a new tempo clock
    pub fn new() -> Self {
        Self
    }
}

impl TickSource for TempoClock {
    fn start(&self, interval: Duration, first_fire: FirstFire, on_tick: TickFn) -> io::Result<ClockHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let origin = Instant::now();
        let first_sequence = match first_fire {
            FirstFire::Immediately => 0,
            FirstFire::AfterInterval => 1,
        };

        thread::Builder::new()
            .name("steady-clock".to_string())
            .spawn(move || run_clock(origin, interval, first_sequence, &stop_rx, on_tick))?;

        debug!(interval_ms = interval.as_secs_f64() * 1000.0, ?first_fire, "Clock started");

        // Dropping the sender disconnects the channel, which the timer
        // thread observes on its next wait.
        Ok(ClockHandle::new(move || drop(stop_tx)))
    }
}

/// Deadline of the tick with the given sequence number
fn deadline(origin: Instant, interval: Duration, sequence: u64) -> Instant {
    let nanos = interval.as_nanos().saturating_mul(u128::from(sequence));
    origin + Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Timer thread body. Returns once the handle is cancelled.
fn run_clock(
    origin: Instant,
    interval: Duration,
    mut sequence: u64,
    stop_rx: &Receiver<()>,
    mut on_tick: TickFn,
) {
    loop {
        let due = deadline(origin, interval, sequence);

        // Wait for the deadline, waking early only for cancellation
        loop {
            let now = Instant::now();
            let cancelled = if due > now {
                match stop_rx.recv_timeout(due - now) {
                    Err(RecvTimeoutError::Timeout) => false,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                }
            } else {
                !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
            };

            if cancelled {
                return;
            }
            if Instant::now() >= due {
                break;
            }
        }

        on_tick(Tick {
            sequence,
            scheduled_at: due,
        });
        sequence += 1;

        // A full interval behind (system suspend, stalled handler): skip to
        // the next boundary instead of replaying the backlog.
        let now = Instant::now();
        if now >= deadline(origin, interval, sequence + 1) && !interval.is_zero() {
            let elapsed = now.duration_since(origin).as_nanos();
            let current = u64::try_from(elapsed / interval.as_nanos()).unwrap_or(u64::MAX);
            let next = current.saturating_add(1);
            debug!(skipped = next - sequence, "Clock fell behind, skipping missed ticks");
            sequence = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Fired = Arc<Mutex<Vec<(Tick, Instant)>>>;

    fn recording_callback() -> (Fired, TickFn) {
        let fired: Fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let callback: TickFn = Box::new(move |tick| {
            sink.lock().unwrap().push((tick, Instant::now()));
        });
        (fired, callback)
    }

    #[test]
    fn test_interval_for_bpm() {
        assert_eq!(interval_for_bpm(120), Duration::from_millis(500));
        assert_eq!(interval_for_bpm(60), Duration::from_secs(1));
        assert_eq!(interval_for_bpm(30), Duration::from_secs(2));
        assert_eq!(interval_for_bpm(300), Duration::from_millis(200));
    }

    #[test]
    fn test_interval_matches_tempo_across_range() {
        for bpm in 30..=300u32 {
            let expected = 60.0 / bpm as f64;
            let actual = interval_for_bpm(bpm).as_secs_f64();
            assert!((actual - expected).abs() < 1e-9, "bpm {}", bpm);
        }
    }

    #[test]
    fn test_first_fire_immediately() {
        let (fired, callback) = recording_callback();
        let handle = TempoClock::new()
            .start(Duration::from_millis(200), FirstFire::Immediately, callback)
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        handle.cancel();

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0.sequence, 0);
    }

    #[test]
    fn test_first_fire_after_interval() {
        let (fired, callback) = recording_callback();
        let handle = TempoClock::new()
            .start(Duration::from_millis(200), FirstFire::AfterInterval, callback)
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(fired.lock().unwrap().is_empty());
        handle.cancel();
    }

    #[test]
    fn test_tick_spacing() {
        let interval = Duration::from_millis(20);
        let (fired, callback) = recording_callback();
        let handle = TempoClock::new()
            .start(interval, FirstFire::Immediately, callback)
            .unwrap();

        thread::sleep(Duration::from_millis(150));
        handle.cancel();

        let fired = fired.lock().unwrap();
        assert!(fired.len() >= 4, "only {} ticks", fired.len());

        // Scheduled instants sit exactly one interval apart
        for pair in fired.windows(2) {
            assert_eq!(pair[1].0.sequence, pair[0].0.sequence + 1);
            assert_eq!(pair[1].0.scheduled_at - pair[0].0.scheduled_at, interval);
        }

        // Never early, and late only by scheduler jitter
        let mut total_lateness = Duration::ZERO;
        for (tick, fired_at) in fired.iter() {
            assert!(*fired_at >= tick.scheduled_at);
            total_lateness += *fired_at - tick.scheduled_at;
        }
        let mean_lateness = total_lateness / fired.len() as u32;
        assert!(mean_lateness < Duration::from_millis(10), "mean lateness {:?}", mean_lateness);
    }

    #[test]
    fn test_cancel_stops_ticks() {
        let (fired, callback) = recording_callback();
        let handle = TempoClock::new()
            .start(Duration::from_millis(10), FirstFire::Immediately, callback)
            .unwrap();

        thread::sleep(Duration::from_millis(35));
        handle.cancel();
        let at_cancel = fired.lock().unwrap().len();

        thread::sleep(Duration::from_millis(60));
        let after = fired.lock().unwrap().len();

        // At most the tick already in flight may land after cancel
        assert!(after <= at_cancel + 1);
    }

    #[test]
    fn test_drop_cancels() {
        let (fired, callback) = recording_callback();
        {
            let _handle = TempoClock::new()
            .start(Duration::from_millis(10), FirstFire::AfterInterval, callback)
            .unwrap();
        }

        thread::sleep(Duration::from_millis(50));
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missed_ticks_not_replayed() {
        let fired: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let callback: TickFn = Box::new(move |tick| {
            sink.lock().unwrap().push(tick.sequence);
            if tick.sequence == 0 {
                // Stall for several intervals
                thread::sleep(Duration::from_millis(45));
            }
        });

        let handle = TempoClock::new()
            .start(Duration::from_millis(10), FirstFire::Immediately, callback)
            .unwrap();
        thread::sleep(Duration::from_millis(80));
        handle.cancel();

        let fired = fired.lock().unwrap();
        assert_eq!(fired[0], 0);
        assert!(fired.len() >= 2);
        assert!(fired[1] >= 4, "backlog replayed: {:?}", *fired);
    }

    #[test]
    fn test_clock_handle_runs_cancel_once() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let handle = ClockHandle::new(move || *counter.lock().unwrap() += 1);

        handle.cancel();
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
