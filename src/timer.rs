//! One-shot and repeating timer scheduling with cancellation.
//!
//! The scheduler is tick-driven: the host's dispatch loop calls
//! [`TimerScheduler::tick`], which fires every due timer at most once and
//! advances repeating timers by their interval *from the previous scheduled
//! fire time*, so host-load delays do not accumulate additively.

use crate::bus::EventHandler;
use crate::clock::{Clock, ClockTime, SystemClock};
use crate::observability::record_timer_fired;
use std::sync::{Arc, Mutex};

/// Opaque identifier of a scheduled timer.
///
/// Handles are unique, non-zero, and monotonically assigned for the
/// scheduler's lifetime; [`TimerHandle::INVALID`] (0) is the sentinel for
/// "timer could not be created".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimerHandle(pub u64);

impl TimerHandle {
    /// The creation-failure sentinel.
    pub const INVALID: Self = Self(0);

    /// Whether this is a real handle.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Upper bound on concurrently active timers; `set_timer` returns the
    /// invalid handle once reached.
    pub max_active: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { max_active: 4096 }
    }
}

struct TimerEntry {
    handle: TimerHandle,
    interval: ClockTime,
    repeat: bool,
    callback: EventHandler,
    next_fire: ClockTime,
    active: bool,
}

struct SchedulerState {
    timers: Vec<TimerEntry>,
    next_handle: u64,
}

/// The host's timer scheduler.
///
/// Interior-locked; the lock is never held across callback invocations, so
/// callbacks may schedule and cancel timers freely.
pub struct TimerScheduler {
    clock: Arc<dyn Clock>,
    config: TimerConfig,
    state: Mutex<SchedulerState>,
}

impl TimerScheduler {
    /// Create a scheduler on the monotonic system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a scheduler on an explicit clock (tests use [`ManualClock`]).
    ///
    /// [`ManualClock`]: crate::clock::ManualClock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_clock_and_config(clock, TimerConfig::default())
    }

    /// Create a scheduler with explicit tuning.
    pub fn with_clock_and_config(clock: Arc<dyn Clock>, config: TimerConfig) -> Self {
        Self {
            clock,
            config,
            state: Mutex::new(SchedulerState {
                timers: Vec::new(),
                next_handle: 1,
            }),
        }
    }

    /// Schedule `callback` to fire after `interval_ms` milliseconds.
    ///
    /// Returns [`TimerHandle::INVALID`] for a zero interval or when the
    /// active-timer bound is exhausted. Non-repeating timers remove
    /// themselves after their single firing.
    pub fn set_timer(&self, interval_ms: u32, callback: EventHandler, repeat: bool) -> TimerHandle {
        if interval_ms == 0 {
            return TimerHandle::INVALID;
        }

        let mut state = self.state.lock().unwrap();
        if state.timers.iter().filter(|t| t.active).count() >= self.config.max_active {
            return TimerHandle::INVALID;
        }

        let handle = TimerHandle(state.next_handle);
        state.next_handle += 1;

        let interval = ClockTime::from_millis(u64::from(interval_ms));
        state.timers.push(TimerEntry {
            handle,
            interval,
            repeat,
            callback,
            next_fire: self.clock.now() + interval,
            active: true,
        });
        handle
    }

    /// Cancel a timer.
    ///
    /// Returns false for handles that are unknown, already canceled, or
    /// belong to a one-shot timer that already fired. Canceling from inside
    /// the timer's own callback prevents any further firing, including one
    /// already due in the current tick.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let mut state = self.state.lock().unwrap();
        match state.timers.iter_mut().find(|t| t.handle == handle) {
            Some(entry) if entry.active => {
                entry.active = false;
                true
            }
            _ => false,
        }
    }

    /// Number of active timers.
    pub fn active_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.timers.iter().filter(|t| t.active).count()
    }

    /// Fire every timer due at the clock's current time.
    ///
    /// Each due timer fires at most once per tick; a repeating timer that
    /// fell behind catches up across subsequent ticks. Returns the number of
    /// callbacks invoked.
    pub fn tick(&self) -> usize {
        let now = self.clock.now();

        // Snapshot the due set once; cancellations made by callbacks during
        // this tick are honored by the per-timer re-check below.
        let due: Vec<TimerHandle> = {
            let state = self.state.lock().unwrap();
            state
                .timers
                .iter()
                .filter(|t| t.active && t.next_fire <= now)
                .map(|t| t.handle)
                .collect()
        };

        let mut fired = 0;
        for handle in due {
            let callback = {
                let mut state = self.state.lock().unwrap();
                let Some(entry) = state.timers.iter_mut().find(|t| t.handle == handle) else {
                    continue;
                };
                if !entry.active {
                    continue;
                }
                if entry.repeat {
                    // Advance from the scheduled time, not from `now`.
                    entry.next_fire += entry.interval;
                } else {
                    // One-shots are spent before their callback runs, so a
                    // cancel from inside it reports false.
                    entry.active = false;
                }
                entry.callback.clone()
            };

            callback("timer", "");
            record_timer_fired();
            fired += 1;
        }

        // Sweep spent and canceled entries.
        let mut state = self.state.lock().unwrap();
        state.timers.retain(|t| t.active);
        fired
    }

    /// Cancel every timer.
    pub fn clear(&self) {
        self.state.lock().unwrap().timers.clear();
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("clock", &self.clock.name())
            .field("active", &self.active_count())
            .finish()
    }
}
