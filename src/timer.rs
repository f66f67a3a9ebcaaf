//! Timer and clock collaborators.
//!
//! Timers are single-shot and identified by purpose. Arming a purpose that is
//! already armed replaces the earlier timer, so a purpose never has more than
//! one pending firing. Firings come back to the dispatcher as
//! [`Event::TimerFired`](crate::event::Event::TimerFired).
//!
//! [`ManualClock`] and [`ManualTimers`] are deterministic stand-ins used by
//! tests and the host simulator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// What a timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerPurpose {
    /// Station reconnect backoff.
    StationReconnect,
    /// On-demand AP idle shutdown.
    ApIdle,
    /// Network scan deadline.
    ScanTimeout,
    /// Connectivity test deadline.
    ConnectivityTestTimeout,
}

/// Single-shot timers keyed by purpose.
pub trait TimerService: Send {
    /// Arm `purpose` to fire after `after`, replacing any pending timer for it.
    fn arm(&mut self, purpose: TimerPurpose, after: Duration);

    /// Cancel the pending timer for `purpose`, if any.
    fn cancel(&mut self, purpose: TimerPurpose);
}

/// Monotonic milliseconds source.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Clock backed by tokio's [`Instant`], counting from construction.
///
/// Follows the runtime clock, so it agrees with [`TokioTimers`](crate::runtime::TokioTimers)
/// when time is paused.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Timer table driven by a [`ManualClock`].
///
/// Nothing fires on its own: the owner asks for [`take_due`](Self::take_due)
/// purposes and dispatches them. Clones share the same table.
#[derive(Debug, Clone)]
pub struct ManualTimers {
    clock: ManualClock,
    deadlines: Arc<Mutex<HashMap<TimerPurpose, u64>>>,
}

impl ManualTimers {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            deadlines: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<TimerPurpose, u64>> {
        self.deadlines.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deadline of the pending timer for `purpose`, in clock milliseconds.
    pub fn deadline(&self, purpose: TimerPurpose) -> Option<u64> {
        self.table().get(&purpose).copied()
    }

    pub fn is_armed(&self, purpose: TimerPurpose) -> bool {
        self.deadline(purpose).is_some()
    }

    /// Remove and return every purpose whose deadline has passed, earliest first.
    pub fn take_due(&self) -> Vec<TimerPurpose> {
        let now = self.clock.now_ms();
        let mut table = self.table();
        let mut due: Vec<(u64, TimerPurpose)> = table
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(&purpose, &deadline)| (deadline, purpose))
            .collect();
        due.sort();
        for (_, purpose) in &due {
            table.remove(purpose);
        }
        due.into_iter().map(|(_, purpose)| purpose).collect()
    }
}

impl TimerService for ManualTimers {
    fn arm(&mut self, purpose: TimerPurpose, after: Duration) {
        let deadline = self.clock.now_ms() + after.as_millis() as u64;
        self.table().insert(purpose, deadline);
    }

    fn cancel(&mut self, purpose: TimerPurpose) {
        self.table().remove(&purpose);
    }
}
