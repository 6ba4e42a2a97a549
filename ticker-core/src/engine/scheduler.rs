//! Update scheduler state machine
//!
//! ```text
//!            pause (user / memory / internal error)
//!   Running ─────────────────────────────────────▶ Paused
//!      ▲                                             │
//!      └─────────────── resume (user only) ──────────┘
//! ```
//!
//! The scheduler owns no timer. It tracks the epoch-millisecond deadline
//! of the next tick; whoever drives the engine sleeps until
//! [`Scheduler::next_due`]. Pausing clears the deadline, so nothing is
//! buffered for resume, and a cadence change replaces it.

use tracing::info;

use crate::core::PauseReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Paused(PauseReason),
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    state: SchedulerState,
    interval_ms: u64,
    next_due_ms: Option<u64>,
    ticks: u64,
}

impl Scheduler {
    pub fn new(interval_ms: u64, paused: bool, now_ms: u64) -> Self {
        if paused {
            Self {
                state: SchedulerState::Paused(PauseReason::User),
                interval_ms,
                next_due_ms: None,
                ticks: 0,
            }
        } else {
            Self {
                state: SchedulerState::Running,
                interval_ms,
                next_due_ms: Some(now_ms.saturating_add(interval_ms)),
                ticks: 0,
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        match self.state {
            SchedulerState::Running => None,
            SchedulerState::Paused(reason) => Some(reason),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Deadline of the pending tick, `None` while paused
    pub fn next_due(&self) -> Option<u64> {
        self.next_due_ms
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Cancel the pending tick. Returns false if already paused.
    pub fn pause(&mut self, reason: PauseReason) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = SchedulerState::Paused(reason);
        self.next_due_ms = None;
        info!(reason = ?reason, ticks = self.ticks, "Scheduler paused");
        true
    }

    /// Schedule the first tick one interval from now. Returns false if
    /// already running.
    pub fn resume(&mut self, now_ms: u64) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = SchedulerState::Running;
        self.next_due_ms = Some(now_ms.saturating_add(self.interval_ms));
        info!(interval_ms = self.interval_ms, "Scheduler resumed");
        true
    }

    /// Change cadence; a running scheduler drops its pending tick and
    /// reschedules one new interval from now.
    pub fn set_interval(&mut self, interval_ms: u64, now_ms: u64) {
        if interval_ms == self.interval_ms {
            return;
        }
        self.interval_ms = interval_ms;
        if self.is_running() {
            self.next_due_ms = Some(now_ms.saturating_add(interval_ms));
        }
        info!(interval_ms, running = self.is_running(), "Scheduler cadence changed");
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.next_due_ms.is_some_and(|due| now_ms >= due)
    }

    /// Record a tick at `now_ms` and schedule the next one
    pub fn complete_tick(&mut self, now_ms: u64) {
        self.ticks += 1;
        if self.is_running() {
            self.next_due_ms = Some(now_ms.saturating_add(self.interval_ms));
        }
    }
}
