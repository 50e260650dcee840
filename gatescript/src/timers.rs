//! One-shot countdown timer table.
//!
//! Each timer is either disarmed or holds an absolute deadline.  The event
//! loop uses [`TimerTable::next_wakeup`] as its `sleep_until` deadline and
//! calls [`TimerTable::take_expired`] when it wakes; each expired id is then
//! dispatched as a `timer` event.

use std::time::{Duration, Instant};

/// Fixed-capacity table of one-shot timers, ids 0-based internally
/// (scripts address them 1-based).
#[derive(Debug)]
pub struct TimerTable {
    deadlines: Vec<Option<Instant>>,
}

impl TimerTable {
    pub fn new(capacity: usize) -> TimerTable {
        TimerTable {
            deadlines: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_armed(&self, id: usize) -> bool {
        self.deadlines.get(id).is_some_and(|d| d.is_some())
    }

    /// Arm timer `id` to fire `after` from `now`.  Re-arming replaces the
    /// previous deadline.
    pub fn arm(&mut self, id: usize, after: Duration, now: Instant) {
        self.deadlines[id] = Some(now + after);
    }

    pub fn disarm(&mut self, id: usize) {
        self.deadlines[id] = None;
    }

    /// The soonest deadline across all armed timers.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// Disarm and return the ids of all timers whose deadline is `<= now`,
    /// in id order.
    pub fn take_expired(&mut self, now: Instant) -> Vec<usize> {
        let mut fired = Vec::new();
        for (id, slot) in self.deadlines.iter_mut().enumerate() {
            if slot.is_some_and(|d| d <= now) {
                *slot = None;
                fired.push(id);
            }
        }
        fired
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
