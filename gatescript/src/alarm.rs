//! Wall-clock alarm table.
//!
//! Each slot holds an 8-byte `"HH:MM:SS"` string and a per-day firing state.
//! A once-per-second tick compares the current time against every defined
//! alarm; an alarm fires at most once per day and re-arms only after the
//! clock rolls past midnight (current time numerically below the alarm
//! time again).
//!
//! `HH:MM:SS` strings compare correctly as plain bytes, so all time
//! comparisons here are lexicographic.

/// Per-day firing state of one alarm slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    /// Not yet reached today; fires when the clock reaches the alarm time.
    NotYet,
    /// Already fired today; re-arms after midnight rollover.
    Happened,
    /// Freshly set; resolves to `NotYet` or `Happened` on the next tick
    /// without firing, so setting a time already in the past today does not
    /// fire retroactively.
    Undefined,
}

#[derive(Debug, Clone)]
struct Slot {
    time: [u8; 8],
    state: AlarmState,
}

/// Fixed-capacity alarm table, indices 0-based internally (scripts address
/// alarms 1-based).
#[derive(Debug)]
pub struct AlarmTable {
    slots: Vec<Option<Slot>>,
}

impl AlarmTable {
    pub fn new(capacity: usize) -> AlarmTable {
        AlarmTable {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.is_some())
    }

    /// Store an alarm time.  `false` (slot unchanged) if `time` is not an
    /// 8-byte `HH:MM:SS` string.
    pub fn set(&mut self, index: usize, time: &[u8]) -> bool {
        if !is_time_string(time) {
            return false;
        }
        let mut t = [0u8; 8];
        t.copy_from_slice(time);
        self.slots[index] = Some(Slot {
            time: t,
            state: AlarmState::Undefined,
        });
        true
    }

    pub fn clear(&mut self, index: usize) {
        self.slots[index] = None;
    }

    /// Advance every defined alarm against the current `"HH:MM:SS"` time
    /// and return the indices that fire, in index order.
    pub fn tick(&mut self, now: &str) -> Vec<usize> {
        let now = now.as_bytes();
        let mut fired = Vec::new();
        // The not-yet-synced sentinel "99:99:99" passes the shape check but
        // is not a time of day; ignore it like any other malformed input.
        if !is_time_string(now) || now > &b"23:59:59"[..] {
            return fired;
        }
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(slot) = slot else { continue };
            let reached = now >= &slot.time[..];
            match slot.state {
                AlarmState::Undefined => {
                    // Resolve without firing.
                    slot.state = if reached { AlarmState::Happened } else { AlarmState::NotYet };
                }
                AlarmState::NotYet => {
                    if reached {
                        slot.state = AlarmState::Happened;
                        fired.push(index);
                    }
                }
                AlarmState::Happened => {
                    if !reached {
                        // Midnight rollover.
                        slot.state = AlarmState::NotYet;
                    }
                }
            }
        }
        fired
    }
}

fn is_time_string(t: &[u8]) -> bool {
    t.len() == 8
        && t[2] == b':'
        && t[5] == b':'
        && [0, 1, 3, 4, 6, 7].iter().all(|&i| t[i].is_ascii_digit())
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_when_reached() {
        let mut a = AlarmTable::new(2);
        assert!(a.set(0, b"12:00:00"));
        assert!(a.tick("11:59:59").is_empty()); // Undefined → NotYet
        assert_eq!(a.tick("12:00:00"), vec![0]);
        assert!(a.tick("12:00:01").is_empty()); // already happened today
        assert!(a.tick("18:00:00").is_empty());
    }

    #[test]
    fn setting_a_past_time_does_not_fire_retroactively() {
        let mut a = AlarmTable::new(1);
        a.set(0, b"06:00:00");
        // First tick is after the alarm time: resolve to Happened, no fire.
        assert!(a.tick("09:00:00").is_empty());
        assert!(a.tick("09:00:01").is_empty());
    }

    #[test]
    fn rearms_after_midnight() {
        let mut a = AlarmTable::new(1);
        a.set(0, b"12:00:00");
        a.tick("00:00:01");
        assert_eq!(a.tick("12:00:00"), vec![0]);
        assert!(a.tick("23:59:59").is_empty());
        assert!(a.tick("00:00:05").is_empty()); // rollover: Happened → NotYet
        assert_eq!(a.tick("12:00:07"), vec![0]); // fires again next day
    }

    #[test]
    fn rejects_malformed_time() {
        let mut a = AlarmTable::new(1);
        assert!(!a.set(0, b"noon"));
        assert!(!a.set(0, b"12-00-00"));
        assert!(!a.set(0, b"12:00:0"));
        assert!(!a.is_set(0));
    }

    #[test]
    fn resetting_returns_to_undefined() {
        let mut a = AlarmTable::new(1);
        a.set(0, b"10:00:00");
        a.tick("09:00:00");
        assert_eq!(a.tick("10:00:00"), vec![0]);
        // Re-set the same time: must not fire until tomorrow's rollover,
        // because the first tick resolves Undefined → Happened.
        a.set(0, b"10:00:00");
        assert!(a.tick("10:30:00").is_empty());
    }

    #[test]
    fn unsynced_sentinel_time_never_fires() {
        let mut a = AlarmTable::new(1);
        a.set(0, b"12:00:00");
        a.tick("00:00:01"); // Undefined → NotYet
        assert!(a.tick("99:99:99").is_empty());
        assert_eq!(a.tick("12:00:00"), vec![0]); // state untouched by sentinel
    }

    #[test]
    fn multiple_alarms_fire_in_index_order() {
        let mut a = AlarmTable::new(3);
        a.set(2, b"08:00:00");
        a.set(0, b"07:00:00");
        a.tick("06:00:00");
        assert_eq!(a.tick("09:00:00"), vec![0, 2]);
    }
}
