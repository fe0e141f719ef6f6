// SPDX-License-Identifier: MPL-2.0

//! Timer wheel adapter: a single intrusive sorted list of per-line one-shot
//! timers (spec.md §3 "Timer wheel adapter", §9 "Timer list"). Only one
//! outstanding host alarm exists at a time; it is rescheduled whenever the
//! earliest deadline changes.
//!
//! The teacher has no direct counterpart (the kernel has its own interrupt
//! timer); this module is new, expressed with `std::time::Instant` rather
//! than a crates.io timer wheel, since a single sorted `Vec` is exactly what
//! spec.md §9 asks for and pulling in a dependency for it would not match
//! anything the teacher reaches for elsewhere.

use std::time::{Duration, Instant};

/// A single pending timer, keyed by line id.
#[derive(Debug, Clone, Copy)]
struct Entry {
    line: usize,
    expiry: Instant,
}

/// Sorted (by expiry, ascending) list of outstanding timers. At most one
/// timer per line is ever pending; `set` replaces any existing one.
pub struct TimerWheel {
    entries: Vec<Entry>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Arm (or rearm) the timer for `line`, firing after `delay`.
    pub fn set(&mut self, line: usize, delay: Duration) {
        self.clear(line);
        let expiry = Instant::now() + delay;
        let pos = self
            .entries
            .binary_search_by(|e| e.expiry.cmp(&expiry))
            .unwrap_or_else(|p| p);
        self.entries.insert(pos, Entry { line, expiry });
    }

    /// Cancel the timer for `line`, if any.
    pub fn clear(&mut self, line: usize) {
        self.entries.retain(|e| e.line != line);
    }

    pub fn is_armed(&self, line: usize) -> bool {
        self.entries.iter().any(|e| e.line == line)
    }

    /// The next deadline, if any timer is outstanding. The dispatcher's
    /// alarm thread parks until this instant.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.first().map(|e| e.expiry)
    }

    /// Pop every timer whose deadline is at or before `now`, returning the
    /// affected line ids. The caller sets `events_flag` on each (spec.md
    /// §5 "Event sources").
    pub fn expire(&mut self, now: Instant) -> Vec<usize> {
        let split = self.entries.partition_point(|e| e.expiry <= now);
        self.entries.drain(..split).map(|e| e.line).collect()
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a VTIME value (tenths of a second) to a `Duration`, per spec.md
/// §6: `exp = now + VTIME * (HZ / 10)` ticks, expressed directly in
/// wall-clock time since this crate has no separate tick counter.
pub fn vtime_to_duration(vtime: u8) -> Duration {
    Duration::from_millis(vtime as u64 * 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_deadline_expires_first() {
        let mut wheel = TimerWheel::new();
        wheel.set(1, Duration::from_millis(50));
        wheel.set(2, Duration::from_millis(10));
        assert_eq!(wheel.next_deadline(), wheel.next_deadline());
        std::thread::sleep(Duration::from_millis(20));
        let fired = wheel.expire(Instant::now());
        assert_eq!(fired, vec![2]);
        assert!(wheel.is_armed(1));
    }

    #[test]
    fn set_replaces_existing_timer_for_line() {
        let mut wheel = TimerWheel::new();
        wheel.set(1, Duration::from_millis(500));
        wheel.set(1, Duration::from_millis(5));
        assert_eq!(wheel.entries.len(), 1);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(wheel.expire(Instant::now()), vec![1]);
    }

    #[test]
    fn clear_cancels_a_timer() {
        let mut wheel = TimerWheel::new();
        wheel.set(3, Duration::from_millis(5));
        wheel.clear(3);
        std::thread::sleep(Duration::from_millis(10));
        assert!(wheel.expire(Instant::now()).is_empty());
    }
}
