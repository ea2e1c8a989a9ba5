//! Retransmission timer service.
//!
//! A timer wheel keyed by expiry instant rather than one OS timer per
//! outstanding segment — cheaper than a thread per timer (relevant for SR,
//! which can have hundreds of segments in flight) and trivially
//! cancellable: re-arming or canceling a key just removes its old entry
//! from the ordering index, no tombstone bookkeeping required since
//! `pop_expired` is driven synchronously by the caller rather than firing
//! on its own thread.
//!
//! GBN uses a single key (conventionally `0`, or `base`); SR arms one key
//! per outstanding `seq`.

use quanta::Instant;
use std::collections::{BTreeMap, HashMap};

pub struct TimerWheel {
    /// Ordered by deadline; the `u32` breaks ties between equal deadlines.
    by_deadline: BTreeMap<(Instant, u32), ()>,
    deadlines: HashMap<u32, Instant>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self {
            by_deadline: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Arm (or re-arm) the timer for `key`, replacing any existing deadline.
    pub fn arm(&mut self, key: u32, deadline: Instant) {
        self.cancel(key);
        self.by_deadline.insert((deadline, key), ());
        self.deadlines.insert(key, deadline);
    }

    /// Cancel the timer for `key`, if armed. Idempotent.
    pub fn cancel(&mut self, key: u32) {
        if let Some(deadline) = self.deadlines.remove(&key) {
            self.by_deadline.remove(&(deadline, key));
        }
    }

    pub fn cancel_all(&mut self) {
        self.by_deadline.clear();
        self.deadlines.clear();
    }

    pub fn is_armed(&self, key: u32) -> bool {
        self.deadlines.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Earliest deadline across all armed timers, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop every key whose deadline is `<= now`, removing them from the
    /// wheel. Callers are expected to re-arm (via [`arm`]) any timer whose
    /// segment is still outstanding after handling the fire.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<u32> {
        let expired: Vec<(Instant, u32)> = self
            .by_deadline
            .range(..=(now, u32::MAX))
            .map(|(k, _)| *k)
            .collect();

        let mut fired = Vec::with_capacity(expired.len());
        for key in expired {
            self.by_deadline.remove(&key);
            self.deadlines.remove(&key.1);
            fired.push(key.1);
        }
        fired
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}
