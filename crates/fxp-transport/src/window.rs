//! Sender-side sliding window: `base`/`nextSeq` bookkeeping shared by both
//! ARQ modes, plus the SR-only acked-set needed to advance `base` past
//! gaps.

use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};

/// GC threshold: window bookkeeping is swept once it holds more than
/// `max(cwnd, GC_FLOOR)` entries, dropping anything with `seq < base`.
const GC_FLOOR: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrAckResult {
    New { base_advanced: bool },
    Duplicate,
}

pub struct Window {
    base: u32,
    next_seq: u32,
    total_seq: u32,
    data: HashMap<u32, Bytes>,
    /// SR only: sequences `>= base` that have been acked but have not yet
    /// advanced `base` because of a gap below them.
    acked: BTreeSet<u32>,
}

impl Window {
    pub fn new(total_seq: u32) -> Self {
        Self {
            base: 0,
            next_seq: 0,
            total_seq,
            data: HashMap::new(),
            acked: BTreeSet::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn total_seq(&self) -> u32 {
        self.total_seq
    }

    /// Segments reserved but not yet acked. `base` can pass `next_seq` once
    /// the shutdown sentinel (at `seq == total_seq`) is acked (`base` lands
    /// on `total_seq + 1` while `next_seq` stays at `total_seq`), so this
    /// saturates instead of underflowing.
    pub fn in_flight(&self) -> u64 {
        self.next_seq.saturating_sub(self.base) as u64
    }

    pub fn is_fully_acked(&self) -> bool {
        self.base > self.total_seq
    }

    pub fn payload(&self, seq: u32) -> Option<&Bytes> {
        self.data.get(&seq)
    }

    /// Reserve the next unsent segment, storing its payload for possible
    /// retransmission. Caller is responsible for checking the congestion
    /// send gate before calling this.
    pub fn reserve_send(&mut self, payload: Bytes) -> u32 {
        let seq = self.next_seq;
        self.data.insert(seq, payload);
        self.next_seq += 1;
        seq
    }

    /// Apply a GBN cumulative ACK: if `seq >= base`, advance `base` to
    /// `seq + 1`. Returns whether this acknowledged new data (as opposed to
    /// a duplicate of the current `base - 1`).
    pub fn on_ack_gbn(&mut self, seq: u32) -> bool {
        if seq >= self.base {
            self.base = seq + 1;
            true
        } else {
            false
        }
    }

    /// Apply an SR per-segment ACK: record `seq` as acked, then advance
    /// `base` past any contiguous run of acked sequences starting at the
    /// new `base`. Distinguishes a genuinely new ack from a duplicate of
    /// one already recorded, so callers can grow congestion window exactly
    /// once per newly-acked segment.
    pub fn on_ack_sr(&mut self, seq: u32) -> SrAckResult {
        if seq < self.base || self.acked.contains(&seq) {
            return SrAckResult::Duplicate;
        }
        self.acked.insert(seq);

        let before = self.base;
        while self.acked.remove(&self.base) {
            self.base += 1;
        }
        SrAckResult::New {
            base_advanced: self.base != before,
        }
    }

    /// Drop retained payloads (and, for SR, stale acked-set entries) below
    /// `base`, if the relevant table has grown past the GC threshold.
    pub fn gc(&mut self, cwnd: f64) {
        let threshold = (cwnd.ceil() as usize).max(GC_FLOOR);
        let base = self.base;

        if self.data.len() > threshold {
            self.data.retain(|&seq, _| seq >= base);
        }
        if self.acked.len() > threshold {
            self.acked.retain(|&seq| seq >= base);
        }
    }

    /// Segments in `[base, next_seq)` with a retained payload, in order —
    /// what a GBN timeout retransmits in full.
    pub fn outstanding(&self) -> Vec<u32> {
        (self.base..self.next_seq)
            .filter(|seq| self.data.contains_key(seq))
            .collect()
    }
}
