//! Receiver engine: decides what to ACK and what to deliver given parsed
//! data packets, for both ARQ modes. No sockets, no file handle — the
//! caller (`fxp-net`) supplies parsed packets and writes whatever payloads
//! come back out in order.
//!
//! GBN delivers cumulatively in strict seq order and ACKs either the
//! matching seq or (guarded) `expected - 1` as a NAK-equivalent for
//! out-of-order arrivals. SR ACKs every intact segment unconditionally and
//! buffers out-of-order arrivals until the gap below them closes.

use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

/// Soft cap on the SR reorder buffer (spec §5: "Receiver SR buffer is
/// bounded by a soft cap N"). Overflow is handled by opportunistic
/// contiguous draining rather than eviction — a buffer this deep only
/// shrinks once the missing segment(s) below `base` arrive.
const SR_SOFT_CAP: usize = 2048;

/// Outcome of feeding one data packet to the GBN receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GbnOutcome {
    /// `seq == expected`: deliver the payload (unless it's the empty
    /// end-of-stream sentinel) and ACK it.
    InOrder {
        ack: u32,
        payload: Bytes,
        finished: bool,
    },
    /// `seq != expected` and `expected > 0`: nothing to deliver, ACK the
    /// last correctly-delivered seq as a cumulative NAK-equivalent.
    OutOfOrder { ack: u32 },
    /// `seq != expected` and `expected == 0`: the very first segment
    /// hasn't arrived yet, so there is no valid ACK to send — acking
    /// `expected - 1` here would underflow into a bogus huge seq.
    NoAck,
}

/// Cumulative, in-order delivery. Mirrors spec.md §4.8's GBN receiver.
pub struct GbnReceiver {
    expected: u32,
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self { expected: 0 }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Feed one already-checksum-validated data packet.
    pub fn on_data(&mut self, seq: u32, payload: Bytes) -> GbnOutcome {
        if seq == self.expected {
            let ack = seq;
            let finished = payload.is_empty();
            self.expected += 1;
            GbnOutcome::InOrder {
                ack,
                payload,
                finished,
            }
        } else if self.expected == 0 {
            GbnOutcome::NoAck
        } else {
            GbnOutcome::OutOfOrder {
                ack: self.expected - 1,
            }
        }
    }
}

impl Default for GbnReceiver {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of feeding one data packet (or a maintenance tick) to the SR
/// receiver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SrOutcome {
    /// SR ACKs every intact segment unconditionally, including duplicates
    /// and segments above a gap — `None` only for a maintenance tick that
    /// didn't originate from a received packet.
    pub ack: Option<u32>,
    /// Newly deliverable payloads, in ascending seq order.
    pub delivered: Vec<(u32, Bytes)>,
    /// Whether the end-of-stream sentinel was among the delivered payloads.
    pub finished: bool,
}

/// Buffered, per-segment-acked delivery. Mirrors spec.md §4.8's SR receiver.
pub struct SrReceiver {
    base: u32,
    buf: BTreeMap<u32, Bytes>,
    acked: BTreeSet<u32>,
}

impl SrReceiver {
    pub fn new() -> Self {
        Self {
            base: 0,
            buf: BTreeMap::new(),
            acked: BTreeSet::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Feed one already-checksum-validated data packet. Always ACKs `seq`
    /// itself, then drains as much of the contiguous prefix as is ready.
    pub fn on_data(&mut self, seq: u32, payload: Bytes) -> SrOutcome {
        if seq >= self.base {
            self.buf.insert(seq, payload);
            self.acked.insert(seq);
        }
        let (delivered, finished) = self.drain();
        SrOutcome {
            ack: Some(seq),
            delivered,
            finished,
        }
    }

    /// Opportunistic drain with no accompanying ACK, driven by the
    /// receiver's read-timeout maintenance tick (spec §4.8: "If the read
    /// timeout fires, drain contiguous buffered entries opportunistically").
    pub fn maintain(&mut self) -> SrOutcome {
        let (delivered, finished) = self.drain();
        SrOutcome {
            ack: None,
            delivered,
            finished,
        }
    }

    /// True once the buffer has grown past the soft cap and a caller might
    /// want to log/alert — draining itself is unconditional and contiguous,
    /// so overflow only clears once the blocking gap is filled.
    pub fn over_soft_cap(&self) -> bool {
        self.buf.len() > SR_SOFT_CAP
    }

    fn drain(&mut self) -> (Vec<(u32, Bytes)>, bool) {
        let mut delivered = Vec::new();
        let mut finished = false;
        while self.acked.remove(&self.base) {
            let payload = self
                .buf
                .remove(&self.base)
                .expect("acked seq always has a buffered payload");
            let is_sentinel = payload.is_empty();
            delivered.push((self.base, payload));
            self.base += 1;
            if is_sentinel {
                finished = true;
                break;
            }
        }
        (delivered, finished)
    }
}

impl Default for SrReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbn_in_order_delivers_and_advances_expected() {
        let mut r = GbnReceiver::new();
        assert_eq!(
            r.on_data(0, Bytes::from_static(b"ABCD")),
            GbnOutcome::InOrder {
                ack: 0,
                payload: Bytes::from_static(b"ABCD"),
                finished: false
            }
        );
        assert_eq!(r.expected(), 1);
    }

    #[test]
    fn gbn_empty_payload_at_expected_signals_finished() {
        let mut r = GbnReceiver::new();
        r.on_data(0, Bytes::new());
        assert_eq!(
            r.on_data(1, Bytes::new()),
            GbnOutcome::InOrder {
                ack: 1,
                payload: Bytes::new(),
                finished: true
            }
        );
    }

    #[test]
    fn gbn_out_of_order_acks_expected_minus_one() {
        let mut r = GbnReceiver::new();
        r.on_data(0, Bytes::from_static(b"A"));
        // seq 2 arrives before seq 1 — cumulative NAK-equivalent for seq 0.
        assert_eq!(r.on_data(2, Bytes::from_static(b"C")), GbnOutcome::OutOfOrder { ack: 0 });
        assert_eq!(r.expected(), 1);
    }

    #[test]
    fn gbn_out_of_order_at_expected_zero_sends_no_ack() {
        let mut r = GbnReceiver::new();
        // Nothing delivered yet — acking `expected - 1` would underflow.
        assert_eq!(r.on_data(1, Bytes::from_static(b"B")), GbnOutcome::NoAck);
        assert_eq!(r.expected(), 0);
    }

    #[test]
    fn gbn_duplicate_of_expected_minus_one_is_idempotent() {
        let mut r = GbnReceiver::new();
        r.on_data(0, Bytes::new());
        r.on_data(1, Bytes::new());
        assert_eq!(r.on_data(0, Bytes::new()), GbnOutcome::OutOfOrder { ack: 1 });
        assert_eq!(r.expected(), 2);
    }

    #[test]
    fn scenario_gbn_lossless_three_segments() {
        // spec scenario 1: MSS=4, "ABCDEFG" -> seq0 "ABCD", seq1 "EFG", seq2 "".
        let mut r = GbnReceiver::new();
        let mut out = Vec::new();
        match r.on_data(0, Bytes::from_static(b"ABCD")) {
            GbnOutcome::InOrder { payload, .. } => out.extend_from_slice(&payload),
            other => panic!("unexpected {other:?}"),
        }
        match r.on_data(1, Bytes::from_static(b"EFG")) {
            GbnOutcome::InOrder { payload, .. } => out.extend_from_slice(&payload),
            other => panic!("unexpected {other:?}"),
        }
        match r.on_data(2, Bytes::new()) {
            GbnOutcome::InOrder { finished, .. } => assert!(finished),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(out, b"ABCDEFG");
    }

    #[test]
    fn scenario_gbn_retransmitted_seq_after_dropped_ack() {
        // spec scenario 2: receiver re-acks seq 0 and seq 1 cumulatively when
        // the sender retransmits both after a dropped ACK for seq 0.
        let mut r = GbnReceiver::new();
        r.on_data(0, Bytes::from_static(b"ABCD"));
        r.on_data(1, Bytes::from_static(b"EFGH"));
        // Sender retransmits seq 0 (stale) and seq 1 (already-delivered dup).
        assert_eq!(r.on_data(0, Bytes::from_static(b"ABCD")), GbnOutcome::OutOfOrder { ack: 1 });
        assert_eq!(r.on_data(1, Bytes::from_static(b"EFGH")), GbnOutcome::OutOfOrder { ack: 1 });
        assert_eq!(r.expected(), 2);
    }

    #[test]
    fn sr_acks_every_segment_unconditionally() {
        let mut r = SrReceiver::new();
        let out = r.on_data(5, Bytes::from_static(b"x"));
        assert_eq!(out.ack, Some(5));
        assert!(out.delivered.is_empty()); // gap below 5 still open
    }

    #[test]
    fn sr_delivers_contiguous_prefix_once_gap_fills() {
        let mut r = SrReceiver::new();
        r.on_data(1, Bytes::from_static(b"B"));
        r.on_data(2, Bytes::from_static(b"C"));
        assert_eq!(r.base(), 0);

        let out = r.on_data(0, Bytes::from_static(b"A"));
        assert_eq!(
            out.delivered,
            vec![
                (0, Bytes::from_static(b"A")),
                (1, Bytes::from_static(b"B")),
                (2, Bytes::from_static(b"C")),
            ]
        );
        assert_eq!(r.base(), 3);
    }

    #[test]
    fn scenario_sr_mss1_xy_out_of_order() {
        // spec scenario 3: MSS=1, file "XY", seq0's first transmission lost.
        let mut r = SrReceiver::new();
        let out1 = r.on_data(1, Bytes::from_static(b"Y"));
        assert_eq!(out1.ack, Some(1));
        assert!(out1.delivered.is_empty());
        assert_eq!(r.base(), 0);

        let out0 = r.on_data(0, Bytes::from_static(b"X"));
        assert_eq!(out0.ack, Some(0));
        assert_eq!(
            out0.delivered,
            vec![(0, Bytes::from_static(b"X")), (1, Bytes::from_static(b"Y"))]
        );
        assert_eq!(r.base(), 2);

        let sentinel = r.on_data(2, Bytes::new());
        assert!(sentinel.finished);
        assert_eq!(r.base(), 3);
    }

    #[test]
    fn sr_duplicate_delivery_is_idempotent() {
        let mut r = SrReceiver::new();
        r.on_data(0, Bytes::from_static(b"A"));
        let base_after_first = r.base();
        let out = r.on_data(0, Bytes::from_static(b"A"));
        assert_eq!(r.base(), base_after_first);
        assert!(out.delivered.is_empty());
    }

    #[test]
    fn sr_empty_sentinel_at_base_signals_finished_and_stops_draining() {
        let mut r = SrReceiver::new();
        r.on_data(1, Bytes::from_static(b"after-end")); // buffered past sentinel
        let out = r.on_data(0, Bytes::new());
        assert!(out.finished);
        // Draining stops at the sentinel; seq 1 stays buffered (and would
        // only matter if the sender ever sent data past totalSeq, which it
        // doesn't — this just documents that drain() won't run past it).
        assert_eq!(out.delivered, vec![(0, Bytes::new())]);
        assert_eq!(r.base(), 1);
    }

    #[test]
    fn sr_maintain_drains_without_ack_when_gap_already_closed() {
        let mut r = SrReceiver::new();
        r.on_data(0, Bytes::from_static(b"A"));
        let out = r.maintain();
        assert_eq!(out.ack, None);
        assert!(out.delivered.is_empty()); // nothing new to drain
    }

    #[test]
    fn sr_over_soft_cap_reports_true_when_buffer_grows_past_it() {
        let mut r = SrReceiver::new();
        for seq in 1..=3000u32 {
            r.on_data(seq, Bytes::new()); // gap at 0 keeps everything buffered
        }
        assert!(r.over_soft_cap());
    }
}
