//! Sender engine: decides what to transmit next given file bytes, ACKs,
//! and elapsed time. No sockets, no file handle — the caller (`fxp-net`)
//! supplies payload bytes when [`Sender::can_send`] allows it and feeds
//! back parsed ACK packets and timer ticks.

use crate::codec;
use crate::congestion::{CcState, CongestionController};
use crate::rtt::RttEstimator;
use crate::timer::TimerWheel;
use crate::window::{SrAckResult, Window};
use bytes::Bytes;
use quanta::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Gbn,
    Sr,
}

pub struct SenderConfig {
    pub mode: Mode,
    pub mss: usize,
    pub total_seq: u32,
    pub initial_window: f64,
    /// `false` recovers the reference implementation's fixed-window GBN
    /// client, which has no Reno controller at all.
    pub congestion_control: bool,
    pub vegas: bool,
}

/// A framed segment ready to hand to the channel simulator and socket.
#[derive(Debug, Clone)]
pub struct OutSegment {
    pub seq: u32,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Newly acknowledged data; `base` may or may not have moved (SR can
    /// ack a segment above a gap without advancing `base`).
    NewAck { seq: u32 },
    /// A duplicate of an already-acknowledged (or stale) ack.
    DuplicateAck { seq: u32 },
    /// GBN only: third duplicate ACK triggered a fast retransmit.
    FastRetransmit,
}

/// Single key under which GBN's one shared timer is armed.
const GBN_TIMER_KEY: u32 = u32::MAX;

pub struct Sender {
    mode: Mode,
    mss: usize,
    window: Window,
    cc: Option<CongestionController>,
    fixed_window: f64,
    rtt: RttEstimator,
    timers: TimerWheel,
    dup_ack_count: u32,
}

impl Sender {
    pub fn new(config: SenderConfig) -> Self {
        let cc = config
            .congestion_control
            .then(|| CongestionController::new(config.initial_window, config.vegas));

        Self {
            mode: config.mode,
            mss: config.mss,
            window: Window::new(config.total_seq),
            cc,
            fixed_window: config.initial_window.max(1.0),
            rtt: RttEstimator::new(),
            timers: TimerWheel::new(),
            dup_ack_count: 0,
        }
    }

    pub fn mss(&self) -> usize {
        self.mss
    }

    pub fn total_seq(&self) -> u32 {
        self.window.total_seq()
    }

    pub fn next_seq(&self) -> u32 {
        self.window.next_seq()
    }

    pub fn base(&self) -> u32 {
        self.window.base()
    }

    pub fn cwnd(&self) -> f64 {
        self.cc.as_ref().map_or(self.fixed_window, |cc| cc.cwnd())
    }

    /// Congestion-control phase, or `None` when congestion control is
    /// disabled (fixed-window mode per spec.md §5.5).
    pub fn cc_state(&self) -> Option<CcState> {
        self.cc.as_ref().map(|cc| cc.state())
    }

    pub fn ssthresh(&self) -> Option<f64> {
        self.cc.as_ref().map(|cc| cc.ssthresh())
    }

    fn window_cap(&self) -> u64 {
        self.cc
            .as_ref()
            .map_or(self.fixed_window.floor() as u64, |cc| cc.window())
    }

    /// True once all file segments have been transmitted.
    pub fn all_segments_sent(&self) -> bool {
        self.window.next_seq() >= self.window.total_seq()
    }

    /// Send-gate: room in the window and file data still unsent.
    pub fn can_send(&self) -> bool {
        self.window.next_seq() < self.window.total_seq()
            && self.window.in_flight() < self.window_cap()
    }

    /// True once every data segment (but not necessarily the end-of-stream
    /// sentinel) has been acknowledged.
    pub fn all_data_acked(&self) -> bool {
        self.window.base() >= self.window.total_seq()
    }

    /// True once the end-of-stream sentinel itself has been acknowledged.
    pub fn shutdown_acked(&self) -> bool {
        self.window.base() > self.window.total_seq()
    }

    /// Reserve and frame the next data segment. Caller must have checked
    /// [`can_send`] first.
    pub fn send(&mut self, payload: Bytes, now: Instant) -> OutSegment {
        let seq = self.window.reserve_send(payload.clone());
        self.arm_on_transmit(seq, now);
        OutSegment {
            seq,
            bytes: codec::build(seq, &payload),
        }
    }

    /// Frame the end-of-stream sentinel (`seq == totalSeq`, empty payload).
    /// Does not touch window/timer state — the shutdown loop in `fxp-net`
    /// re-sends this on its own cadence until acked or retry budget expires.
    pub fn sentinel(&self) -> Bytes {
        codec::build(self.window.total_seq(), &[])
    }

    fn arm_on_transmit(&mut self, seq: u32, now: Instant) {
        self.rtt.on_transmit(seq);
        match self.mode {
            Mode::Gbn => {
                if self.window.base() == seq {
                    self.timers.arm(GBN_TIMER_KEY, now + self.rtt.wait_time());
                }
            }
            Mode::Sr => {
                self.timers.arm(seq, now + self.rtt.wait_time());
            }
        }
    }

    /// Process a parsed ACK packet's `seq` field.
    pub fn process_ack(&mut self, seq: u32, now: Instant) -> AckOutcome {
        match self.mode {
            Mode::Gbn => self.process_ack_gbn(seq, now),
            Mode::Sr => self.process_ack_sr(seq, now),
        }
    }

    fn process_ack_gbn(&mut self, seq: u32, now: Instant) -> AckOutcome {
        let base_before = self.window.base();

        if self.window.on_ack_gbn(seq) {
            let sample = self.rtt.on_ack(seq);
            self.dup_ack_count = 0;

            if let Some(cc) = &mut self.cc {
                cc.on_new_ack();
                if let Some(sample) = sample {
                    cc.on_rtt_sample(sample, self.rtt.estimated_rtt());
                }
            }

            if self.window.in_flight() == 0 {
                self.timers.cancel(GBN_TIMER_KEY);
            } else {
                self.timers.arm(GBN_TIMER_KEY, now + self.rtt.wait_time());
            }
            self.window.gc(self.cwnd());
            self.rtt.gc(self.window.base());
            return AckOutcome::NewAck { seq };
        }

        // Duplicate of the current cumulative ack (receiver re-acking
        // `expected - 1` because an out-of-order segment arrived).
        if seq + 1 == base_before {
            self.dup_ack_count += 1;
            if self.dup_ack_count == 3 {
                self.dup_ack_count = 0;
                if let Some(cc) = &mut self.cc {
                    cc.on_timeout();
                }
                return AckOutcome::FastRetransmit;
            }
        }

        AckOutcome::DuplicateAck { seq }
    }

    fn process_ack_sr(&mut self, seq: u32, now: Instant) -> AckOutcome {
        let sample = self.rtt.on_ack(seq);
        if let (Some(sample), Some(cc)) = (sample, &mut self.cc) {
            cc.on_rtt_sample(sample, self.rtt.estimated_rtt());
        }

        match self.window.on_ack_sr(seq) {
            SrAckResult::New { .. } => {
                self.timers.cancel(seq);
                if let Some(cc) = &mut self.cc {
                    cc.on_new_ack();
                }
                self.window.gc(self.cwnd());
                self.rtt.gc(self.window.base());
                AckOutcome::NewAck { seq }
            }
            SrAckResult::Duplicate => {
                // Timer may already be canceled; canceling again is a no-op.
                self.timers.cancel(seq);
                AckOutcome::DuplicateAck { seq }
            }
        }
    }

    /// GBN fast retransmit (triggered by [`AckOutcome::FastRetransmit`]) or
    /// a timer-driven retransmission. Rebuilds every segment still in
    /// `[base, nextSeq)` with a retained payload and restarts the timer.
    pub fn retransmit_window(&mut self, now: Instant) -> Vec<OutSegment> {
        let segments: Vec<OutSegment> = self
            .window
            .outstanding()
            .into_iter()
            .map(|seq| {
                let payload = self.window.payload(seq).cloned().unwrap_or_default();
                self.rtt.forget(seq);
                self.rtt.on_transmit(seq);
                OutSegment {
                    seq,
                    bytes: codec::build(seq, &payload),
                }
            })
            .collect();

        if !segments.is_empty() {
            self.timers.arm(GBN_TIMER_KEY, now + self.rtt.wait_time());
        }
        segments
    }

    /// Sweep all fired timers and produce the retransmissions they imply:
    /// the whole outstanding window for GBN, just the one segment for SR.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<OutSegment> {
        let fired = self.timers.pop_expired(now);
        if fired.is_empty() {
            return Vec::new();
        }

        self.rtt.backoff();
        if let Some(cc) = &mut self.cc {
            cc.on_timeout();
        }

        match self.mode {
            Mode::Gbn => self.retransmit_window(now),
            Mode::Sr => fired
                .into_iter()
                .filter_map(|seq| {
                    let payload = self.window.payload(seq)?.clone();
                    self.rtt.forget(seq);
                    self.rtt.on_transmit(seq);
                    self.timers.arm(seq, now + self.rtt.wait_time());
                    Some(OutSegment {
                        seq,
                        bytes: codec::build(seq, &payload),
                    })
                })
                .collect(),
        }
    }

    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gbn_sender(total_seq: u32) -> Sender {
        Sender::new(SenderConfig {
            mode: Mode::Gbn,
            mss: 4,
            total_seq,
            initial_window: 4.0,
            congestion_control: false,
            vegas: false,
        })
    }

    fn sr_sender(total_seq: u32) -> Sender {
        Sender::new(SenderConfig {
            mode: Mode::Sr,
            mss: 1,
            total_seq,
            initial_window: 4.0,
            congestion_control: false,
            vegas: false,
        })
    }

    #[test]
    fn scenario_gbn_lossless_three_segments() {
        // spec scenario 1: MSS=4, file "ABCDEFG" (7B), totalSeq = ceil(7/4) =
        // 2 -> data segments "ABCD" (seq0), "EFG" (seq1), sentinel (seq2).
        let mut s = gbn_sender(2);
        let now = Instant::now();
        assert!(s.can_send());
        let seg0 = s.send(Bytes::from_static(b"ABCD"), now);
        assert_eq!(seg0.seq, 0);
        let seg1 = s.send(Bytes::from_static(b"EFG"), now);
        assert_eq!(seg1.seq, 1);
        assert!(!s.can_send()); // nextSeq == totalSeq, only the sentinel remains

        assert_eq!(s.process_ack(0, now), AckOutcome::NewAck { seq: 0 });
        assert_eq!(s.process_ack(1, now), AckOutcome::NewAck { seq: 1 });
        assert!(s.all_data_acked());
        assert!(!s.shutdown_acked());

        let sentinel = s.sentinel();
        let parsed = codec::parse(&sentinel).unwrap();
        assert_eq!(parsed.seq, 2);
        assert!(parsed.is_sentinel());

        assert_eq!(s.process_ack(2, now), AckOutcome::NewAck { seq: 2 });
        assert!(s.shutdown_acked());
    }

    #[test]
    fn gbn_timeout_retransmits_whole_window() {
        let mut s = gbn_sender(4);
        let now = Instant::now();
        s.send(Bytes::from_static(b"AAAA"), now);
        s.send(Bytes::from_static(b"BBBB"), now);
        s.send(Bytes::from_static(b"CCCC"), now);

        let later = now + std::time::Duration::from_secs(10);
        let retransmitted = s.poll_timers(later);
        assert_eq!(retransmitted.len(), 3);
        assert_eq!(
            retransmitted.iter().map(|s| s.seq).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn gbn_timeout_halves_cwnd_and_resets_slow_start() {
        let mut s = Sender::new(SenderConfig {
            mode: Mode::Gbn,
            mss: 4,
            total_seq: 20,
            initial_window: 8.0,
            congestion_control: true,
            vegas: false,
        });
        let now = Instant::now();
        s.send(Bytes::new(), now);
        s.poll_timers(now + std::time::Duration::from_secs(10));
        assert_eq!(s.cwnd(), 1.0);
    }

    #[test]
    fn gbn_triple_duplicate_ack_triggers_fast_retransmit() {
        let mut s = Sender::new(SenderConfig {
            mode: Mode::Gbn,
            mss: 4,
            total_seq: 20,
            initial_window: 10.0,
            congestion_control: true,
            vegas: false,
        });
        let now = Instant::now();
        for _ in 0..6 {
            s.send(Bytes::new(), now);
        }
        s.process_ack(4, now); // base advances to 5
        let before_cwnd = s.cwnd();
        assert_eq!(s.process_ack(4, now), AckOutcome::DuplicateAck { seq: 4 });
        assert_eq!(s.process_ack(4, now), AckOutcome::DuplicateAck { seq: 4 });
        assert_eq!(s.process_ack(4, now), AckOutcome::FastRetransmit);
        assert!(s.cwnd() < before_cwnd);
    }

    #[test]
    fn sr_selective_retransmit_only_missing_segment() {
        // spec scenario 3: MSS=1 file "XY", seq0's first send is lost.
        let mut s = sr_sender(2);
        let now = Instant::now();
        s.send(Bytes::from_static(b"X"), now);
        s.send(Bytes::from_static(b"Y"), now);

        assert_eq!(s.process_ack(1, now), AckOutcome::NewAck { seq: 1 });
        assert_eq!(s.base(), 0); // gap at 0 still open

        let later = now + std::time::Duration::from_secs(10);
        let retransmitted = s.poll_timers(later);
        assert_eq!(retransmitted.len(), 1);
        assert_eq!(retransmitted[0].seq, 0);

        assert_eq!(s.process_ack(0, later), AckOutcome::NewAck { seq: 0 });
        assert_eq!(s.base(), 2);
    }

    #[test]
    fn sr_ack_applied_twice_is_idempotent() {
        let mut s = sr_sender(3);
        let now = Instant::now();
        s.send(Bytes::new(), now);
        s.process_ack(0, now);
        let base_after_first = s.base();
        assert_eq!(s.process_ack(0, now), AckOutcome::DuplicateAck { seq: 0 });
        assert_eq!(s.base(), base_after_first);
    }

    #[test]
    fn send_gate_blocks_when_window_full() {
        let mut s = Sender::new(SenderConfig {
            mode: Mode::Gbn,
            mss: 1,
            total_seq: 10,
            initial_window: 2.0,
            congestion_control: false,
            vegas: false,
        });
        let now = Instant::now();
        assert!(s.can_send());
        s.send(Bytes::new(), now);
        assert!(s.can_send());
        s.send(Bytes::new(), now);
        assert!(!s.can_send());
    }

    #[test]
    fn reno_slow_start_grows_window_allowing_more_sends() {
        let mut s = Sender::new(SenderConfig {
            mode: Mode::Gbn,
            mss: 1,
            total_seq: 100,
            initial_window: 1.0,
            congestion_control: true,
            vegas: false,
        });
        let now = Instant::now();
        s.send(Bytes::new(), now);
        assert!(!s.can_send());
        s.process_ack(0, now);
        assert_eq!(s.cwnd(), 2.0);
        assert!(s.can_send());
    }

    #[test]
    fn gbn_vegas_penalizes_cwnd_on_delayed_ack() {
        // Vegas applies regardless of ARQ mode, not just SR: a sample RTT
        // above the running estimate should knock cwnd down here too.
        // `RttEstimator` samples real wall-clock time internally (the
        // `Instant` passed to `send`/`process_ack` only drives the timer
        // wheel), so this test uses real sleeps rather than synthetic
        // clock advances to produce a rising RTT sample.
        let mut s = Sender::new(SenderConfig {
            mode: Mode::Gbn,
            mss: 1,
            total_seq: 100,
            initial_window: 150.0,
            congestion_control: true,
            vegas: true,
        });
        let now = Instant::now();
        s.send(Bytes::new(), now);
        s.process_ack(0, now); // seeds a near-zero estimated RTT

        s.send(Bytes::new(), now);
        let before = s.cwnd();
        std::thread::sleep(std::time::Duration::from_millis(20));
        s.process_ack(1, now);
        assert!(s.cwnd() < before);
    }
}
