//! Reno-style congestion control, with an optional Vegas-like delay signal.
//!
//! `cwnd` is expressed in segments, not bytes — the send gate is
//! `nextSeq < base + floor(cwnd)`, evaluated by the caller (the sender
//! engine owns `base`/`nextSeq`; this type only tracks the window size and
//! phase).

use std::time::Duration;

/// Vegas's fixed cwnd penalty when a sample RTT exceeds the running
/// estimate, matching the spec's reference value.
const VEGAS_PENALTY: f64 = 100.0;

/// Initial slow-start threshold. Finite (unlike some Reno variants that
/// start it unbounded) so a lossless transfer actually exercises the
/// congestion-avoidance phase instead of staying in slow start forever.
const INITIAL_SSTHRESH: f64 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcState {
    SlowStart,
    CongestionAvoidance,
}

pub struct CongestionController {
    cwnd: f64,
    ssthresh: f64,
    state: CcState,
    vegas: bool,
}

impl CongestionController {
    pub fn new(initial_cwnd: f64, vegas: bool) -> Self {
        Self {
            cwnd: initial_cwnd.max(1.0),
            ssthresh: INITIAL_SSTHRESH,
            state: CcState::SlowStart,
            vegas,
        }
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    /// Integral window size used for the send gate.
    pub fn window(&self) -> u64 {
        self.cwnd.floor() as u64
    }

    pub fn ssthresh(&self) -> f64 {
        self.ssthresh
    }

    pub fn state(&self) -> CcState {
        self.state
    }

    /// A new (non-duplicate) ACK arrived for data.
    pub fn on_new_ack(&mut self) {
        match self.state {
            CcState::SlowStart => {
                self.cwnd += 1.0;
                if self.cwnd >= self.ssthresh {
                    self.state = CcState::CongestionAvoidance;
                }
            }
            CcState::CongestionAvoidance => {
                self.cwnd += 1.0 / self.cwnd;
            }
        }
    }

    /// A retransmission timer fired, or (GBN) a third duplicate ACK
    /// triggered a fast retransmit. Both are treated identically for
    /// `cwnd`: halve `ssthresh`, reset to slow start with `cwnd = 1`.
    pub fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2.0).max(1.0);
        self.cwnd = 1.0;
        self.state = CcState::SlowStart;
    }

    /// Optional Vegas-like delay signal: a sample RTT exceeding the
    /// smoothed estimate is treated as an early congestion warning and
    /// knocks a fixed amount off `cwnd`, floored at 1.0. No-op when Vegas
    /// is disabled.
    pub fn on_rtt_sample(&mut self, sample: Duration, estimated: Duration) {
        if self.vegas && sample > estimated {
            self.cwnd = (self.cwnd - VEGAS_PENALTY).max(1.0);
        }
    }

    /// Whether a new segment may be transmitted given the current window
    /// occupancy `nextSeq - base`.
    pub fn can_send(&self, in_flight: u64) -> bool {
        in_flight < self.window()
    }
}
