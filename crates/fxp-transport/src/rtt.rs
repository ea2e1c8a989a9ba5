//! Jacobson/Karn RTT estimation and retransmission timeout.
//!
//! Every transmission of `seq` (first attempt or retransmit) records a send
//! time; on ACK, if `seq` still has a recorded send time, that sample feeds
//! the estimator and the entry is removed. Karn's rule — never sample a
//! retransmitted segment — falls out naturally: a retransmission deletes
//! and re-records `send_time[seq]`, so an ACK that actually answers the
//! retransmission looks identical to one answering the original, and an
//! ACK that raced the retransmission never double-samples.

use quanta::Instant;
use std::collections::HashMap;
use std::time::Duration;

/// Clamp bounds for `wait_time`, matching the spec's `[epsilon, MAX_TIME]`.
const MIN_WAIT: Duration = Duration::from_millis(1);
const MAX_WAIT: Duration = Duration::from_secs(5);

pub struct RttEstimator {
    send_time: HashMap<u32, Instant>,
    estimated_rtt: Duration,
    dev_rtt: Duration,
    wait_time: Duration,
    initialized: bool,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self {
            send_time: HashMap::new(),
            estimated_rtt: Duration::from_secs(1),
            dev_rtt: Duration::ZERO,
            wait_time: Duration::from_secs(1),
            initialized: false,
        }
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Record that `seq` was (re)transmitted now. Overwrites any prior
    /// entry, which is what makes Karn's rule hold across retransmits.
    pub fn on_transmit(&mut self, seq: u32) {
        self.send_time.insert(seq, Instant::now());
    }

    /// Drop any pending send-time sample for `seq` without using it —
    /// called when a timer fires and is about to retransmit, so the stale
    /// sample can't later be misattributed to the retransmission's ACK.
    pub fn forget(&mut self, seq: u32) {
        self.send_time.remove(&seq);
    }

    /// Feed an ACK for `seq`. Returns the sampled RTT if `seq` had a
    /// pending send time (every ACK is sampled; the reference
    /// implementation's 1% sampling was a CPU-saving hack this
    /// reimplementation doesn't need).
    pub fn on_ack(&mut self, seq: u32) -> Option<Duration> {
        let sent_at = self.send_time.remove(&seq)?;
        let sample = Instant::now().duration_since(sent_at);

        if !self.initialized {
            self.estimated_rtt = sample;
            self.dev_rtt = sample / 2;
            self.initialized = true;
        } else {
            let diff = if self.estimated_rtt > sample {
                self.estimated_rtt - sample
            } else {
                sample - self.estimated_rtt
            };
            self.dev_rtt = self.dev_rtt.mul_f64(0.75) + diff.mul_f64(0.25);
            self.estimated_rtt = self.estimated_rtt.mul_f64(0.875) + sample.mul_f64(0.125);
        }

        let rto = self.estimated_rtt.mul_f64(1.2) + self.dev_rtt * 4;
        self.wait_time = rto.clamp(MIN_WAIT, MAX_WAIT);
        Some(sample)
    }

    /// Current retransmission timeout.
    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// Double the timeout after a retransmission fires, capped at `MAX_WAIT`.
    pub fn backoff(&mut self) {
        self.wait_time = (self.wait_time * 2).min(MAX_WAIT);
    }

    pub fn estimated_rtt(&self) -> Duration {
        self.estimated_rtt
    }

    pub fn dev_rtt(&self) -> Duration {
        self.dev_rtt
    }

    pub fn pending_count(&self) -> usize {
        self.send_time.len()
    }

    /// Drop pending send-time samples for seqs below `base`. A GBN
    /// cumulative ack can advance `base` past seqs whose own ack was never
    /// observed individually, leaving their `send_time` entry stranded
    /// (`on_ack`/`forget` only ever remove the exact seq they're given).
    /// Called alongside `Window::gc` so this table is bounded the same way.
    pub fn gc(&mut self, base: u32) {
        self.send_time.retain(|&seq, _| seq >= base);
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}
