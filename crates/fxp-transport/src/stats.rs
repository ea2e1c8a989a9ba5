//! Transfer statistics: plain counters the sender/receiver engines update
//! and `fxp-net` logs at lifecycle events (transfer start/complete) and
//! exposes for the final summary line alongside the MD5 digest.

use serde::Serialize;

/// Aggregate sender-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderStats {
    /// Total data packets sent, including every retransmission.
    pub packets_sent: u64,
    /// Original file bytes sent exactly once (excludes retransmissions).
    pub bytes_sent: u64,
    /// Packets retransmitted due to a timer firing.
    pub timeout_retransmissions: u64,
    /// Packets retransmitted due to GBN fast retransmit (triple dup ACK).
    pub fast_retransmissions: u64,
    /// Duplicate ACKs observed (GBN only).
    pub duplicate_acks: u64,
}

impl SenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of sent packets that were retransmissions.
    pub fn retransmit_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            let retransmits = self.timeout_retransmissions + self.fast_retransmissions;
            retransmits as f64 / self.packets_sent as f64
        }
    }
}

/// Aggregate receiver-side statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReceiverStats {
    /// Total data packets received, after checksum validation.
    pub packets_received: u64,
    /// Bytes written to the output file.
    pub bytes_delivered: u64,
    /// Duplicate or out-of-order segments that produced no new delivery.
    pub duplicates: u64,
    /// Packets silently dropped for being too short or checksum-mismatched.
    pub wire_errors_dropped: u64,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_retransmit_ratio_zero_when_none_sent() {
        let stats = SenderStats::new();
        assert_eq!(stats.retransmit_ratio(), 0.0);
    }

    #[test]
    fn sender_retransmit_ratio_counts_both_kinds() {
        let mut stats = SenderStats::new();
        stats.packets_sent = 100;
        stats.timeout_retransmissions = 3;
        stats.fast_retransmissions = 2;
        assert!((stats.retransmit_ratio() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn receiver_stats_default_is_zeroed() {
        let stats = ReceiverStats::new();
        assert_eq!(stats.packets_received, 0);
        assert_eq!(stats.bytes_delivered, 0);
    }
}
