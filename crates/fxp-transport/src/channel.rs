//! Sender-side lossy/corrupting channel simulator.
//!
//! Applied only on the sending side — the receiver trusts whatever bytes
//! its socket hands it and runs no simulation of its own.

use rand::Rng;

/// Independently samples bit-corruption and packet loss for each outgoing
/// datagram. Corruption is checked first; if a packet is corrupted *and*
/// selected for loss, the drop wins (the corrupted bytes are never sent).
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    loss_rate: f64,
    corrupt_rate: f64,
}

impl Channel {
    pub fn new(loss_rate: f64, corrupt_rate: f64) -> Self {
        Self {
            loss_rate,
            corrupt_rate,
        }
    }

    /// Run `packet` through the simulator. Returns `Some(bytes)` to hand to
    /// the socket, possibly with a single bit flipped, or `None` if the
    /// packet should be dropped instead of sent.
    pub fn apply(&self, mut packet: Vec<u8>, rng: &mut impl Rng) -> Option<Vec<u8>> {
        if !packet.is_empty() && rng.random_bool(self.corrupt_rate.clamp(0.0, 1.0)) {
            let bit = rng.random_range(0..packet.len() * 8);
            packet[bit / 8] ^= 1 << (bit % 8);
        }

        if rng.random_bool(self.loss_rate.clamp(0.0, 1.0)) {
            None
        } else {
            Some(packet)
        }
    }
}
