//! # fxp-transport
//!
//! Pure-logic reliable datagram file transfer protocol. No sockets, no
//! filesystem — every type here operates on bytes already in memory and
//! `Instant`s already read, so it can be driven by tests, by a real UDP
//! socket, or by a simulated channel without caring which.
//!
//! Two interchangeable ARQ modes share the same codec, channel simulator,
//! RTT estimator and congestion controller: Go-Back-N (cumulative ACKs,
//! one retransmission timer) and Selective-Repeat (per-segment ACKs, one
//! timer per outstanding segment).
//!
//! ## Crate structure
//!
//! - [`codec`] — wire packet framing and checksum
//! - [`channel`] — sender-side loss/corruption simulator
//! - [`window`] — sliding-window bookkeeping (GBN and SR)
//! - [`rtt`] — Jacobson/Karn RTT estimation
//! - [`congestion`] — Reno congestion control with optional Vegas signal
//! - [`timer`] — retransmission timer service (GBN single timer, SR per-segment)
//! - [`sender`] — sender engine
//! - [`receiver`] — receiver engine
//! - [`stats`] — transfer statistics

pub mod channel;
pub mod codec;
pub mod congestion;
pub mod receiver;
pub mod rtt;
pub mod sender;
pub mod stats;
pub mod timer;
pub mod window;
