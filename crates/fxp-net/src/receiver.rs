//! Receiver orchestration: wires `fxp_transport::receiver`'s GBN/SR engines
//! to a real output file and a real `UdpSocket`, single-threaded and driven
//! by a short read timeout (spec.md §4.8), matching the blocking-read
//! maintenance loop in `strata-bonding::receiver::transport::link_reader`.

use crate::cli::{ModeArg, ReceiverArgs};
use crate::digest::md5_hex;
use anyhow::Context;
use bytes::Bytes;
use fxp_transport::codec;
use fxp_transport::receiver::{GbnOutcome, GbnReceiver, SrReceiver};
use fxp_transport::stats::ReceiverStats;
use std::io::Write;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Socket read timeout: drives SR's opportunistic drain and the shutdown
/// grace countdown (spec.md §4.8: "a short read timeout, e.g. 500 ms").
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Consecutive read timeouts with no traffic, after the transfer has
/// finished, before the receiver closes (spec.md §4.9's "grace interval",
/// implementer-chosen per spec.md §9).
const SHUTDOWN_GRACE_TICKS: u32 = 5;

/// Outcome of one unit of receiver work (a parsed data packet, or a
/// maintenance tick), unified across both ARQ modes so the socket/file
/// plumbing below doesn't need to branch on mode.
struct Delivery {
    ack: Option<u32>,
    payloads: Vec<Bytes>,
    finished: bool,
}

enum Engine {
    Gbn(GbnReceiver),
    Sr(SrReceiver),
}

impl Engine {
    fn on_data(&mut self, seq: u32, payload: Bytes) -> Delivery {
        match self {
            Engine::Gbn(r) => match r.on_data(seq, payload) {
                GbnOutcome::InOrder {
                    ack,
                    payload,
                    finished,
                } => Delivery {
                    ack: Some(ack),
                    payloads: vec![payload],
                    finished,
                },
                GbnOutcome::OutOfOrder { ack } => Delivery {
                    ack: Some(ack),
                    payloads: Vec::new(),
                    finished: false,
                },
                GbnOutcome::NoAck => Delivery {
                    ack: None,
                    payloads: Vec::new(),
                    finished: false,
                },
            },
            Engine::Sr(r) => {
                let out = r.on_data(seq, payload);
                Delivery {
                    ack: out.ack,
                    payloads: out.delivered.into_iter().map(|(_, p)| p).collect(),
                    finished: out.finished,
                }
            }
        }
    }

    /// SR only: whether the reorder buffer has grown past its soft cap
    /// (spec.md §5's resource-bound signal — drained contiguously
    /// regardless, so this is purely a diagnostic, not a limiter).
    fn over_soft_cap(&self) -> bool {
        match self {
            Engine::Gbn(_) => false,
            Engine::Sr(r) => r.over_soft_cap(),
        }
    }

    fn maintain(&mut self) -> Delivery {
        match self {
            Engine::Gbn(_) => Delivery {
                ack: None,
                payloads: Vec::new(),
                finished: false,
            },
            Engine::Sr(r) => {
                let out = r.maintain();
                Delivery {
                    ack: out.ack,
                    payloads: out.delivered.into_iter().map(|(_, p)| p).collect(),
                    finished: out.finished,
                }
            }
        }
    }
}

pub fn run(args: ReceiverArgs) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let socket = UdpSocket::bind(addr).with_context(|| format!("binding {addr}"))?;
    socket
        .set_read_timeout(Some(READ_TIMEOUT))
        .context("setting socket read timeout")?;

    let mut out = std::fs::File::create(&args.output)
        .with_context(|| format!("creating output file {}", args.output.display()))?;

    let mut engine = match args.mode {
        ModeArg::Gbn => Engine::Gbn(GbnReceiver::new()),
        ModeArg::Sr => Engine::Sr(SrReceiver::new()),
    };
    let mut stats = ReceiverStats::new();

    info!(mode = ?args.mode, port = args.port, output = %args.output.display(), "listening");

    // Max framed packet this receiver will see: checksum+seq header plus MSS.
    let mut buf = vec![0u8; codec::MIN_PACKET_LEN + args.mss];
    let mut peer: Option<SocketAddr> = None;
    let mut finished = false;
    let mut grace_ticks = 0u32;

    loop {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                peer = Some(from);
                grace_ticks = 0;

                let Some(packet) = codec::parse(&buf[..n]) else {
                    stats.wire_errors_dropped += 1;
                    continue;
                };
                if packet.is_ack() {
                    continue; // a receiver never receives ACKs in this protocol
                }
                stats.packets_received += 1;

                let delivery = engine.on_data(packet.seq, packet.payload);
                if engine.over_soft_cap() {
                    warn!("SR reorder buffer past soft cap, gap below it is not closing");
                }
                apply_delivery(&mut out, &mut stats, delivery, &socket, from, &mut finished)?;
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                if finished {
                    grace_ticks += 1;
                    if grace_ticks >= SHUTDOWN_GRACE_TICKS {
                        break;
                    }
                    continue;
                }
                if let Some(from) = peer {
                    let delivery = engine.maintain();
                    apply_delivery(&mut out, &mut stats, delivery, &socket, from, &mut finished)?;
                }
            }
            Err(e) => return Err(e).context("receiving datagram"),
        }
    }

    out.flush().context("flushing output file")?;
    let digest = md5_hex(&args.output)?;
    info!(
        packets_received = stats.packets_received,
        bytes_delivered = stats.bytes_delivered,
        duplicates = stats.duplicates,
        wire_errors_dropped = stats.wire_errors_dropped,
        md5 = %digest,
        "transfer complete"
    );
    println!("{digest}  {}", args.output.display());

    Ok(())
}

fn apply_delivery(
    out: &mut std::fs::File,
    stats: &mut ReceiverStats,
    delivery: Delivery,
    socket: &UdpSocket,
    peer: SocketAddr,
    finished: &mut bool,
) -> anyhow::Result<()> {
    if delivery.payloads.is_empty() && delivery.ack.is_some() {
        stats.duplicates += 1;
    }

    for payload in &delivery.payloads {
        if !payload.is_empty() {
            out.write_all(payload).context("writing delivered bytes")?;
            stats.bytes_delivered += payload.len() as u64;
        }
    }

    if let Some(ack) = delivery.ack {
        debug!(ack, "acking");
        let frame = codec::build_ack(ack);
        if let Err(e) = socket.send_to(&frame, peer) {
            warn!(error = %e, "ack send failed");
        }
    }

    if delivery.finished && !*finished {
        *finished = true;
        out.flush().context("flushing output file at end of stream")?;
        info!("end-of-stream sentinel delivered, entering shutdown-ack loop");
    }

    Ok(())
}
