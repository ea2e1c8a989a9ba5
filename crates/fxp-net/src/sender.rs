//! Sender orchestration: wires `fxp_transport::sender::Sender` to a real
//! file and a real (simulated-lossy) `UdpSocket`, following the three
//! concurrent activities of spec.md §5 — send loop, ACK receiver, timer
//! maintenance — serialized through one mutex, the way
//! `strata-bonding::net::transport::TransportLink` wires `strata-transport`
//! to a socket behind `Mutex<Sender>`.

use crate::cli::SenderArgs;
use crate::digest::md5_hex;
use anyhow::{Context, Result};
use fxp_transport::channel::Channel;
use fxp_transport::codec;
use fxp_transport::sender::{AckOutcome, Sender, SenderConfig};
use fxp_transport::stats::SenderStats;
use quanta::Instant;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Read;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the ACK-receiver thread's blocking read wakes up to check the
/// shutdown flag when no datagram has arrived.
const ACK_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How often the maintenance thread sweeps the timer wheel.
const TIMER_TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Sentinel retransmission cadence during the shutdown handshake
/// (spec.md §4.7: "every ~100 ms").
const SENTINEL_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded retry budget for the shutdown handshake (spec.md §9: "the
/// sender exits after a bounded retry budget, e.g. 20 attempts").
const SENTINEL_RETRY_BUDGET: u32 = 20;

fn total_seq(filesize: u64, mss: usize) -> u32 {
    if filesize == 0 {
        return 0;
    }
    (filesize as usize).div_ceil(mss) as u32
}

/// Pushes one framed segment through the loss/corruption simulator and, if
/// it survives, onto the wire. Each calling thread owns its own `rng` so no
/// lock is needed beyond the one already held for transport state.
fn transmit(
    socket: &UdpSocket,
    channel: &Channel,
    rng: &mut StdRng,
    bytes: &[u8],
) -> std::io::Result<()> {
    match channel.apply(bytes.to_vec(), rng) {
        Some(surviving) => {
            socket.send(&surviving)?;
            Ok(())
        }
        None => Ok(()), // dropped by the simulator, not a transmission error
    }
}

pub fn run(args: SenderArgs) -> Result<()> {
    let mut file = std::fs::File::open(&args.input)
        .with_context(|| format!("opening input file {}", args.input.display()))?;
    let filesize = file
        .metadata()
        .with_context(|| format!("reading metadata for {}", args.input.display()))?
        .len();
    let total_seq = total_seq(filesize, args.mss);

    info!(
        mode = ?args.mode,
        host = %args.host,
        port = args.port,
        mss = args.mss,
        window = args.window,
        filesize,
        total_seq,
        "starting transfer"
    );

    let socket = UdpSocket::bind("0.0.0.0:0").context("binding sender socket")?;
    socket
        .connect((args.host.as_str(), args.port))
        .with_context(|| format!("connecting to {}:{}", args.host, args.port))?;
    socket
        .set_read_timeout(Some(ACK_POLL_INTERVAL))
        .context("setting socket read timeout")?;

    let channel = Channel::new(args.loss, args.corrupt);

    let sender = Arc::new(Mutex::new(Sender::new(SenderConfig {
        mode: args.mode.into(),
        mss: args.mss,
        total_seq,
        initial_window: args.window,
        congestion_control: !args.no_congestion_control,
        vegas: args.vegas,
    })));
    let stats = Arc::new(Mutex::new(SenderStats::new()));
    let shutdown = Arc::new(AtomicBool::new(false));

    let ack_handle = {
        let sender = sender.clone();
        let stats = stats.clone();
        let socket = socket.try_clone().context("cloning socket for ACK thread")?;
        let channel = channel.clone();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("fxp-sender-ack".into())
            .spawn(move || ack_loop(sender, stats, socket, channel, shutdown))
            .context("spawning ACK receiver thread")?
    };

    let timer_handle = {
        let sender = sender.clone();
        let stats = stats.clone();
        let socket = socket.try_clone().context("cloning socket for timer thread")?;
        let channel = channel.clone();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("fxp-sender-timer".into())
            .spawn(move || timer_loop(sender, stats, socket, channel, shutdown))
            .context("spawning timer thread")?
    };

    let mut send_rng = StdRng::from_os_rng();
    let mut buf = vec![0u8; args.mss];

    loop {
        let can_send = sender.lock().unwrap().can_send();
        if !can_send {
            if sender.lock().unwrap().all_segments_sent() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        let n = read_up_to(&mut file, &mut buf)?;
        let payload = bytes::Bytes::copy_from_slice(&buf[..n]);

        let seg = sender.lock().unwrap().send(payload, Instant::now());
        debug!(seq = seg.seq, len = seg.bytes.len(), "sending segment");
        transmit(&socket, &channel, &mut send_rng, &seg.bytes)
            .context("sending data segment")?;
        stats.lock().unwrap().packets_sent += 1;
        stats.lock().unwrap().bytes_sent += n as u64;
    }

    info!("all segments transmitted, entering shutdown handshake");

    let mut attempts = 0;
    while attempts < SENTINEL_RETRY_BUDGET {
        let (sentinel, shutdown_acked) = {
            let s = sender.lock().unwrap();
            (s.sentinel(), s.shutdown_acked())
        };
        if shutdown_acked {
            break;
        }
        transmit(&socket, &channel, &mut send_rng, &sentinel)
            .context("sending shutdown sentinel")?;
        attempts += 1;
        thread::sleep(SENTINEL_RETRY_INTERVAL);
    }

    if attempts >= SENTINEL_RETRY_BUDGET && !sender.lock().unwrap().shutdown_acked() {
        warn!(
            attempts,
            "shutdown sentinel never acknowledged, exiting anyway"
        );
    }

    shutdown.store(true, Ordering::Relaxed);
    ack_handle.join().expect("ACK thread panicked");
    timer_handle.join().expect("timer thread panicked");

    let final_stats = stats.lock().unwrap().clone();
    let digest = md5_hex(&args.input)?;
    info!(
        packets_sent = final_stats.packets_sent,
        bytes_sent = final_stats.bytes_sent,
        timeout_retransmissions = final_stats.timeout_retransmissions,
        fast_retransmissions = final_stats.fast_retransmissions,
        retransmit_ratio = final_stats.retransmit_ratio(),
        md5 = %digest,
        "transfer complete"
    );
    println!("{digest}  {}", args.input.display());

    Ok(())
}

fn read_up_to(file: &mut std::fs::File, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = file
            .read(&mut buf[total..])
            .context("reading input file")?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

fn ack_loop(
    sender: Arc<Mutex<Sender>>,
    stats: Arc<Mutex<SenderStats>>,
    socket: UdpSocket,
    channel: Channel,
    shutdown: Arc<AtomicBool>,
) {
    let mut rng = StdRng::from_os_rng();
    let mut buf = [0u8; 64];

    while !shutdown.load(Ordering::Relaxed) {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                warn!(error = %e, "ACK socket read failed");
                continue;
            }
        };

        let Some(packet) = codec::parse(&buf[..n]) else {
            continue; // short or checksum-mismatched, silently dropped
        };
        if !packet.is_ack() {
            continue;
        }

        let now = Instant::now();
        let outcome = sender.lock().unwrap().process_ack(packet.seq, now);
        match outcome {
            AckOutcome::NewAck { seq } => {
                debug!(seq, "new ack");
            }
            AckOutcome::DuplicateAck { seq } => {
                debug!(seq, "duplicate ack");
                stats.lock().unwrap().duplicate_acks += 1;
            }
            AckOutcome::FastRetransmit => {
                info!("fast retransmit triggered");
                let segments = sender.lock().unwrap().retransmit_window(now);
                for seg in &segments {
                    if let Err(e) = transmit(&socket, &channel, &mut rng, &seg.bytes) {
                        warn!(error = %e, seq = seg.seq, "fast retransmit send failed");
                    }
                }
                stats.lock().unwrap().fast_retransmissions += segments.len() as u64;
            }
        }
    }
}

fn timer_loop(
    sender: Arc<Mutex<Sender>>,
    stats: Arc<Mutex<SenderStats>>,
    socket: UdpSocket,
    channel: Channel,
    shutdown: Arc<AtomicBool>,
) {
    let mut rng = StdRng::from_os_rng();

    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(TIMER_TICK_INTERVAL);
        let now = Instant::now();
        let segments = sender.lock().unwrap().poll_timers(now);
        if segments.is_empty() {
            continue;
        }
        debug!(count = segments.len(), "timer-driven retransmission");
        for seg in &segments {
            if let Err(e) = transmit(&socket, &channel, &mut rng, &seg.bytes) {
                warn!(error = %e, seq = seg.seq, "timeout retransmit send failed");
            }
        }
        stats.lock().unwrap().timeout_retransmissions += segments.len() as u64;
    }
}
