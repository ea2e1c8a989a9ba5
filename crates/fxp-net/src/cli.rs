//! Command-line surface for the two binaries, matching `strata-agent`'s
//! `clap` derive style (spec.md §6, refined by SPEC_FULL.md §5.3).

use clap::{Parser, ValueEnum};
use fxp_transport::sender::Mode as TransportMode;

/// ARQ mode shared by both binaries. Both peers must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Gbn,
    Sr,
}

impl From<ModeArg> for TransportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Gbn => TransportMode::Gbn,
            ModeArg::Sr => TransportMode::Sr,
        }
    }
}

/// Reliable file sender over a simulated lossy/corrupting UDP channel.
#[derive(Parser, Debug)]
#[command(name = "fxp-sender", about = "Reliable file sender over simulated lossy UDP")]
pub struct SenderArgs {
    /// ARQ mode; must match the receiver.
    #[arg(long, value_enum)]
    pub mode: ModeArg,

    /// Receiver host or IP address.
    #[arg(long)]
    pub host: String,

    /// Receiver UDP port.
    #[arg(long)]
    pub port: u16,

    /// Path to the local file to transfer.
    #[arg(long)]
    pub input: std::path::PathBuf,

    /// Maximum segment size in bytes.
    #[arg(long)]
    pub mss: usize,

    /// Initial congestion window (or the fixed window size when
    /// `--no-congestion-control` is passed).
    #[arg(long)]
    pub window: f64,

    /// Sender-side packet loss probability, in `[0, 1]`.
    #[arg(long, default_value_t = 0.0)]
    pub loss: f64,

    /// Sender-side single-bit corruption probability, in `[0, 1]`.
    #[arg(long, default_value_t = 0.0)]
    pub corrupt: f64,

    /// Enable the Vegas-style delay penalty alongside Reno.
    #[arg(long, default_value_t = false)]
    pub vegas: bool,

    /// Disable the Reno congestion controller, recovering the reference
    /// implementation's fixed-window GBN client (SPEC_FULL.md §5.5).
    #[arg(long, default_value_t = false)]
    pub no_congestion_control: bool,
}

/// Reliable file receiver reassembling a transfer sent by `fxp-sender`.
#[derive(Parser, Debug)]
#[command(name = "fxp-receiver", about = "Reliable file receiver for fxp-sender transfers")]
pub struct ReceiverArgs {
    /// ARQ mode; must match the sender.
    #[arg(long, value_enum)]
    pub mode: ModeArg,

    /// UDP port to listen on (binds `0.0.0.0:<port>`).
    #[arg(long)]
    pub port: u16,

    /// Path to write the reassembled file to (created/truncated).
    #[arg(long)]
    pub output: std::path::PathBuf,

    /// Maximum segment size in bytes; only used to size the receive buffer.
    #[arg(long)]
    pub mss: usize,
}
