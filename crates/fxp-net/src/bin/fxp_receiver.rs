use clap::Parser;
use fxp_net::cli::ReceiverArgs;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ReceiverArgs::parse();
    fxp_net::receiver::run(args)
}
