use clap::Parser;
use fxp_net::cli::SenderArgs;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = SenderArgs::parse();
    fxp_net::sender::run(args)
}
