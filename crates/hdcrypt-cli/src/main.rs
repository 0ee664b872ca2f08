//! hdcrypt binary.
//!
//! # Usage
//!
//! ```bash
//! export HDCRYPT_LOCAL_KEY=xprv...   # ours
//! export HDCRYPT_REMOTE_KEY=xpub...  # peer's
//!
//! # Encrypt with time-based paths
//! hdcrypt encrypt --time-base "hello" > envelope.json
//!
//! # Peer decrypts, rejecting anything older than a minute
//! hdcrypt decrypt --expiry-ms 60000 < envelope.json
//! ```

use clap::Parser;
use hdcrypt_cli::{Command, run};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// HD-key derived per-message encryption
#[derive(Parser, Debug)]
#[command(name = "hdcrypt")]
#[command(about = "Per-message encryption from BIP32 extended keys")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    run(args.command, &mut std::io::stdin().lock(), &mut std::io::stdout().lock())?;

    Ok(())
}
