//! xswap node entry point.
//!
//! Starts the swap-settlement node with configuration from a TOML file.

mod api;
mod config;
mod node;
mod rpc;
mod storage;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::XswapConfig;
use node::XswapNode;

/// xswap swap-settlement node
#[derive(Parser, Debug)]
#[command(name = "xswap-node", version, about = "xswap swap-settlement node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "xswap.toml")]
    config: PathBuf,

    /// Override the API port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a config file with fresh keys and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init {
        init_tracing(args.log_level.as_deref().unwrap_or("info"), "text");
        if args.config.exists() {
            anyhow::bail!("{} already exists", args.config.display());
        }
        XswapConfig::generate().save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote config with generated keys");
        return Ok(());
    }

    let mut config = XswapConfig::load(&args.config)?;

    if let Some(api_port) = args.api_port {
        config.api.port = api_port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level, &config.logging.format);
    tracing::info!("xswap node v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    let node = XswapNode::new(config)?;
    node.start_api()?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            result?;
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    tracing::info!("xswap node exited cleanly");
    Ok(())
}
