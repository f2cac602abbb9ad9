//! xswap CLI: operator interface for a running swap-settlement node.
//!
//! Subcommands: init, keygen, status, pending, resync, settle.

mod commands;

use clap::{Parser, Subcommand};

/// xswap: cross-chain swap settlement.
#[derive(Parser, Debug)]
#[command(name = "xswap", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a node configuration with freshly generated keys.
    Init(commands::init::InitArgs),
    /// Generate a key and print its addresses on every chain.
    Keygen(commands::keygen::KeygenArgs),
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
    /// List unsettled swaps for a home-chain address.
    Pending(commands::pending::PendingArgs),
    /// Re-process one block of an external platform.
    Resync(commands::resync::ResyncArgs),
    /// Settle a swap by its source transaction hash.
    Settle(commands::settle::SettleArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Keygen(args) => commands::keygen::run(args),
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Pending(args) => commands::pending::run(args).await,
        Commands::Resync(args) => commands::resync::run(args).await,
        Commands::Settle(args) => commands::settle::run(args).await,
    }
}
