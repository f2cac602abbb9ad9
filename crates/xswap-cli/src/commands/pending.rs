//! `xswap pending`: List unsettled swaps for a home-chain address.

use clap::Args;
use serde::Deserialize;

use xswap_core::{Address, ChainSwap};

use super::{fail, unreachable, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Home-chain address receiving the swaps.
    pub address: Address,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct PendingSwapsResponse {
    swaps: Vec<ChainSwap>,
    count: usize,
}

pub async fn run(args: &PendingArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/swaps/{}", args.endpoint, args.address);

    match reqwest::get(&url).await {
        Ok(r) if r.status().is_success() => {
            let data: PendingSwapsResponse = r.json().await?;
            if data.count == 0 {
                println!("No pending swaps for {}", args.address);
                return Ok(());
            }
            println!("{} pending swap(s) for {}:", data.count, args.address);
            for swap in &data.swaps {
                println!(
                    "  {} -> {}  {}",
                    swap.source_platform, swap.destination_platform, swap.source_hash
                );
            }
        }
        Ok(r) => return Err(fail("pending swaps lookup", r).await),
        Err(e) => unreachable(&args.endpoint, e),
    }

    Ok(())
}
