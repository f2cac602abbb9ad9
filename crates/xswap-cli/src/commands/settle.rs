//! `xswap settle`: Settle a swap by its source transaction hash.

use clap::Args;
use serde::{Deserialize, Serialize};

use xswap_core::Hash;

use super::{fail, unreachable, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct SettleArgs {
    /// Source transaction hash.
    pub hash: Hash,

    /// Platform the swap originates from.
    #[arg(short, long)]
    pub source: String,

    /// Platform receiving the funds.
    #[arg(short, long, default_value = "nexus")]
    pub destination: String,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Serialize)]
struct SettleRequest {
    source_platform: String,
    destination_platform: String,
    hash: String,
}

#[derive(Deserialize)]
struct SettleResponse {
    hash: Hash,
    settlement: Option<Hash>,
}

pub async fn run(args: &SettleArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/settle", args.endpoint);
    let body = SettleRequest {
        source_platform: args.source.clone(),
        destination_platform: args.destination.clone(),
        hash: args.hash.to_string(),
    };

    let client = reqwest::Client::new();
    match client.post(&url).json(&body).send().await {
        Ok(r) if r.status().is_success() => {
            let data: SettleResponse = r.json().await?;
            match data.settlement {
                Some(settlement) => {
                    println!("Swap settled!");
                    println!("  Source:      {}", data.hash);
                    println!("  Settlement:  {}", settlement);
                }
                None => {
                    println!("Swap {} is being processed.", data.hash);
                    println!("Check progress with: xswap status");
                }
            }
        }
        Ok(r) => return Err(fail("settlement", r).await),
        Err(e) => unreachable(&args.endpoint, e),
    }

    Ok(())
}
