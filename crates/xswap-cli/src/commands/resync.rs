//! `xswap resync`: Re-process one block of an external platform.

use clap::Args;
use serde::Serialize;

use super::{fail, unreachable, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct ResyncArgs {
    /// External platform name.
    #[arg(short, long)]
    pub platform: String,

    /// Block height to re-process.
    #[arg(long)]
    pub height: u64,

    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Serialize)]
struct ResyncRequest<'a> {
    platform: &'a str,
    height: u64,
}

pub async fn run(args: &ResyncArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/resync", args.endpoint);
    let body = ResyncRequest {
        platform: &args.platform,
        height: args.height,
    };

    let client = reqwest::Client::new();
    match client.post(&url).json(&body).send().await {
        Ok(r) if r.status().is_success() => {
            println!("Block {} of {} queued for resync", args.height, args.platform);
        }
        Ok(r) => return Err(fail("resync", r).await),
        Err(e) => unreachable(&args.endpoint, e),
    }

    Ok(())
}
