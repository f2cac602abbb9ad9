//! `xswap status`: Query the status of a running xswap node.

use clap::Args;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{fail, unreachable, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    ready: bool,
    home_platform: String,
    platforms: BTreeMap<String, String>,
    polling: Vec<String>,
    discovered: usize,
    in_progress: usize,
    pending_fees: u64,
}

pub async fn run(args: &StatusArgs) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/status", args.endpoint);

    match reqwest::get(&url).await {
        Ok(r) if r.status().is_success() => {
            let status: StatusResponse = r.json().await?;
            println!("Node Status:");
            println!("  Version:      {}", status.version);
            println!("  Uptime:       {}s", status.uptime_secs);
            println!("  Ready:        {}", status.ready);
            println!("  Home:         {}", status.home_platform);
            println!("  Discovered:   {}", status.discovered);
            println!("  In progress:  {}", status.in_progress);
            println!("  Pending fees: {}", status.pending_fees);
            if status.platforms.is_empty() {
                println!("  Platforms:    (none)");
            }
            for (name, address) in &status.platforms {
                let polling = if status.polling.contains(name) { " (polling)" } else { "" };
                println!("  Platform:     {} {}{}", name, address, polling);
            }
        }
        Ok(r) => return Err(fail("status", r).await),
        Err(e) => unreachable(&args.endpoint, e),
    }

    Ok(())
}
