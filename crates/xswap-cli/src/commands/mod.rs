pub mod init;
pub mod keygen;
pub mod pending;
pub mod resync;
pub mod settle;
pub mod status;

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:7090";

#[derive(Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Turn a non-success response into an error carrying the node's message.
pub async fn fail(action: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(err) => anyhow::anyhow!("{} failed (HTTP {}): {}", action, status, err.error),
        Err(_) => anyhow::anyhow!("{} failed (HTTP {})", action, status),
    }
}

pub fn unreachable(endpoint: &str, e: reqwest::Error) {
    println!("Could not reach node at {}", endpoint);
    println!("  Error: {}", e);
    println!();
    println!("Is the node running? Start it with: xswap-node");
}
