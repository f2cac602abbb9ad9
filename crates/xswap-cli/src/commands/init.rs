//! `xswap init`: Initialize a new xswap node configuration.

use clap::Args;
use std::path::{Path, PathBuf};

use xswap_crypto::{encode_evm_address, InteropKey};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory).
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

fn secret_hex(key: &InteropKey) -> String {
    hex::encode(*key.secret_bytes())
}

fn render_config(swapper: &InteropKey, eth: &InteropKey, neo: &InteropKey) -> String {
    format!(
        r#"# xswap Node Configuration

[node]
rpc_url = "http://127.0.0.1:7077/rpc"
swapper_secret = "{swapper}"

[storage]
data_dir = "./data"

[api]
listen_addr = "127.0.0.1"
port = 7090

[logging]
level = "info"
format = "text"

[swapper]
home_platform = "nexus"
update_interval_ms = 5000
settle_delay_secs = 60
blocks_per_update = 50

[[platforms]]
name = "ethereum"
kind = "evm"
rpc_urls = ["http://127.0.0.1:8545"]
interop_secret = "{eth}"
chain_id = 1
native_symbol = "ETH"

[[platforms]]
name = "neo"
kind = "neo"
rpc_urls = ["http://127.0.0.1:10332"]
interop_secret = "{neo}"
"#,
        swapper = secret_hex(swapper),
        eth = secret_hex(eth),
        neo = secret_hex(neo),
    )
}

pub fn write_config(dir: &Path) -> anyhow::Result<PathBuf> {
    let config_path = dir.join("xswap.toml");
    if config_path.exists() {
        anyhow::bail!("configuration file already exists at {}", config_path.display());
    }
    std::fs::create_dir_all(dir)?;

    let swapper = InteropKey::generate();
    let eth = InteropKey::generate();
    let neo = InteropKey::generate();
    std::fs::write(&config_path, render_config(&swapper, &eth, &neo))?;

    println!("Initialized xswap node at {}", config_path.display());
    println!("  Swapper address:   {}", swapper.home_address());
    println!("  ethereum interop:  {}", encode_evm_address(&eth.evm_address()));
    println!("  neo interop:       {}", neo.neo_address());
    println!("Register the interop addresses on the home chain, then run 'xswap-node'.");

    std::fs::create_dir_all(dir.join("data"))?;
    Ok(config_path)
}

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    write_config(&args.dir).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("xswap-init-{}", rand::random::<u64>()))
    }

    #[test]
    fn test_init_writes_parseable_config() {
        let dir = temp_dir();
        let path = write_config(&dir).unwrap();

        let parsed: toml::Value = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let secret = parsed["node"]["swapper_secret"].as_str().unwrap();
        assert!(InteropKey::parse(secret).is_ok());
        let platforms = parsed["platforms"].as_array().unwrap();
        assert_eq!(platforms.len(), 2);
        assert_ne!(platforms[0]["interop_secret"], platforms[1]["interop_secret"]);
        assert!(dir.join("data").is_dir());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = temp_dir();
        write_config(&dir).unwrap();
        assert!(write_config(&dir).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
