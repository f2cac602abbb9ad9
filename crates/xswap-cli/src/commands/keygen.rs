//! `xswap keygen`: Generate a key, or show the addresses of an existing one.

use clap::Args;

use xswap_crypto::{encode_evm_address, InteropKey};

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Existing secret (hex or WIF) to inspect instead of generating one.
    #[arg(long)]
    pub secret: Option<String>,
}

pub fn run(args: &KeygenArgs) -> anyhow::Result<()> {
    let key = match &args.secret {
        Some(secret) => InteropKey::parse(secret)?,
        None => InteropKey::generate(),
    };

    if args.secret.is_none() {
        println!("Secret (hex):  {}", hex::encode(*key.secret_bytes()));
        println!("Secret (WIF):  {}", key.to_wif());
    }
    println!("Public key:    {}", hex::encode(key.public_key_compressed()));
    println!("Home address:  {}", key.home_address());
    println!("EVM address:   {}", encode_evm_address(&key.evm_address()));
    println!("NEO address:   {}", key.neo_address());
    Ok(())
}
