pub mod error;
pub mod hashing;
pub mod keys;
pub mod recovery;

pub use error::CryptoError;
pub use hashing::{hash160, sha256, sha256d};
pub use keys::{
    decode_neo_address, encode_evm_address, evm_address_from_key, neo_address_from_key,
    InteropKey,
};
pub use recovery::{normalize_recovery_id, recover_public_key};
