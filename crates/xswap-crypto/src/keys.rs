use alloy_primitives::{keccak256, Address as EvmAddress};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, Zeroizing};

use xswap_core::Address;

use crate::error::CryptoError;
use crate::hashing::{hash160, sha256d};

/// Version byte of account-chain (NEO) addresses.
const NEO_ADDRESS_VERSION: u8 = 0x17;
/// `PUSHBYTES33`, followed by the key and `CHECKSIG`.
const NEO_PUSH_KEY: u8 = 0x21;
const NEO_CHECKSIG: u8 = 0xac;
/// WIF framing: version prefix and compressed-key suffix.
const WIF_VERSION: u8 = 0x80;
const WIF_COMPRESSED: u8 = 0x01;

/// secp256k1 secret controlling an interop address.
///
/// The same key yields the home-chain address, the EVM address and the
/// account-chain address; watchers compare these against the addresses the
/// home chain has registered for each platform. Secret material is zeroized
/// on drop by `k256`.
pub struct InteropKey {
    signing_key: SigningKey,
}

impl InteropKey {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a key from a raw 32-byte secret.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidSecret(e.to_string()))?;
        Ok(Self { signing_key })
    }

    /// Parse a hex secret, with or without `0x`.
    pub fn from_hex(secret: &str) -> Result<Self, CryptoError> {
        let trimmed = secret.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(trimmed).map_err(|e| CryptoError::InvalidInput(format!("invalid hex: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Parse a compressed-key WIF (`0x80 ++ secret ++ 0x01 ++ checksum`).
    pub fn from_wif(wif: &str) -> Result<Self, CryptoError> {
        let mut raw = bs58::decode(wif.trim())
            .into_vec()
            .map_err(|e| CryptoError::InvalidInput(format!("invalid base58: {}", e)))?;
        let result = Self::from_wif_bytes(&raw);
        raw.zeroize();
        result
    }

    fn from_wif_bytes(raw: &[u8]) -> Result<Self, CryptoError> {
        if raw.len() != 38 || raw[0] != WIF_VERSION || raw[33] != WIF_COMPRESSED {
            return Err(CryptoError::InvalidSecret("malformed WIF".into()));
        }
        let checksum = sha256d(&raw[..34]);
        if checksum[..4] != raw[34..] {
            return Err(CryptoError::InvalidSecret("WIF checksum mismatch".into()));
        }
        Self::from_bytes(&raw[1..33])
    }

    /// Accept either encoding used in configuration files.
    pub fn parse(secret: &str) -> Result<Self, CryptoError> {
        let trimmed = secret.trim();
        let is_hex = trimmed
            .strip_prefix("0x")
            .unwrap_or(trimmed)
            .chars()
            .all(|c| c.is_ascii_hexdigit());
        if is_hex {
            Self::from_hex(trimmed)
        } else {
            Self::from_wif(trimmed)
        }
    }

    pub fn to_wif(&self) -> String {
        let mut raw = Zeroizing::new(Vec::with_capacity(38));
        raw.push(WIF_VERSION);
        raw.extend_from_slice(&self.secret_bytes()[..]);
        raw.push(WIF_COMPRESSED);
        let checksum = sha256d(&raw);
        raw.extend_from_slice(&checksum[..4]);
        bs58::encode(&raw[..]).into_string()
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// SEC1 compressed public key (33 bytes).
    pub fn public_key_compressed(&self) -> [u8; 33] {
        let point = self.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// SEC1 uncompressed public key (65 bytes, `0x04` prefix).
    pub fn public_key_uncompressed(&self) -> [u8; 65] {
        let point = self.verifying_key().to_encoded_point(false);
        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn home_address(&self) -> Address {
        Address::from_compressed_key(&self.public_key_compressed())
    }

    pub fn evm_address(&self) -> EvmAddress {
        evm_address_from_uncompressed(&self.public_key_uncompressed())
    }

    pub fn neo_address(&self) -> String {
        neo_address_from_compressed(&self.public_key_compressed())
    }

    /// Sign a 32-byte digest, returning the signature and recovery id.
    pub fn sign_prehash_recoverable(
        &self,
        prehash: &[u8; 32],
    ) -> Result<(Signature, RecoveryId), CryptoError> {
        self.signing_key
            .sign_prehash_recoverable(prehash)
            .map_err(|e| CryptoError::Signature(e.to_string()))
    }
}

impl std::fmt::Debug for InteropKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteropKey")
            .field("address", &self.home_address())
            .finish_non_exhaustive()
    }
}

fn evm_address_from_uncompressed(uncompressed: &[u8; 65]) -> EvmAddress {
    let digest = keccak256(&uncompressed[1..]);
    EvmAddress::from_slice(&digest[12..])
}

fn neo_address_from_compressed(compressed: &[u8; 33]) -> String {
    let mut script = Vec::with_capacity(35);
    script.push(NEO_PUSH_KEY);
    script.extend_from_slice(compressed);
    script.push(NEO_CHECKSIG);

    let mut payload = Vec::with_capacity(25);
    payload.push(NEO_ADDRESS_VERSION);
    payload.extend_from_slice(&hash160(&script));
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum[..4]);
    bs58::encode(payload).into_string()
}

fn parse_public_key(key: &[u8]) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_sec1_bytes(key).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// EVM address of a SEC1 public key (either encoding).
pub fn evm_address_from_key(key: &[u8]) -> Result<EvmAddress, CryptoError> {
    let point = parse_public_key(key)?.to_encoded_point(false);
    let mut uncompressed = [0u8; 65];
    uncompressed.copy_from_slice(point.as_bytes());
    Ok(evm_address_from_uncompressed(&uncompressed))
}

/// Account-chain address of a SEC1 public key (either encoding).
pub fn neo_address_from_key(key: &[u8]) -> Result<String, CryptoError> {
    let point = parse_public_key(key)?.to_encoded_point(true);
    let mut compressed = [0u8; 33];
    compressed.copy_from_slice(point.as_bytes());
    Ok(neo_address_from_compressed(&compressed))
}

/// Lowercase `0x`-prefixed text form used in interop transfers.
pub fn encode_evm_address(address: &EvmAddress) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Validate an account-chain address and return its script hash.
pub fn decode_neo_address(address: &str) -> Result<[u8; 20], CryptoError> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|e| CryptoError::InvalidAddress(format!("invalid base58: {}", e)))?;
    if raw.len() != 25 || raw[0] != NEO_ADDRESS_VERSION {
        return Err(CryptoError::InvalidAddress(address.to_string()));
    }
    let checksum = sha256d(&raw[..21]);
    if checksum[..4] != raw[21..] {
        return Err(CryptoError::InvalidAddress(format!("bad checksum: {}", address)));
    }
    let mut script_hash = [0u8; 20];
    script_hash.copy_from_slice(&raw[1..21]);
    Ok(script_hash)
}
