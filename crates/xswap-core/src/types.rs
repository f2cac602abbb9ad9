use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A 32-byte transaction or block hash, shared by the home chain and every
/// supported external chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash, used on the wire to mean "no hash".
    pub const NULL: Hash = Hash([0u8; 32]);

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHash(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = CoreError;

    /// Accepts plain or `0x`-prefixed hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| CoreError::InvalidHash(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Home-chain address: one kind byte followed by a 33-byte compressed
/// secp256k1 public key. Textual form is `P` + base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; Address::LENGTH]);

impl Address {
    pub const LENGTH: usize = 34;
    /// Kind byte of addresses derived from a user key.
    pub const USER_KIND: u8 = 1;

    /// Derive the home-chain address owned by a compressed public key.
    pub fn from_compressed_key(public_key: &[u8; 33]) -> Self {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[0] = Self::USER_KIND;
        bytes[1..].copy_from_slice(public_key);
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; Self::LENGTH] = bytes.try_into().map_err(|_| {
            CoreError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                Self::LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix('P')
            .ok_or_else(|| CoreError::InvalidAddress(format!("missing 'P' prefix: {}", s)))?;
        let bytes = bs58::decode(body)
            .into_vec()
            .map_err(|e| CoreError::InvalidAddress(format!("invalid base58: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An observed inbound transfer that has not been settled yet.
///
/// Lives only in memory; settlement progress is tracked by the durable
/// `.inprogress` / `.pending` / `.settled` records instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSwap {
    /// Source platform name.
    pub platform: String,
    /// Source transaction hash; unique key of the swap.
    pub hash: Hash,
    /// Sender address on the source chain.
    pub source: String,
    /// Receiver address on the home chain.
    pub destination: Address,
}

/// Fee-settlement lifecycle. `InProgress` is implicit before a
/// [`PendingFee`] exists and never stored in the fee list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapStatus {
    InProgress,
    Settle,
    Confirm,
    Finished,
}

impl SwapStatus {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::Settle => 1,
            Self::Confirm => 2,
            Self::Finished => 3,
        }
    }

    pub fn from_byte(value: u8) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::InProgress),
            1 => Ok(Self::Settle),
            2 => Ok(Self::Confirm),
            3 => Ok(Self::Finished),
            other => Err(CoreError::InvalidStatus(other)),
        }
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Settle => write!(f, "Settle"),
            Self::Confirm => write!(f, "Confirm"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

/// Durable record of a home-chain fee settlement that follows a verified
/// external payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFee {
    pub source_hash: Hash,
    /// Hash of the external payout.
    pub destination_hash: Hash,
    /// Destination platform of the payout.
    pub platform: String,
    /// Home-chain fee transaction, once submitted.
    pub settle_hash: Option<Hash>,
    /// Unix seconds of the last status change.
    pub time: u32,
    pub status: SwapStatus,
}

impl PendingFee {
    pub fn new(source_hash: Hash, destination_hash: Hash, platform: &str, time: u32) -> Self {
        Self {
            source_hash,
            destination_hash,
            platform: platform.to_string(),
            settle_hash: None,
            time,
            status: SwapStatus::Settle,
        }
    }
}

/// A single cross-chain transfer extracted from a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropTransfer {
    pub source_platform: String,
    pub source_address: String,
    pub destination_platform: String,
    pub destination_address: String,
    /// Node-controlled address that received (or sent) the funds.
    pub interop_address: String,
    pub symbol: String,
    /// Amount in home-chain decimals.
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropTransaction {
    pub hash: Hash,
    pub transfers: Vec<InteropTransfer>,
}

/// A decoded external block reduced to its interop-relevant transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropBlock {
    pub platform: String,
    pub chain: String,
    pub height: u64,
    pub hash: Hash,
    pub transactions: Vec<Hash>,
}

/// Interop addresses registered for one external platform on the home chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub name: String,
    /// Token symbol of the platform's native asset.
    pub native_symbol: String,
    /// External-chain interop addresses owned by the node.
    pub interop_addresses: Vec<String>,
}

impl PlatformInfo {
    pub fn owns(&self, address: &str) -> bool {
        self.interop_addresses
            .iter()
            .any(|a| a.eq_ignore_ascii_case(address))
    }
}

/// A swap as reported to API consumers. `destination_hash` is `None`
/// while the swap is unsettled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSwap {
    pub source_platform: String,
    pub source_hash: Hash,
    pub destination_platform: String,
    pub destination_hash: Option<Hash>,
}

/// Rescale `amount` from `from` decimals to `to` decimals.
///
/// Scaling down truncates the remainder.
pub fn convert_decimals(amount: u128, from: u8, to: u8) -> Result<u128, CoreError> {
    let overflow = || CoreError::AmountOverflow { amount, from, to };
    if to >= from {
        let factor = 10u128.checked_pow(u32::from(to - from)).ok_or_else(overflow)?;
        amount.checked_mul(factor).ok_or_else(overflow)
    } else {
        let factor = 10u128.checked_pow(u32::from(from - to)).ok_or_else(overflow)?;
        Ok(amount / factor)
    }
}

/// Current unix time in seconds, as stored in [`PendingFee::time`].
pub fn unix_now() -> u32 {
    u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX)
}
