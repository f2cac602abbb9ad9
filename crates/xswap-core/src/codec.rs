//! Deterministic binary codec for durable keys and values.
//!
//! Layout rules: hashes are fixed 32 bytes, integers are little-endian,
//! strings carry a u32 length prefix, enum status is one byte, and
//! timestamps are u32 seconds. An empty string stands for a null string.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::CoreError;
use crate::types::{
    Address, Hash, InteropBlock, InteropTransaction, InteropTransfer, PendingFee, SwapStatus,
};

/// Types that can be written to and read from the durable store.
pub trait StoreCodec: Sized {
    fn encode(&self, buf: &mut BytesMut);

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }

    /// Decode a complete value; leftover bytes are an error.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut cursor = bytes;
        let value = Self::decode(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(CoreError::TrailingBytes(cursor.len()));
        }
        Ok(value)
    }
}

fn need(buf: &&[u8], len: usize, what: &str) -> Result<(), CoreError> {
    if buf.remaining() < len {
        return Err(CoreError::Decode(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(())
}

impl StoreCodec for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        need(buf, 4, "u32")?;
        Ok(buf.get_u32_le())
    }
}

impl StoreCodec for u64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        need(buf, 8, "u64")?;
        Ok(buf.get_u64_le())
    }
}

impl StoreCodec for u128 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u128_le(*self);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        need(buf, 16, "u128")?;
        Ok(buf.get_u128_le())
    }
}

impl StoreCodec for String {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.len() as u32);
        buf.put_slice(self.as_bytes());
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        let len = u32::decode(buf)? as usize;
        need(buf, len, "string")?;
        let mut raw = vec![0u8; len];
        buf.copy_to_slice(&mut raw);
        String::from_utf8(raw).map_err(|e| CoreError::Decode(format!("invalid utf-8: {}", e)))
    }
}

impl StoreCodec for Option<String> {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Some(s) => s.encode(buf),
            None => buf.put_u32_le(0),
        }
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        let s = String::decode(buf)?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }
}

impl StoreCodec for Hash {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.0);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        need(buf, 32, "hash")?;
        let mut raw = [0u8; 32];
        buf.copy_to_slice(&mut raw);
        Ok(Hash(raw))
    }
}

impl StoreCodec for Address {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.0);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        need(buf, Address::LENGTH, "address")?;
        let mut raw = [0u8; Address::LENGTH];
        buf.copy_to_slice(&mut raw);
        Ok(Address(raw))
    }
}

impl StoreCodec for SwapStatus {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.to_byte());
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        need(buf, 1, "status")?;
        SwapStatus::from_byte(buf.get_u8())
    }
}

impl<T: StoreCodec> StoreCodec for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.len() as u32);
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        let count = u32::decode(buf)? as usize;
        // Cap the preallocation; a corrupt count must not exhaust memory.
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(T::decode(buf)?);
        }
        Ok(items)
    }
}

impl<A: StoreCodec, B: StoreCodec> StoreCodec for (A, B) {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf);
        self.1.encode(buf);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        Ok((A::decode(buf)?, B::decode(buf)?))
    }
}

impl StoreCodec for PendingFee {
    fn encode(&self, buf: &mut BytesMut) {
        self.source_hash.encode(buf);
        self.destination_hash.encode(buf);
        self.settle_hash.unwrap_or(Hash::NULL).encode(buf);
        self.platform.encode(buf);
        self.time.encode(buf);
        self.status.encode(buf);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        let source_hash = Hash::decode(buf)?;
        let destination_hash = Hash::decode(buf)?;
        let settle_hash = Hash::decode(buf)?;
        Ok(Self {
            source_hash,
            destination_hash,
            settle_hash: (!settle_hash.is_null()).then_some(settle_hash),
            platform: String::decode(buf)?,
            time: u32::decode(buf)?,
            status: SwapStatus::decode(buf)?,
        })
    }
}

impl StoreCodec for InteropTransfer {
    fn encode(&self, buf: &mut BytesMut) {
        self.source_platform.encode(buf);
        self.source_address.encode(buf);
        self.destination_platform.encode(buf);
        self.destination_address.encode(buf);
        self.interop_address.encode(buf);
        self.symbol.encode(buf);
        self.amount.encode(buf);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        Ok(Self {
            source_platform: String::decode(buf)?,
            source_address: String::decode(buf)?,
            destination_platform: String::decode(buf)?,
            destination_address: String::decode(buf)?,
            interop_address: String::decode(buf)?,
            symbol: String::decode(buf)?,
            amount: u128::decode(buf)?,
        })
    }
}

impl StoreCodec for InteropTransaction {
    fn encode(&self, buf: &mut BytesMut) {
        self.hash.encode(buf);
        self.transfers.encode(buf);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        Ok(Self {
            hash: Hash::decode(buf)?,
            transfers: Vec::decode(buf)?,
        })
    }
}

impl StoreCodec for InteropBlock {
    fn encode(&self, buf: &mut BytesMut) {
        self.platform.encode(buf);
        self.chain.encode(buf);
        self.height.encode(buf);
        self.hash.encode(buf);
        self.transactions.encode(buf);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, CoreError> {
        Ok(Self {
            platform: String::decode(buf)?,
            chain: String::decode(buf)?,
            height: u64::decode(buf)?,
            hash: Hash::decode(buf)?,
            transactions: Vec::decode(buf)?,
        })
    }
}
