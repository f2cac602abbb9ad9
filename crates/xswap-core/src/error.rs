/// Core errors: encoding, parsing, and store access.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unexpected trailing bytes: {0}")]
    TrailingBytes(usize),

    #[error("invalid swap status byte: {0}")]
    InvalidStatus(u8),

    #[error("amount overflow converting {amount} from {from} to {to} decimals")]
    AmountOverflow { amount: u128, from: u8, to: u8 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("list index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: u64, len: u64 },
}
