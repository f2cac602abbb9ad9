/// Key handling and signature recovery errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid secret key: {0}")]
    InvalidSecret(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u64),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
