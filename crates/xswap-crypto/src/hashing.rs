use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Double SHA-256, as used by base58check checksums.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160 of SHA-256: the account-chain script hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha256(data)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256d_differs_from_single() {
        assert_ne!(sha256d(b"xswap"), sha256(b"xswap"));
        assert_eq!(sha256d(b"xswap"), sha256(&sha256(b"xswap")));
    }

    #[test]
    fn test_hash160_length_and_determinism() {
        let a = hash160(b"script");
        let b = hash160(b"script");
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }
}
