use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::error::CryptoError;

/// Map an EVM `v` value to a recovery id.
///
/// Accepts raw parity (0/1), legacy 27/28 and EIP-155 values
/// (`chain_id * 2 + 35 + parity`).
pub fn normalize_recovery_id(v: u64) -> Result<RecoveryId, CryptoError> {
    let parity = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        v if v >= 35 => (v - 35) % 2,
        other => return Err(CryptoError::InvalidRecoveryId(other)),
    };
    RecoveryId::from_byte(parity as u8).ok_or(CryptoError::InvalidRecoveryId(v))
}

/// Recover the compressed public key that produced `(r, s, v)` over `prehash`.
pub fn recover_public_key(
    prehash: &[u8; 32],
    r: &[u8; 32],
    s: &[u8; 32],
    v: u64,
) -> Result<[u8; 33], CryptoError> {
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(r);
    rs[32..].copy_from_slice(s);
    let signature =
        Signature::from_slice(&rs).map_err(|e| CryptoError::Signature(e.to_string()))?;
    let recovery_id = normalize_recovery_id(v)?;

    let key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery_id)
        .map_err(|e| CryptoError::Signature(format!("recovery failed: {}", e)))?;

    let point = key.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::InteropKey;
    use crate::hashing::sha256;

    fn split(signature: &Signature) -> ([u8; 32], [u8; 32]) {
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        (r, s)
    }

    #[test]
    fn test_recover_matches_signer() {
        let key = InteropKey::generate();
        let digest = sha256(b"transfer 10 to interop");
        let (signature, recid) = key.sign_prehash_recoverable(&digest).unwrap();
        let (r, s) = split(&signature);

        let recovered = recover_public_key(&digest, &r, &s, recid.to_byte() as u64).unwrap();
        assert_eq!(recovered, key.public_key_compressed());
    }

    #[test]
    fn test_recover_with_eip155_v() {
        let key = InteropKey::generate();
        let digest = sha256(b"eip155");
        let (signature, recid) = key.sign_prehash_recoverable(&digest).unwrap();
        let (r, s) = split(&signature);
        let chain_id = 56u64;
        let v = chain_id * 2 + 35 + recid.to_byte() as u64;

        let recovered = recover_public_key(&digest, &r, &s, v).unwrap();
        assert_eq!(recovered, key.public_key_compressed());
    }

    #[test]
    fn test_wrong_digest_recovers_other_key() {
        let key = InteropKey::generate();
        let digest = sha256(b"original");
        let (signature, recid) = key.sign_prehash_recoverable(&digest).unwrap();
        let (r, s) = split(&signature);

        let other = sha256(b"tampered");
        match recover_public_key(&other, &r, &s, recid.to_byte() as u64) {
            Ok(pk) => assert_ne!(pk, key.public_key_compressed()),
            Err(_) => {}
        }
    }

    #[test]
    fn test_normalize_recovery_id() {
        assert_eq!(normalize_recovery_id(27).unwrap().to_byte(), 0);
        assert_eq!(normalize_recovery_id(28).unwrap().to_byte(), 1);
        assert_eq!(normalize_recovery_id(37).unwrap().to_byte(), 0);
        assert_eq!(normalize_recovery_id(38).unwrap().to_byte(), 1);
        assert!(matches!(
            normalize_recovery_id(30),
            Err(CryptoError::InvalidRecoveryId(30))
        ));
    }

    #[test]
    fn test_zero_signature_rejected() {
        let digest = sha256(b"x");
        assert!(recover_public_key(&digest, &[0u8; 32], &[0u8; 32], 0).is_err());
    }
}
