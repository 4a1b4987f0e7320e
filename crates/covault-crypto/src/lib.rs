//! Crypto primitives for covault.
//!
//! One random data-encryption key (DEK) protects every stored record.
//! The DEK itself is only ever persisted wrapped under a key-encryption
//! key (KEK) derived from a passphrase or machine secret via Argon2id.

use chacha20poly1305::{aead::Aead, KeyInit};
use rand_core::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// Key-encryption key derived from a passphrase or machine secret.
#[derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct Kek(Zeroizing<[u8; 32]>);

impl Kek {
    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum KdfError {
    #[error("invalid kdf parameters")]
    InvalidParams(argon2::Error),
    #[error("key derivation failed")]
    DerivationFailed(argon2::Error),
}

const MIB: u32 = 1024;
const MEMORY_COST_KIB: u32 = 64 * MIB;

fn argon2id() -> Result<argon2::Argon2<'static>, KdfError> {
    let params =
        argon2::Params::new(MEMORY_COST_KIB, 3, 1, Some(32)).map_err(KdfError::InvalidParams)?;
    Ok(argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Derive a KEK from a secret (passphrase bytes or machine secret) and salt.
pub fn derive_kek(secret: &[u8], salt: &[u8]) -> Result<Kek, KdfError> {
    let mut key = Zeroizing::new([0u8; 32]);

    argon2id()?
        .hash_password_into(secret, salt, key.as_mut())
        .map_err(KdfError::DerivationFailed)?;

    Ok(Kek(key))
}

/// Hash data using Argon2id with a salt. Returns hex-encoded 32-byte hash.
///
/// Used as the stored password verifier: deterministic for the same
/// input and salt, and never reveals the password itself.
pub fn verifier_hash(data: &[u8], salt: &[u8]) -> Result<String, KdfError> {
    let mut hash = Zeroizing::new([0u8; 32]);

    argon2id()?
        .hash_password_into(data, salt, hash.as_mut())
        .map_err(KdfError::DerivationFailed)?;

    Ok(hex::encode(hash.as_ref()))
}

/// Check `data` against a stored verifier hash in constant time.
pub fn verify_hash(data: &[u8], salt: &[u8], expected_hex: &str) -> Result<bool, KdfError> {
    let computed = verifier_hash(data, salt)?;
    Ok(computed
        .as_bytes()
        .ct_eq(expected_hex.as_bytes())
        .into())
}

/// Data-encryption key. Zeroed from memory on drop.
#[derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct Dek(Zeroizing<[u8; 32]>);

impl Dek {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, &'static str> {
        if bytes.len() != 32 {
            return Err("dek must be 32 bytes");
        }
        let mut array = [0u8; 32];
        array.copy_from_slice(bytes);
        Ok(Dek(Zeroizing::new(array)))
    }
}

/// Generate a fresh random DEK.
pub fn generate_dek() -> Dek {
    let mut key = Zeroizing::new([0u8; 32]);
    rand_core::OsRng.fill_bytes(key.as_mut());
    Dek(key)
}

/// Generate a random KDF salt.
pub fn generate_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    rand_core::OsRng.fill_bytes(&mut salt);
    salt
}

pub struct Nonce(pub [u8; 24]);

impl Nonce {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, &'static str> {
        if bytes.len() != 24 {
            return Err("nonce must be 24 bytes");
        }
        let mut array = [0u8; 24];
        array.copy_from_slice(bytes);
        Ok(Nonce(array))
    }
}

pub struct Ciphertext(pub Vec<u8>);

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("AEAD encryption failed")]
    AeadFailed(chacha20poly1305::aead::Error),
}

/// AEAD encrypt under the DEK. The AAD binds the ciphertext to its
/// storage location so a blob moved to a different key fails to decrypt.
pub fn encrypt(
    plaintext: &[u8],
    dek: &Dek,
    aad: &[u8],
) -> Result<(Nonce, Ciphertext), EncryptError> {
    let key = chacha20poly1305::Key::from(*dek.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&key);

    let mut nonce_bytes = [0u8; 24];
    rand_core::OsRng.fill_bytes(&mut nonce_bytes);

    let nonce = chacha20poly1305::XNonce::from(nonce_bytes);
    let ct = cipher
        .encrypt(
            &nonce,
            chacha20poly1305::aead::Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(EncryptError::AeadFailed)?;

    Ok((Nonce(nonce_bytes), Ciphertext(ct)))
}

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("AEAD decryption failed")]
    AeadFailed(chacha20poly1305::aead::Error),
}

/// AEAD decrypt. Any tampering with ciphertext, nonce, or AAD fails here.
pub fn decrypt(
    ciphertext: &[u8],
    nonce: &Nonce,
    dek: &Dek,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let key = chacha20poly1305::Key::from(*dek.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&key);

    let nonce = chacha20poly1305::XNonce::from(nonce.0);

    let pt = cipher
        .decrypt(
            &nonce,
            chacha20poly1305::aead::Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(DecryptError::AeadFailed)?;

    Ok(Zeroizing::new(pt))
}

#[derive(Debug, Error)]
pub enum WrapError {
    #[error("AEAD encryption failed")]
    AeadFailed(chacha20poly1305::aead::Error),
}

/// Wrap the DEK under a KEK for persistence.
pub fn wrap_dek(dek: &Dek, kek: &Kek, aad: &[u8]) -> Result<(Nonce, Ciphertext), WrapError> {
    let cipher_key = chacha20poly1305::Key::from(*kek.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&cipher_key);

    let mut nonce_bytes = [0u8; 24];
    rand_core::OsRng.fill_bytes(&mut nonce_bytes);

    let nonce = chacha20poly1305::XNonce::from(nonce_bytes);
    let ct = cipher
        .encrypt(
            &nonce,
            chacha20poly1305::aead::Payload {
                msg: dek.as_bytes(),
                aad,
            },
        )
        .map_err(WrapError::AeadFailed)?;

    Ok((Nonce(nonce_bytes), Ciphertext(ct)))
}

#[derive(Debug, Error)]
pub enum UnwrapError {
    #[error("AEAD decryption failed")]
    AeadFailed(chacha20poly1305::aead::Error),
    #[error("unwrapped key has wrong length")]
    BadLength,
}

/// Unwrap a persisted DEK with the KEK it was wrapped under.
pub fn unwrap_dek(
    wrapped: &[u8],
    nonce: &Nonce,
    kek: &Kek,
    aad: &[u8],
) -> Result<Dek, UnwrapError> {
    let cipher_key = chacha20poly1305::Key::from(*kek.as_bytes());
    let cipher = chacha20poly1305::XChaCha20Poly1305::new(&cipher_key);

    let nonce = chacha20poly1305::XNonce::from(nonce.0);

    let pt = cipher
        .decrypt(
            &nonce,
            chacha20poly1305::aead::Payload { msg: wrapped, aad },
        )
        .map_err(UnwrapError::AeadFailed)?;

    let pt = Zeroizing::new(pt);
    Dek::from_slice(&pt).map_err(|_| UnwrapError::BadLength)
}

/// Hash data with SHA256 (machine identifier digests, etc.)
pub fn hash_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_round_trip_basic() {
        let dek = generate_dek();

        let plaintext = b"personal-data";
        let aad = b"cv:3f6c1a2e";

        let (nonce, ct) = encrypt(plaintext, &dek, aad).unwrap();
        let decrypted = decrypt(&ct.0, &nonce, &dek, aad).unwrap();

        assert_eq!(plaintext, &decrypted[..]);
    }

    #[test]
    fn tampering_ciphertext_fails() {
        let dek = generate_dek();
        let (nonce, mut ct) = encrypt(b"hello", &dek, b"aad").unwrap();

        // flip a bit
        ct.0[0] ^= 0x01;

        assert!(decrypt(&ct.0, &nonce, &dek, b"aad").is_err());
    }

    #[test]
    fn tampering_nonce_fails() {
        let dek = generate_dek();
        let (nonce, ct) = encrypt(b"hello", &dek, b"aad").unwrap();

        let mut bad_nonce = nonce;
        bad_nonce.0[0] ^= 0x01;

        assert!(decrypt(&ct.0, &bad_nonce, &dek, b"aad").is_err());
    }

    #[test]
    fn tampering_aad_fails() {
        let dek = generate_dek();
        let (nonce, ct) = encrypt(b"hello", &dek, b"good-aad").unwrap();

        assert!(decrypt(&ct.0, &nonce, &dek, b"bad-aad").is_err());
    }

    #[test]
    fn empty_plaintext_ok() {
        let dek = generate_dek();
        let (nonce, ct) = encrypt(b"", &dek, b"aad").unwrap();
        let dec = decrypt(&ct.0, &nonce, &dek, b"aad").unwrap();
        assert_eq!(dec.len(), 0);
    }

    #[test]
    fn kdf_fails_on_short_salt() {
        assert!(derive_kek(b"pwd", b"short").is_err());
    }

    #[test]
    fn dek_wrap_unwrap_roundtrip() {
        let dek = generate_dek();
        let kek = derive_kek(b"master password", &generate_salt()).unwrap();
        let aad = b"covault:dek";

        let (nonce, wrapped) = wrap_dek(&dek, &kek, aad).unwrap();
        let unwrapped = unwrap_dek(&wrapped.0, &nonce, &kek, aad).unwrap();

        assert_eq!(unwrapped.as_bytes(), dek.as_bytes());
    }

    #[test]
    fn dek_unwrap_fails_with_wrong_kek() {
        let dek = generate_dek();
        let salt = generate_salt();
        let kek = derive_kek(b"right password", &salt).unwrap();
        let wrong = derive_kek(b"wrong password", &salt).unwrap();

        let (nonce, wrapped) = wrap_dek(&dek, &kek, b"aad").unwrap();
        assert!(unwrap_dek(&wrapped.0, &nonce, &wrong, b"aad").is_err());
    }

    #[test]
    fn dek_unwrap_fails_with_tampered_ciphertext() {
        let dek = generate_dek();
        let kek = derive_kek(b"password", &generate_salt()).unwrap();

        let (nonce, mut wrapped) = wrap_dek(&dek, &kek, b"aad").unwrap();
        wrapped.0[0] ^= 0x01;

        assert!(unwrap_dek(&wrapped.0, &nonce, &kek, b"aad").is_err());
    }

    #[test]
    fn dek_unwrap_fails_with_wrong_aad() {
        let dek = generate_dek();
        let kek = derive_kek(b"password", &generate_salt()).unwrap();

        let (nonce, wrapped) = wrap_dek(&dek, &kek, b"good-aad").unwrap();
        assert!(unwrap_dek(&wrapped.0, &nonce, &kek, b"bad-aad").is_err());
    }

    #[test]
    fn verifier_hash_is_deterministic() {
        let salt = b"0123456789abcdef";

        let hash1 = verifier_hash(b"password", salt).unwrap();
        let hash2 = verifier_hash(b"password", salt).unwrap();

        assert_eq!(hash1, hash2, "Same input should produce same hash");
    }

    #[test]
    fn verifier_hash_different_inputs() {
        let salt = b"0123456789abcdef";

        let hash1 = verifier_hash(b"password", salt).unwrap();
        let hash2 = verifier_hash(b"other", salt).unwrap();

        assert_ne!(
            hash1, hash2,
            "Different inputs should produce different hashes"
        );
    }

    #[test]
    fn verifier_hash_different_salts() {
        let hash1 = verifier_hash(b"password", b"0123456789abcdef").unwrap();
        let hash2 = verifier_hash(b"password", b"fedcba9876543210").unwrap();

        assert_ne!(
            hash1, hash2,
            "Different salts should produce different hashes"
        );
    }

    #[test]
    fn verify_hash_accepts_match_rejects_mismatch() {
        let salt = b"0123456789abcdef";
        let stored = verifier_hash(b"password", salt).unwrap();

        assert!(verify_hash(b"password", salt, &stored).unwrap());
        assert!(!verify_hash(b"not the password", salt, &stored).unwrap());
        assert!(!verify_hash(b"password", salt, "deadbeef").unwrap());
    }

    #[test]
    fn nonce_from_slice_validates_length() {
        assert!(Nonce::from_slice(&[0u8; 23]).is_err());
        assert!(Nonce::from_slice(&[0u8; 25]).is_err());
        assert!(Nonce::from_slice(&[0u8; 24]).is_ok());
    }

    #[test]
    fn dek_from_slice_validates_length() {
        assert!(Dek::from_slice(&[0u8; 31]).is_err());
        assert!(Dek::from_slice(&[0u8; 33]).is_err());
        assert!(Dek::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn sensitive_types_impl_zeroize() {
        fn assert_zeroize<T: zeroize::Zeroize>() {}
        assert_zeroize::<Dek>();
        assert_zeroize::<Kek>();
    }

    #[test]
    fn sha256_is_stable() {
        let a = hash_sha256(b"machine-id|host");
        let b = hash_sha256(b"machine-id|host");
        assert_eq!(a, b);
        assert_ne!(a, hash_sha256(b"machine-id|other"));
    }
}
