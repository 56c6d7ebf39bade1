use aes_gcm::{aead::Aead, Nonce};
use getrandom::getrandom;

use super::{CryptoError, SharedKey};
use crate::types::{GcmNonce, NONCE_LENGTH};

/// AES-256-GCM output: ciphertext with the tag appended, and its nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: GcmNonce,
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under a freshly drawn random nonce.
pub fn encrypt(key: &SharedKey, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
    let cipher = key.cipher()?;

    // a nonce must never repeat under the same key
    let mut nonce: GcmNonce = Default::default();
    getrandom(&mut nonce)?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt and verify. Any tag mismatch is `AuthenticationFailed`.
pub fn decrypt(key: &SharedKey, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LENGTH {
        return Err(CryptoError::InvalidNonce);
    }

    key.cipher()?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
