//! Cryptography used by the CLI login handshake.
//!
//! Both parties generate ephemeral P-256 key pairs. The raw ECDH x-coordinate
//! is used directly as an AES-256-GCM key, which is what WebCrypto's
//! `deriveKey({ name: "ECDH" }, ..., { name: "AES-GCM", length: 256 })` does,
//! so either side can also be a browser or Node process.

pub mod envelope;
pub mod key_agreement;
pub mod secure_channel;

pub use envelope::EncryptedEnvelope;
pub use key_agreement::{import_public_key, KeyPair, RemotePublicKey, SharedKey};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidKey,
    #[error("invalid nonce length")]
    InvalidNonce,
    // the same for a wrong key and for tampered data
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("system random number generator is unavailable")]
    CryptoUnavailable,
}

impl From<getrandom::Error> for CryptoError {
    fn from(_: getrandom::Error) -> Self {
        CryptoError::CryptoUnavailable
    }
}
