use super::{import_public_key, secure_channel, CryptoError, KeyPair, RemotePublicKey};
use crate::types::{GcmNonce, RawPublicKey};

/// A payload encrypted to a recipient's public key with a one-off sender key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub ciphertext: Vec<u8>,
    pub nonce: GcmNonce,
    pub sender_public_key: RawPublicKey,
}

impl EncryptedEnvelope {
    /// Encrypt `plaintext` so that only the holder of `recipient`'s secret can read it.
    pub fn seal(recipient: &RemotePublicKey, plaintext: &[u8]) -> Result<Self, CryptoError> {
        let sender = KeyPair::generate()?;
        let key = sender.derive_shared_key(recipient);
        let sealed = secure_channel::encrypt(&key, plaintext)?;

        Ok(Self {
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            sender_public_key: sender.export_public_key(),
        })
    }

    /// Decrypt with the recipient's key pair.
    pub fn open(&self, recipient: &KeyPair) -> Result<Vec<u8>, CryptoError> {
        let sender = import_public_key(&self.sender_public_key)?;
        let key = recipient.derive_shared_key(&sender);

        secure_channel::decrypt(&key, &self.nonce, &self.ciphertext)
    }
}
