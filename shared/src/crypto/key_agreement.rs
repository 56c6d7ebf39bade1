use std::fmt::{Debug, Formatter};

use aes_gcm::{Aes256Gcm, KeyInit};
use p256::{
    ecdh::{EphemeralSecret, SharedSecret},
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey,
};
use rand_core::{OsRng, RngCore};

use super::CryptoError;
use crate::types::{RawPublicKey, PUBLIC_KEY_LENGTH};

const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;

/// An ephemeral P-256 key pair. The secret half cannot be exported.
pub struct KeyPair {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair({})", hex::encode(self.export_public_key()))
    }
}

impl KeyPair {
    /// Generate a fresh key pair from the operating system's CSPRNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let secret = EphemeralSecret::random(&mut os_rng()?);

        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// The public key as an uncompressed SEC1 point.
    pub fn export_public_key(&self) -> RawPublicKey {
        let point = self.public.to_encoded_point(false);

        let mut raw = [0u8; PUBLIC_KEY_LENGTH];
        raw.copy_from_slice(point.as_bytes());
        raw
    }

    /// Run ECDH against the counterparty's public key.
    pub fn derive_shared_key(&self, remote: &RemotePublicKey) -> SharedKey {
        SharedKey {
            secret: self.secret.diffie_hellman(&remote.0),
        }
    }
}

/// The OS random source, checked first because `OsRng` panics when it cannot be read.
fn os_rng() -> Result<OsRng, CryptoError> {
    let mut scratch = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut scratch)
        .map_err(|_| CryptoError::CryptoUnavailable)?;

    Ok(OsRng)
}

/// A validated public key received from the other party.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemotePublicKey(PublicKey);

/// Parse a raw uncompressed P-256 point, rejecting anything that is not on the curve.
pub fn import_public_key(bytes: &[u8]) -> Result<RemotePublicKey, CryptoError> {
    if bytes.len() != PUBLIC_KEY_LENGTH || bytes[0] != SEC1_UNCOMPRESSED_TAG {
        return Err(CryptoError::InvalidKey);
    }

    PublicKey::from_sec1_bytes(bytes)
        .map(RemotePublicKey)
        .map_err(|_| CryptoError::InvalidKey)
}

/// The ECDH output, used as an AES-256-GCM key. Zeroized when dropped.
pub struct SharedKey {
    secret: SharedSecret,
}

impl Debug for SharedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedKey")
    }
}

impl SharedKey {
    pub(crate) fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(self.secret.raw_secret_bytes().as_slice())
            .map_err(|_| CryptoError::InvalidKey)
    }

    #[cfg(test)]
    pub(crate) fn raw_bytes(&self) -> &[u8] {
        self.secret.raw_secret_bytes().as_slice()
    }
}
