use serde::{Deserialize, Serialize};

use crate::{
    crypto::EncryptedEnvelope,
    types::{GcmNonce, RawPublicKey},
};

/// Body of a successful CLI poll. Every field is lowercase hex.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PollResponse {
    /// The encrypted access token, tag included.
    pub token: String,
    /// The server's one-off public key.
    #[serde(rename = "pubKey")]
    pub pub_key: String,
    pub iv: String,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum WireError {
    #[error("field `{field}` is not valid hex: {source}")]
    Hex {
        field: &'static str,
        source: hex::FromHexError,
    },
    #[error("field `{field}` has {actual} bytes, expected {expected}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl PollResponse {
    pub fn from_envelope(envelope: &EncryptedEnvelope) -> Self {
        Self {
            token: hex::encode(&envelope.ciphertext),
            pub_key: hex::encode(envelope.sender_public_key),
            iv: hex::encode(envelope.nonce),
        }
    }

    pub fn into_envelope(self) -> Result<EncryptedEnvelope, WireError> {
        let ciphertext = decode("token", &self.token)?;
        let sender_public_key: RawPublicKey = decode_fixed("pubKey", &self.pub_key)?;
        let nonce: GcmNonce = decode_fixed("iv", &self.iv)?;

        Ok(EncryptedEnvelope { ciphertext, nonce, sender_public_key })
    }
}

fn decode(field: &'static str, value: &str) -> Result<Vec<u8>, WireError> {
    hex::decode(value).map_err(|source| WireError::Hex { field, source })
}

fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], WireError> {
    let bytes = decode(field, value)?;
    let actual = bytes.len();

    bytes
        .try_into()
        .map_err(|_| WireError::Length { field, expected: N, actual })
}
