//! CLI pairing session lifecycle.
//!
//! A session is unknown to the server until a logged-in user opens the bind URL.
//! Binding issues the access token and stores the session; from then on it is
//! fulfilled until its TTL runs out, after which it is reported as expired.
//! Sessions are never updated or re-bound.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use getrandom::getrandom;
use shared::types::{AccessTokenBytes, RawPublicKey};

use crate::{db::PairingSession, handlers::Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStatus {
    Fulfilled,
    Expired,
}

impl PairingSession {
    pub fn new(session_id: String, client_public_key: RawPublicKey, user_id: String) -> Result<Self, Error> {
        Ok(Self {
            session_id,
            client_public_key,
            token_id: random_id()?,
            user_id,
            created: unix_timestamp(),
        })
    }

    pub fn status(&self, now: i64, ttl: Duration) -> PairingStatus {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        if now >= self.created.saturating_add(ttl) {
            PairingStatus::Expired
        } else {
            PairingStatus::Fulfilled
        }
    }
}

/// A random 128-bit identifier, hex-encoded. Used for tokens, users and web sessions.
pub fn random_id() -> Result<String, Error> {
    let mut bytes: AccessTokenBytes = Default::default();
    getrandom(&mut bytes)?;

    Ok(hex::encode(bytes))
}

pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
