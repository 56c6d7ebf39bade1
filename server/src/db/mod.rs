//! Persistence for users, web sessions, issued tokens and CLI pairing sessions.
//!
//! Handlers only see the [`Storage`] trait. `Database` keeps everything in SQLite,
//! `MemoryStorage` keeps it in process memory and forgets it on restart.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
pub use memory::MemoryStorage;
use shared::types::RawPublicKey;
pub use sqlite::Database;

use crate::handlers::Error;

/// `DB_URL` value that selects the in-memory store.
pub const MEMORY_URL: &str = "memory";

pub type SharedStorage = Arc<dyn Storage>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
}

/// A CLI session that has been bound to a user, together with the token issued for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    pub session_id: String,
    pub client_public_key: RawPublicKey,
    pub token_id: String,
    pub user_id: String,
    pub created: i64,
}

/// Result of binding a CLI session: either this request created it, or an earlier one did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    Created(PairingSession),
    Existing(PairingSession),
}

impl BindOutcome {
    pub fn session(&self) -> &PairingSession {
        match self {
            BindOutcome::Created(session) | BindOutcome::Existing(session) => session,
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a user. Fails with `EmailTaken` if the address is already registered.
    async fn create_user(&self, user: User) -> Result<(), Error>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    async fn create_web_session(&self, web_session_id: &str, user_id: &str, created: i64) -> Result<(), Error>;

    async fn web_session_user(&self, web_session_id: &str) -> Result<Option<User>, Error>;

    /// Issue `pairing.token_id` and bind `pairing.session_id` in one atomic step.
    ///
    /// If the session id is already bound, nothing is written and the stored
    /// record is returned as `Existing`; a second token is never issued.
    async fn bind_pairing(&self, pairing: PairingSession) -> Result<BindOutcome, Error>;

    async fn find_pairing(&self, session_id: &str) -> Result<Option<PairingSession>, Error>;

    async fn access_tokens_for_user(&self, user_id: &str) -> Result<Vec<String>, Error>;

    async fn close(&self);
}

/// Open the store named by `db_url`, creating the schema if needed.
pub async fn open(db_url: &str) -> Result<SharedStorage, Error> {
    if db_url == MEMORY_URL {
        tracing::warn!("using in-memory storage, all data is lost on shutdown");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    Ok(Arc::new(Database::init(db_url).await?))
}
