use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BindOutcome, PairingSession, Storage, User};
use crate::handlers::Error;

#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<MemoryStorageInner>,
}

impl Debug for MemoryStorage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryStorage")
    }
}

#[derive(Default)]
struct MemoryStorageInner {
    users: HashMap<String, User>,
    web_sessions: HashMap<String, String>,
    access_tokens: Vec<(String, String)>,
    pairings: HashMap<String, PairingSession>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, user: User) -> Result<(), Error> {
        let mut data = self.data.lock().await;

        if data.users.values().any(|existing| existing.email == user.email) {
            return Err(Error::EmailTaken);
        }

        data.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let data = self.data.lock().await;

        Ok(data.users.values().find(|user| user.email == email).cloned())
    }

    async fn create_web_session(&self, web_session_id: &str, user_id: &str, _created: i64) -> Result<(), Error> {
        self.data
            .lock()
            .await
            .web_sessions
            .insert(web_session_id.to_string(), user_id.to_string());

        Ok(())
    }

    async fn web_session_user(&self, web_session_id: &str) -> Result<Option<User>, Error> {
        let data = self.data.lock().await;

        Ok(data
            .web_sessions
            .get(web_session_id)
            .and_then(|user_id| data.users.get(user_id))
            .cloned())
    }

    async fn bind_pairing(&self, pairing: PairingSession) -> Result<BindOutcome, Error> {
        // check and insert under one lock
        let mut data = self.data.lock().await;

        if let Some(existing) = data.pairings.get(&pairing.session_id) {
            return Ok(BindOutcome::Existing(existing.clone()));
        }

        data.access_tokens
            .push((pairing.token_id.clone(), pairing.user_id.clone()));
        data.pairings
            .insert(pairing.session_id.clone(), pairing.clone());

        Ok(BindOutcome::Created(pairing))
    }

    async fn find_pairing(&self, session_id: &str) -> Result<Option<PairingSession>, Error> {
        Ok(self.data.lock().await.pairings.get(session_id).cloned())
    }

    async fn access_tokens_for_user(&self, user_id: &str) -> Result<Vec<String>, Error> {
        let data = self.data.lock().await;

        Ok(data
            .access_tokens
            .iter()
            .filter(|(_, owner)| owner == user_id)
            .map(|(token_id, _)| token_id.clone())
            .collect())
    }

    async fn close(&self) {}
}
