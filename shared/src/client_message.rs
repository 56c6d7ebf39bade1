use serde::{Deserialize, Serialize};

use crate::constants::{PUBLIC_KEY_PARAM, SESSION_PARAM};

/// Query of the bind URL the CLI opens in the browser.
///
/// Both fields are optional so that the server can answer a missing parameter
/// with its own message instead of a generic extractor error.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CliLoginParams {
    pub session: Option<String>,
    pub pub_key: Option<String>,
}

impl CliLoginParams {
    pub fn new(session: impl Into<String>, pub_key: impl Into<String>) -> Self {
        Self {
            session: Some(session.into()),
            pub_key: Some(pub_key.into()),
        }
    }

    /// Query pairs in the order the server documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(session) = &self.session {
            pairs.push((SESSION_PARAM, session.as_str()));
        }
        if let Some(pub_key) = &self.pub_key {
            pairs.push((PUBLIC_KEY_PARAM, pub_key.as_str()));
        }
        pairs
    }
}
