use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use shared::{constants::cli_poll_path, server_message::PollResponse};

use crate::defaults;

/// What one poll of the pairing endpoint said about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nobody has opened the login link yet.
    Pending,
    Fulfilled(PollResponse),
    Expired,
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response status {0}")]
    UnexpectedStatus(u16),
    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),
}

/// A way of asking the server about a CLI session.
#[async_trait]
pub trait PollTransport: Send + Sync {
    async fn poll(&self, session_id: &str) -> Result<PollOutcome, TransportError>;
}

/// Polls the server over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpPoller {
    client: reqwest::Client,
    server: Url,
}

impl HttpPoller {
    pub fn new(server: Url) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, server })
    }

    fn url(&self, session_id: &str) -> Url {
        endpoint_url(&self.server, &cli_poll_path(session_id))
    }
}

/// `path` resolved under the server's base URL, keeping any path prefix the server is mounted at.
pub fn endpoint_url(server: &Url, path: &str) -> Url {
    let mut url = server.clone();
    url.set_query(None);
    url.set_fragment(None);

    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base}{path}"));
    url
}

#[async_trait]
impl PollTransport for HttpPoller {
    async fn poll(&self, session_id: &str) -> Result<PollOutcome, TransportError> {
        let response = self.client.get(self.url(session_id)).send().await?;
        let status = response.status();

        // the body only matters once the session is fulfilled
        let body = if status == StatusCode::OK {
            response.bytes().await?.to_vec()
        } else {
            Vec::new()
        };

        poll_outcome(status, &body)
    }
}

fn poll_outcome(status: StatusCode, body: &[u8]) -> Result<PollOutcome, TransportError> {
    match status {
        StatusCode::OK => Ok(PollOutcome::Fulfilled(serde_json::from_slice(body)?)),
        StatusCode::NOT_FOUND => Ok(PollOutcome::Pending),
        StatusCode::GONE => Ok(PollOutcome::Expired),
        other => Err(TransportError::UnexpectedStatus(other.as_u16())),
    }
}
