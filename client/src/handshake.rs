//! The CLI half of the browser login handshake.
//!
//! The CLI makes up a session id and a one-off key pair, sends the user to the
//! bind URL, then polls until the server hands over the access token encrypted
//! to that key pair. Polls never overlap: the next one is scheduled only after
//! the previous one has finished.

use std::{future::Future, time::Duration};

use getrandom::getrandom;
use reqwest::Url;
use shared::{
    client_message::CliLoginParams,
    constants::CLI_LOGIN_PATH,
    crypto::{CryptoError, KeyPair},
    server_message::{PollResponse, WireError},
    types::SessionIdBytes,
};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::net_server::requests::{endpoint_url, PollOutcome, PollTransport};

#[derive(thiserror::Error, Debug)]
pub enum HandshakeError {
    #[error("timed out waiting for the login to be approved in the browser")]
    TimedOut,
    #[error("login cancelled")]
    Cancelled,
    #[error("the login link has expired, please try again")]
    SessionExpired,
    #[error("server URL {0} cannot be used")]
    InvalidServerUrl(Url),
    #[error("cryptographic failure: {0}")]
    Crypto(#[from] CryptoError),
    #[error("server sent a malformed login response: {0}")]
    InvalidResponse(#[from] WireError),
    #[error("decrypted access token is not valid UTF-8")]
    InvalidToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` waits until cancelled.
    pub timeout: Option<Duration>,
}

/// A started handshake, waiting for the user to approve it in the browser.
#[derive(Debug)]
pub struct PendingHandshake {
    session_id: String,
    key_pair: KeyPair,
    login_url: Url,
}

impl PendingHandshake {
    pub fn start(server: &Url) -> Result<Self, HandshakeError> {
        if server.cannot_be_a_base() {
            return Err(HandshakeError::InvalidServerUrl(server.clone()));
        }

        let mut session_id: SessionIdBytes = Default::default();
        getrandom(&mut session_id).map_err(CryptoError::from)?;
        let session_id = hex::encode(session_id);

        let key_pair = KeyPair::generate()?;
        let params = CliLoginParams::new(session_id.clone(), hex::encode(key_pair.export_public_key()));

        let mut login_url = endpoint_url(server, CLI_LOGIN_PATH);
        login_url.query_pairs_mut().extend_pairs(params.query_pairs());

        Ok(Self {
            session_id,
            key_pair,
            login_url,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The link the user opens in a browser where they are logged in.
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    #[cfg(test)]
    pub fn public_key(&self) -> shared::types::RawPublicKey {
        self.key_pair.export_public_key()
    }

    /// Poll until the token arrives, the session expires, `options.timeout` passes or `cancel` resolves.
    ///
    /// Not-ready answers and transport failures are retried on the next tick.
    pub async fn complete<T>(
        self,
        transport: &T,
        options: PollOptions,
        cancel: impl Future<Output = ()>,
    ) -> Result<String, HandshakeError>
    where
        T: PollTransport + ?Sized,
    {
        let period = options.interval.max(Duration::from_millis(1));
        let started = Instant::now();

        let mut ticker = interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = async {
            match options.timeout {
                Some(timeout) => sleep_until(started + timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::pin!(cancel);
        tokio::pin!(deadline);

        let mut attempts: u64 = 0;

        loop {
            tokio::select! {
                () = &mut cancel => return Err(HandshakeError::Cancelled),
                () = &mut deadline => return Err(HandshakeError::TimedOut),
                _ = ticker.tick() => {}
            }

            attempts += 1;
            let outcome = tokio::select! {
                () = &mut cancel => return Err(HandshakeError::Cancelled),
                () = &mut deadline => return Err(HandshakeError::TimedOut),
                outcome = transport.poll(&self.session_id) => outcome,
            };

            match outcome {
                Ok(PollOutcome::Pending) => {
                    tracing::debug!(attempts, "login not approved yet");
                }
                Ok(PollOutcome::Expired) => return Err(HandshakeError::SessionExpired),
                Ok(PollOutcome::Fulfilled(response)) => {
                    tracing::debug!(attempts, "received encrypted token");
                    return self.decrypt(response);
                }
                Err(e) => {
                    tracing::warn!(attempts, error = %e, "poll failed, will retry");
                }
            }
        }
    }

    fn decrypt(&self, response: PollResponse) -> Result<String, HandshakeError> {
        let envelope = response.into_envelope()?;
        let token = envelope.open(&self.key_pair)?;

        String::from_utf8(token).map_err(|_| HandshakeError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;
    use shared::crypto::{import_public_key, EncryptedEnvelope};

    use super::*;
    use crate::net_server::requests::TransportError;

    type Scripted = Result<PollOutcome, TransportError>;

    /// Answers polls from a script, then keeps answering `Pending`.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        latency: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Scripted>, latency: Duration) -> Self {
            Self {
                script: Mutex::new(script.into()),
                latency,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PollTransport for ScriptedTransport {
        async fn poll(&self, _session_id: &str) -> Result<PollOutcome, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.latency).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(PollOutcome::Pending))
        }
    }

    fn server() -> Url {
        "http://localhost:5173".parse().unwrap()
    }

    fn options(timeout: Option<u64>) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(1),
            timeout: timeout.map(Duration::from_secs),
        }
    }

    fn token_for(handshake: &PendingHandshake, token: &str) -> PollOutcome {
        let recipient = import_public_key(&handshake.public_key()).unwrap();
        let envelope = EncryptedEnvelope::seal(&recipient, token.as_bytes()).unwrap();

        PollOutcome::Fulfilled(PollResponse::from_envelope(&envelope))
    }

    #[test]
    fn login_url_carries_session_and_key() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let url = handshake.login_url();

        assert_eq!(url.path(), "/cli/login");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("session".to_string(), handshake.session_id().to_string()),
                ("pub_key".to_string(), hex::encode(handshake.public_key())),
            ]
        );
        assert_eq!(handshake.session_id().len(), 32);
        assert_eq!(pairs[1].1.len(), 130);
        assert!(pairs[1].1.starts_with("04"));
    }

    #[test]
    fn login_and_poll_share_the_server_prefix() {
        let server: Url = "https://example.com/acme/?lang=en".parse().unwrap();
        let handshake = PendingHandshake::start(&server).unwrap();
        let poll_url = endpoint_url(&server, &shared::constants::cli_poll_path(handshake.session_id()));

        assert_eq!(handshake.login_url().path(), "/acme/cli/login");
        assert_eq!(poll_url.path(), format!("/acme/cli/login/{}", handshake.session_id()));

        let keys: Vec<String> = handshake.login_url().query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, vec!["session", "pub_key"]);
    }

    #[test]
    fn every_handshake_is_fresh() {
        let a = PendingHandshake::start(&server()).unwrap();
        let b = PendingHandshake::start(&server()).unwrap();

        assert_ne!(a.session_id(), b.session_id());
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn rejects_unusable_server_url() {
        let url: Url = "mailto:someone@example.com".parse().unwrap();

        assert!(matches!(
            PendingHandshake::start(&url),
            Err(HandshakeError::InvalidServerUrl(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn decrypts_token_after_waiting() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let fulfilled = token_for(&handshake, "tok-001");
        let transport = ScriptedTransport::new(
            vec![
                Ok(PollOutcome::Pending),
                Err(TransportError::UnexpectedStatus(503)),
                Ok(PollOutcome::Pending),
                Ok(fulfilled),
            ],
            Duration::from_millis(50),
        );

        let token = handshake
            .complete(&transport, options(Some(300)), std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(token, "tok-001");
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_polls_never_overlap() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let fulfilled = token_for(&handshake, "tok-001");
        let mut script: Vec<Scripted> = (0..5).map(|_| Ok(PollOutcome::Pending)).collect();
        script.push(Ok(fulfilled));

        // each poll takes three intervals
        let transport = ScriptedTransport::new(script, Duration::from_secs(3));
        let started = Instant::now();

        handshake
            .complete(&transport, options(None), std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls(), 6);
        assert!(started.elapsed() >= Duration::from_secs(6 * 3));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let transport = ScriptedTransport::new(Vec::new(), Duration::from_millis(10));
        let started = Instant::now();

        let result = handshake
            .complete(&transport, options(Some(10)), std::future::pending::<()>())
            .await;

        assert!(matches!(result, Err(HandshakeError::TimedOut)));
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(transport.calls() >= 9 && transport.calls() <= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let transport = ScriptedTransport::new(Vec::new(), Duration::from_millis(10));

        let result = handshake
            .complete(
                &transport,
                options(None),
                tokio::time::sleep(Duration::from_millis(3500)),
            )
            .await;

        assert!(matches!(result, Err(HandshakeError::Cancelled)));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_is_terminal() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let transport = ScriptedTransport::new(
            vec![Ok(PollOutcome::Pending), Ok(PollOutcome::Expired)],
            Duration::from_millis(10),
        );

        let result = handshake
            .complete(&transport, options(Some(300)), std::future::pending::<()>())
            .await;

        assert!(matches!(result, Err(HandshakeError::SessionExpired)));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tampered_token_fails_authentication() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let PollOutcome::Fulfilled(mut response) = token_for(&handshake, "tok-001") else {
            unreachable!()
        };
        let mut ciphertext = hex::decode(&response.token).unwrap();
        ciphertext[0] ^= 0x01;
        response.token = hex::encode(ciphertext);

        let transport = ScriptedTransport::new(vec![Ok(PollOutcome::Fulfilled(response))], Duration::ZERO);

        let result = handshake
            .complete(&transport, options(Some(300)), std::future::pending::<()>())
            .await;

        assert!(matches!(
            result,
            Err(HandshakeError::Crypto(CryptoError::AuthenticationFailed))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn token_for_another_key_is_rejected() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let other = PendingHandshake::start(&server()).unwrap();
        let transport = ScriptedTransport::new(vec![Ok(token_for(&other, "tok-001"))], Duration::ZERO);

        let result = handshake
            .complete(&transport, options(Some(300)), std::future::pending::<()>())
            .await;

        assert!(matches!(
            result,
            Err(HandshakeError::Crypto(CryptoError::AuthenticationFailed))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_terminal() {
        let handshake = PendingHandshake::start(&server()).unwrap();
        let transport = ScriptedTransport::new(
            vec![Ok(PollOutcome::Fulfilled(PollResponse {
                token: "zz".to_string(),
                pub_key: "04".to_string(),
                iv: "00".to_string(),
            }))],
            Duration::ZERO,
        );

        let result = handshake
            .complete(&transport, options(Some(300)), std::future::pending::<()>())
            .await;

        assert!(matches!(result, Err(HandshakeError::InvalidResponse(_))));
    }
}
