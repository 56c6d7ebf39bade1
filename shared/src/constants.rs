//! Shared constants for client and server.

/// Path of the human-facing page that binds a CLI session to a logged-in user.
pub const CLI_LOGIN_PATH: &str = "/cli/login";

/// Query parameter carrying the CLI session id.
pub const SESSION_PARAM: &str = "session";

/// Query parameter carrying the hex-encoded CLI public key.
pub const PUBLIC_KEY_PARAM: &str = "pub_key";

/// Longest session id the server accepts.
pub const MAX_SESSION_ID_LENGTH: usize = 64;

/// Whether `id` is acceptable as a CLI session id: non-empty, bounded, URL-safe.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LENGTH
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Path the CLI polls for the result of a pairing session.
pub fn cli_poll_path(session_id: &str) -> String {
    format!("{CLI_LOGIN_PATH}/{session_id}")
}
