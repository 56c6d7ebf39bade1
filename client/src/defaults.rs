//! Contains the default values for the command line options.

/// The server the CLI logs in to.
pub const SERVER_URL: &str = "http://localhost:5173";

/// Seconds between two polls of the pairing endpoint.
pub const POLL_INTERVAL_SECS: u64 = 1;

/// Maximum number of seconds to wait for the browser side of the login. Zero waits forever.
pub const LOGIN_TIMEOUT_SECS: u64 = 300;

/// Maximum number of seconds a single poll request may take.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
