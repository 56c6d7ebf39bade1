pub const PUBLIC_KEY_LENGTH: usize = 65; // SEC1 uncompressed P-256 point
pub const NONCE_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;
pub const SESSION_ID_LENGTH: usize = 16;
pub const TOKEN_LENGTH: usize = 16;

pub type RawPublicKey = [u8; PUBLIC_KEY_LENGTH];
pub type GcmNonce = [u8; NONCE_LENGTH];

/// Random bytes of a CLI pairing session id, sent hex-encoded.
pub type SessionIdBytes = [u8; SESSION_ID_LENGTH];

/// Random bytes of an issued access token, sent hex-encoded.
pub type AccessTokenBytes = [u8; TOKEN_LENGTH];
