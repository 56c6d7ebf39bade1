//! Server settings, read from the environment (and `.env`, if present).

use std::{path::PathBuf, time::Duration};

use anyhow::Context;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5173";
pub const DEFAULT_DB_URL: &str = "sqlite://data/database.db";
pub const DEFAULT_PAIRING_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub db_url: String,
    pub tls: Option<TlsFiles>,
    pub pairing_ttl: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let db_url = lookup("DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_string());

        let tls = match (lookup("TLS_CERT"), lookup("TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => anyhow::bail!("TLS_CERT and TLS_KEY must be set together"),
        };

        let pairing_ttl = match lookup("PAIRING_TTL_SECS") {
            Some(secs) => Duration::from_secs(
                secs.trim()
                    .parse()
                    .with_context(|| format!("PAIRING_TTL_SECS is not a number of seconds: {secs}"))?,
            ),
            None => DEFAULT_PAIRING_TTL,
        };

        Ok(Self {
            bind_addr,
            db_url,
            tls,
            pairing_ttl,
        })
    }

    /// The directory a file-backed SQLite database lives in, if it has one.
    pub fn db_dir(&self) -> Option<PathBuf> {
        let path = self
            .db_url
            .strip_prefix("sqlite://")
            .or_else(|| self.db_url.strip_prefix("sqlite:"))?;
        let path = path.split('?').next().unwrap_or(path);

        if path.is_empty() || path.starts_with(":memory:") {
            return None;
        }

        PathBuf::from(path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(PathBuf::from)
    }
}
