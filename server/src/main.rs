#![deny(unused_must_use, deprecated)]
#![warn(clippy::pedantic)]
#![allow(clippy::single_match_else)]

mod config;
mod db;
mod handlers;
mod pages;
mod pairing;
mod routes;
mod web_auth;

use std::time::Duration;

use anyhow::Context;
use poem::{
    listener::{Listener, RustlsCertificate, RustlsConfig, TcpListener},
    Server,
};
use tracing_subscriber::EnvFilter;

use crate::{
    config::ServerConfig,
    routes::{app, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    if let Some(dir) = config.db_dir() {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("cannot create database directory {}", dir.display()))?;
    }

    let storage = db::open(&config.db_url).await.context("cannot open database")?;

    let app = app(AppState {
        storage: storage.clone(),
        pairing_ttl: config.pairing_ttl,
    });

    let listener = TcpListener::bind(config.bind_addr.clone());
    let listener = match &config.tls {
        Some(tls) => {
            let cert = tokio::fs::read(&tls.cert)
                .await
                .with_context(|| format!("cannot read TLS_CERT {}", tls.cert.display()))?;
            let key = tokio::fs::read(&tls.key)
                .await
                .with_context(|| format!("cannot read TLS_KEY {}", tls.key.display()))?;

            let rustls = RustlsConfig::new().fallback(RustlsCertificate::new().cert(cert).key(key));
            listener.rustls(rustls).boxed()
        }
        None => {
            tracing::warn!("TLS_CERT and TLS_KEY not set, serving plain HTTP");
            listener.boxed()
        }
    };

    tracing::info!(addr = %config.bind_addr, pairing_ttl = ?config.pairing_ttl, "starting server");

    let result = Server::new(listener)
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down");
            },
            Some(Duration::from_secs(5)),
        )
        .await;

    storage.close().await;

    result.context("server failed")
}
