#![deny(unused_must_use, deprecated)]
#![warn(clippy::pedantic)]
#![allow(clippy::redundant_else, clippy::manual_let_else)]

use std::{process::ExitCode, time::Duration};

use clap::{Parser, Subcommand};
use enable_ansi_support::enable_ansi_support;
use owo_colors::OwoColorize;
use reqwest::Url;
use tracing_subscriber::EnvFilter;

use crate::{
    handshake::{PendingHandshake, PollOptions},
    net_server::requests::HttpPoller,
};

mod browser;
mod defaults;
mod handshake;
mod net_server;

#[derive(Parser)]
#[command(name = "acme")]
#[command(about = "Log in to Acme from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser and print an access token
    Login {
        /// Base URL of the Acme server
        #[arg(long, env = "ACME_SERVER_URL", default_value = defaults::SERVER_URL)]
        server: Url,
        /// Seconds between polls
        #[arg(
            long,
            env = "ACME_POLL_INTERVAL",
            default_value_t = defaults::POLL_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: u64,
        /// Seconds to wait for the browser login, 0 waits forever
        #[arg(long, env = "ACME_LOGIN_TIMEOUT", default_value_t = defaults::LOGIN_TIMEOUT_SECS)]
        timeout: u64,
        /// Only print the login link
        #[arg(long)]
        no_browser: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Windows needs explicit enabling of terminal color escapes support
    enable_ansi_support().ok();

    // stdout is reserved for the token
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Login {
            server,
            interval,
            timeout,
            no_browser,
        } => {
            let options = PollOptions {
                interval: Duration::from_secs(interval),
                timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            };
            login(server, options, !no_browser).await
        }
    };

    match result {
        Ok(token) => {
            println!("{token}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn login(server: Url, options: PollOptions, open_browser: bool) -> anyhow::Result<String> {
    let handshake = PendingHandshake::start(&server)?;
    let poller = HttpPoller::new(server)?;
    tracing::debug!(session_id = handshake.session_id(), "started login handshake");

    eprintln!("{}\n\n{}\n", "Here's your login link:".bold().green(), handshake.login_url());
    if open_browser {
        tokio::spawn(browser::open(handshake.login_url().to_string()));
    }
    eprintln!("{}", "Waiting for the login to be approved...".dimmed());

    let token = handshake.complete(&poller, options, ctrl_c()).await?;

    Ok(token)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // without a signal handler the login can only end by timeout
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
