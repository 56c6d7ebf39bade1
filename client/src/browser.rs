use std::process::Stdio;

use tokio::process::Command;

/// Try to open `url` in the default browser. The link is also printed, so failing here is not fatal.
pub async fn open(url: String) {
    let status = opener(&url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => tracing::debug!("opened login link in browser"),
        Ok(status) => tracing::warn!(%status, "browser launcher exited with an error"),
        Err(e) => tracing::warn!(error = %e, "could not launch a browser"),
    }
}

#[cfg(target_os = "macos")]
fn opener(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn opener(url: &str) -> Command {
    // the empty argument is the window title `start` expects before the target
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]).arg(url);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}
