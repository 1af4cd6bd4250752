//! `srep shell <id>`: attach the local terminal to a play's shell.
//!
//! Waits out a play that is still starting by retrying the connection,
//! then enters raw mode and relays stdin/stdout until the remote closes
//! the shell or the user interrupts.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use srep_client::relay::{self, ShellExit, ShellOptions};
use srep_client::{retry, Client, FindPlayRequest, GetShellRequest, RetryPolicy};
use srep_core::context::CallContext;

use crate::config::RetryConfig;
use crate::terminal as term;

pub async fn run(client: &Client, id: &str, retry_cfg: &RetryConfig) -> Result<()> {
    let dims = term::initial_dimensions();
    let req = GetShellRequest {
        id: id.to_string(),
        rows: dims.rows,
        cols: dims.cols,
    };
    info!(id, rows = dims.rows, cols = dims.cols, "opening shell");

    let ctx = CallContext::new();
    cancel_on_signal(ctx.clone());

    let policy = RetryPolicy::new(retry_cfg.attempts, retry_cfg.delay())
        .context("invalid [retry] settings")?;
    ensure_not_finished(client, &ctx, id).await?;

    let channel = retry(policy, &ctx, |ctx| {
        let req = &req;
        async move { client.connect_shell(&ctx, req).await }
    })
    .await
    .with_context(|| format!("failed to open shell for play {id}"))?;

    let outcome = {
        let _guard = term::RawModeGuard::enter_if_tty()?;
        relay::run(
            channel,
            tokio::io::stdin(),
            tokio::io::stdout(),
            term::dimensions,
            &ShellOptions::default(),
            &ctx,
        )
        .await
    }
    .with_context(|| format!("shell for play {id} failed"))?;

    debug!(?outcome, "shell relay finished");
    match outcome.exit {
        ShellExit::Closed => {
            eprintln!("\r\nConnection to play {id} closed.");
            Ok(())
        }
        ShellExit::Cancelled => {
            eprintln!("\r\nShell for play {id} interrupted.");
            Ok(())
        }
        ShellExit::Disconnected { code: Some(code) } => {
            anyhow::bail!("shell for play {id} disconnected (close code {code})")
        }
        ShellExit::Disconnected { code: None } => {
            anyhow::bail!("shell for play {id} disconnected")
        }
    }
}

/// A finished play never gets a shell, so retrying would only wait out
/// every attempt. A failed lookup is not fatal; the connect reports it.
async fn ensure_not_finished(client: &Client, ctx: &CallContext, id: &str) -> Result<()> {
    let found = client
        .find_play(ctx, &FindPlayRequest { id: id.to_string() })
        .await;
    match found {
        Ok(resp) => {
            if let Some(play) = resp.play.filter(|p| p.status.is_finished()) {
                anyhow::bail!("play {id} is {}; it no longer has a shell", play.status);
            }
        }
        Err(e) if e.is_interrupted() => return Err(e.into()),
        Err(e) => debug!(error = %e, "play lookup failed, connecting anyway"),
    }
    Ok(())
}

/// Cancel `ctx` on Ctrl-C or SIGTERM.
///
/// In raw mode Ctrl-C reaches the remote shell as input instead.
fn cancel_on_signal(ctx: CallContext) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("interrupted, closing shell");
        ctx.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
