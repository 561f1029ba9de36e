use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Installs the process signal handlers.
///
/// SIGTERM and SIGINT cancel the returned token; every subsystem watches it
/// and winds down. SIGUSR1 calls `on_drain`, after which the server keeps
/// serving but refuses new jobs.
pub fn install_signal_handlers<F>(on_drain: F) -> Result<CancellationToken>
where
    F: Fn() + Send + 'static,
{
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigusr1 =
        signal(SignalKind::user_defined1()).context("failed to install SIGUSR1 handler")?;

    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                    break;
                }
                _ = sigusr1.recv() => {
                    info!("Received SIGUSR1, entering drain mode");
                    on_drain();
                }
            }
        }

        token_clone.cancel();
    });

    Ok(token)
}
