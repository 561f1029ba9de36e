use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::service::JobService;

use super::connection::{Connection, Limits};

/// Accepts clients until `shutdown` is cancelled, then closes every open
/// connection and waits for them to finish.
pub async fn serve<S>(
    listener: TcpListener,
    service: Arc<S>,
    limits: Limits,
    shutdown: CancellationToken,
) -> Result<()>
where
    S: JobService,
{
    info!(addr = %listener.local_addr()?, "Listening");

    let mut connections = JoinSet::new();

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(err) = finished {
                    error!(%err, "Connection task failed");
                }
                continue;
            }
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "Failed to accept connection");
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            debug!(%err, %peer, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let connection = Connection::new(
            service.clone(),
            reader,
            writer,
            limits,
            shutdown.child_token(),
        );

        connections.spawn(
            async move {
                debug!("Connection opened");
                connection.handle().await;
                debug!("Connection closed");
            }
            .instrument(info_span!("connection", %peer)),
        );
    }

    info!(open = connections.len(), "Closing connections");
    while let Some(finished) = connections.join_next().await {
        if let Err(err) = finished {
            error!(%err, "Connection task failed");
        }
    }

    Ok(())
}
