use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{
    lock::LockService,
    repository::{JobPriorityQueue, JobRegistry},
};

/// Moves delayed jobs to the ready queue once they are due. Runs until
/// `shutdown` is cancelled.
pub async fn run<R, Q>(lock: Arc<LockService<R, Q>>, tick: Duration, shutdown: CancellationToken)
where
    R: JobRegistry,
    Q: JobPriorityQueue,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        match lock.promote_due(Utc::now()).await {
            Ok(0) => {}
            Ok(moved) => debug!(moved, "Promoted delayed jobs"),
            Err(err) => error!(%err, "Failed to promote delayed jobs"),
        }
    }

    debug!("Delay promoter stopped");
}
