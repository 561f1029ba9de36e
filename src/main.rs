use std::sync::Arc;

use anyhow::{Context, Result};
use beanqueue::{
    api::{listener, service::Broker},
    config,
    domain::{delay, error::StoreError, ids::IdAllocator, lock::LockService, storage::StorageService},
    infrastructure::{btree::BTreeJobRegistry, job_heap::JobHeap},
    shutdown,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::parse();

    config::configure_tracing();

    let storage = StorageService::new(BTreeJobRegistry::new(), JobHeap::new(), JobHeap::new());

    let first_id = match storage.max_id() {
        Ok(max) => max + 1,
        Err(StoreError::EmptyRegistry) => 1,
        Err(err) => return Err(err).context("failed to resume job ids"),
    };
    info!(first_id, "Storage ready");

    let lock = Arc::new(LockService::new(storage));
    let broker = Arc::new(Broker::new(lock.clone(), IdAllocator::starting_at(first_id)));

    let shutdown = {
        let broker = broker.clone();
        shutdown::install_signal_handlers(move || broker.drain())?
    };

    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let promoter = tokio::spawn(delay::run(lock, config.delay_tick(), shutdown.clone()));

    let served = listener::serve(listener, broker, config.limits(), shutdown.clone()).await;

    shutdown.cancel();
    if let Err(err) = promoter.await {
        error!(%err, "Delay promoter exited");
    }

    info!("Exiting");

    served
}
