// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use replica_search_node::{
    api::{self, AppState},
    config::NodeConfig,
    fetch::RaceFetcher,
    link::LinkBuilder,
    replica::{IndexStore, IndexSynchronizer, MirrorDistributor},
    search::{LocalQueryEngine, RemoteSearchClient, SearchArbitrator, SearchBackend},
    version,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("starting replica search node {}", version::VERSION);

    let config = NodeConfig::from_env();
    config.validate().map_err(|e| anyhow!(e))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let shutdown = CancellationToken::new();

    let primary: Arc<dyn SearchBackend> = Arc::new(RemoteSearchClient::new(
        config.primary_search_url.clone(),
        client.clone(),
    ));

    // The local replica is optional: without an index directory the node
    // passes queries straight through to the primary service.
    let local: Option<Arc<dyn SearchBackend>> = match &config.index_dir {
        None => {
            info!("no index directory configured, primary search only");
            None
        }
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            let store = IndexStore::new(dir.clone());
            let distributor = Arc::new(MirrorDistributor::new(
                RaceFetcher::new(client.clone()),
                config.index_mirror_urls.clone(),
            ));
            let (synchronizer, snapshot_rx) = IndexSynchronizer::new(
                distributor,
                store,
                Duration::from_secs(config.index_poll_interval_secs),
            );
            synchronizer.spawn(shutdown.clone());
            info!("local index replica enabled at {}", dir.display());

            let engine = LocalQueryEngine::new(
                snapshot_rx,
                LinkBuilder::new(config.webseed_base_urls.clone()),
            );
            Some(Arc::new(engine) as Arc<dyn SearchBackend>)
        }
    };

    let arbitrator = Arc::new(SearchArbitrator::new(primary, local));
    let state = AppState::new(
        arbitrator,
        client,
        config.metadata_base_urls.clone(),
        Duration::from_secs(config.search_timeout_secs),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let server = tokio::spawn(api::serve(addr, state, shutdown.clone()));

    signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.cancel();

    match server.await {
        Ok(Ok(())) => info!("server stopped"),
        Ok(Err(e)) => warn!("server exited with error: {}", e),
        Err(e) => warn!("server task failed: {}", e),
    }
    Ok(())
}
