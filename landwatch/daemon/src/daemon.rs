// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use anyhow::{anyhow, Context};
use landwatch_api::{start_api, AppState};
use landwatch_cli_shared::cli::Config;
use landwatch_db::{RedisStore, Store};
use landwatch_hunter::{FetchDispatcher, GatewayFetcher, ProxyYielder, Supervisor};
use landwatch_metrics::start_metrics_server;
use log::info;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("cannot reach the snapshot store: {0}")]
    StoreUnreachable(#[source] landwatch_db::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Starts daemon process
pub async fn start(config: Config) -> Result<(), DaemonError> {
    info!(
        "Starting landwatch daemon, version {}",
        env!("CARGO_PKG_VERSION")
    );

    let store = RedisStore::connect(&config.store.url)
        .await
        .map_err(DaemonError::StoreUnreachable)?;
    store.ping().await.map_err(DaemonError::StoreUnreachable)?;
    let store = Arc::new(store);
    info!("connected to the snapshot store at {}", config.store.url);

    let proxies = config
        .fetch
        .proxy_enabled
        .then(|| ProxyYielder::new(config.fetch.webshare_token.clone().unwrap_or_default()));
    let fetcher = GatewayFetcher::new(&config.fetch);
    let dispatcher = Arc::new(FetchDispatcher::new(fetcher, &config.fetch, proxies));
    let supervisor = Supervisor::new(dispatcher, store.clone(), config.hunt.clone());

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let mut services: JoinSet<anyhow::Result<()>> = JoinSet::new();

    let metrics_cancel = cancel.clone();
    let metrics_config = config.metrics.clone();
    services.spawn(async move {
        start_metrics_server(metrics_config, metrics_cancel)
            .await
            .context("metrics server failed")
    });

    let api_state = AppState {
        store: store.clone() as Arc<dyn Store>,
        config: config.api.clone(),
    };
    let api_cancel = cancel.clone();
    services.spawn(async move {
        start_api(api_state, api_cancel)
            .await
            .context("api server failed")
    });

    let supervisor_cancel = cancel.clone();
    services.spawn(async move {
        supervisor.run(supervisor_cancel).await;
        Ok(())
    });

    // Under normal operation services only return after the shutdown signal;
    // anything earlier takes the whole process down.
    let mut first_error: Option<anyhow::Error> = None;
    while let Some(joined) = services.join_next().await {
        let failure = match joined {
            Ok(Ok(())) if cancel.is_cancelled() => continue,
            Ok(Ok(())) => anyhow!("a service exited unexpectedly"),
            Ok(Err(err)) => err,
            Err(join_err) => anyhow!("a service panicked: {join_err}"),
        };
        cancel.cancel();
        first_error.get_or_insert(failure);
    }

    match first_error {
        None => {
            info!("landwatch daemon stopped cleanly");
            Ok(())
        }
        Some(err) => Err(err.into()),
    }
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining workers");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
