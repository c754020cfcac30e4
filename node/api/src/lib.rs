// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod error;
pub mod metrics;
mod routes;
mod stream;

use std::{net::Ipv4Addr, sync::Arc};

use axum::{routing::get, Router};
use landwatch_db::Store;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ApiError;

/// Options for the read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    /// Per-session bound on buffered stream messages; the oldest pending
    /// message is dropped once a slow client falls this far behind.
    pub stream_queue: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            stream_queue: 256,
        }
    }
}

/// Shared handler context.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: ApiConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/land/{land_number}/state/", get(routes::get_land_state))
        .route("/land/states/", get(routes::get_cached_lands))
        .route("/lands/resources/", get(routes::get_available_resources))
        .route("/lands/states/stream/", get(stream::lands_states_stream))
        .with_state(state)
}

/// Serves the API until `cancel` fires.
pub async fn start_api(state: AppState, cancel: CancellationToken) -> std::io::Result<()> {
    let port = state.config.port;
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
