// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::net::Ipv4Addr;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use log::info;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 6116 }
    }
}

/// Serves the process-wide prometheus registry until `cancel` fires.
pub async fn start_metrics_server(
    config: MetricsConfig,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).await?;
    info!("metrics server listening on {}", listener.local_addr()?);
    let app = Router::new().route("/metrics", get(collect_metrics));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

async fn collect_metrics() -> impl IntoResponse {
    let metric_families = prometheus::default_registry().gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain".to_string())],
            err.to_string().into_bytes(),
        ),
    }
}
