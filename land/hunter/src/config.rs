// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options for the browser-gateway fetch path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Endpoint of the external render gateway.
    pub gateway_endpoint: String,
    /// Upper bound for a single gateway call, in milliseconds.
    pub timeout_ms: u64,
    /// Process-wide cap on concurrently executing gateway calls.
    pub concurrency: usize,
    /// Rotate outbound proxies on gateway calls.
    pub proxy_enabled: bool,
    /// Credential for the proxy-list provider; required when
    /// `proxy_enabled` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webshare_token: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            gateway_endpoint: "ws://localhost:3000/".to_string(),
            timeout_ms: 60_000,
            concurrency: 1,
            proxy_enabled: false,
            webshare_token: None,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// How often the gateway is re-polled while the page is not ready yet,
    /// one second apart.
    pub fn retry_attempts(&self) -> u64 {
        (self.timeout_ms / 1000).max(1)
    }
}

/// Options for the worker fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    /// Upper bound of the land number range to watch.
    pub max_land: u64,
    /// How long shutdown waits for in-flight fetches to drain.
    pub shutdown_grace_secs: u64,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self {
            max_land: 5000,
            shutdown_grace_secs: 10,
        }
    }
}

impl HuntConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
