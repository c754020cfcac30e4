// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::time::Duration;

use async_trait::async_trait;
use landwatch_state::LandNumber;
use serde_json::Value;

use crate::{errors::FetchError, proxy::ProxySettings, FetchConfig};

/// Port over the external browser-automation driver. Implementations return
/// the raw land-state blob exactly as the game serializes it; they do not
/// parse.
#[async_trait]
pub trait StateFetch: Send + Sync + 'static {
    async fn fetch(
        &self,
        land_number: LandNumber,
        proxy: Option<&ProxySettings>,
    ) -> Result<Value, FetchError>;
}

/// [`StateFetch`] against a render gateway: a sidecar service that drives the
/// headless browser pool and exposes the extracted state per land over HTTP.
///
/// The page needs a moment to hydrate after navigation, so an empty or null
/// payload is re-polled once a second for up to `retry_attempts`; only a
/// persistently empty state is an error.
pub struct GatewayFetcher {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u64,
}

impl GatewayFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.gateway_endpoint.trim_end_matches('/').to_string(),
            retry_attempts: config.retry_attempts(),
        }
    }

    fn land_url(&self, land_number: LandNumber) -> String {
        format!("{}/land/{land_number}/state", self.endpoint)
    }

    fn client_for(&self, proxy: Option<&ProxySettings>) -> Result<reqwest::Client, FetchError> {
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };
        let upstream = reqwest::Proxy::all(&proxy.server)
            .map_err(|err| FetchError::BrowserUnreachable(err.to_string()))?
            .basic_auth(&proxy.username, &proxy.password);
        reqwest::Client::builder()
            .proxy(upstream)
            .build()
            .map_err(|err| FetchError::BrowserUnreachable(err.to_string()))
    }

    /// One gateway round trip; `Ok(None)` means the page was not ready yet.
    async fn try_fetch(
        &self,
        client: &reqwest::Client,
        land_number: LandNumber,
    ) -> Result<Option<Value>, FetchError> {
        let response = client
            .get(self.land_url(land_number))
            .send()
            .await
            .map_err(|err| FetchError::BrowserUnreachable(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::BrowserBusy);
        }
        if !status.is_success() {
            return Err(FetchError::Navigation(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|err| FetchError::BrowserUnreachable(err.to_string()))?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Null) => Ok(None),
            Ok(state) => Ok(Some(state)),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl StateFetch for GatewayFetcher {
    async fn fetch(
        &self,
        land_number: LandNumber,
        proxy: Option<&ProxySettings>,
    ) -> Result<Value, FetchError> {
        let client = self.client_for(proxy)?;
        for attempt in 0..self.retry_attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            if let Some(state) = self.try_fetch(&client, land_number).await? {
                return Ok(state);
            }
        }
        Err(FetchError::EmptyState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn land_url_keeps_single_slash() {
        let fetcher = GatewayFetcher::new(&FetchConfig {
            gateway_endpoint: "http://gateway:3000/".into(),
            ..Default::default()
        });
        assert_eq!(fetcher.land_url(9), "http://gateway:3000/land/9/state");
    }
}
