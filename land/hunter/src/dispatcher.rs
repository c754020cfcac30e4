// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{sync::Arc, time::Duration};

use landwatch_state::LandNumber;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::{
    errors::FetchError,
    fetcher::StateFetch,
    metrics,
    proxy::{ProxySettings, ProxyYielder},
    FetchConfig,
};

/// Bounded-concurrency front of the gateway fetcher.
///
/// Every fetch holds a semaphore permit for its whole duration, so the
/// number of concurrently executing gateway calls never exceeds the
/// configured cap no matter how many workers are awake. The permit is tied
/// to the stack frame and is released on every exit path, timeout included.
pub struct FetchDispatcher<F> {
    fetcher: F,
    semaphore: Arc<Semaphore>,
    proxies: Option<ProxyYielder>,
    timeout: Duration,
}

impl<F: StateFetch> FetchDispatcher<F> {
    pub fn new(fetcher: F, config: &FetchConfig, proxies: Option<ProxyYielder>) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            proxies,
            timeout: config.timeout(),
        }
    }

    pub async fn fetch(&self, land_number: LandNumber) -> Result<Value, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::Shutdown)?;

        let proxy: Option<ProxySettings> = match &self.proxies {
            Some(yielder) => yielder.next().await,
            None => None,
        };

        let _in_flight = InFlight::track();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.fetcher.fetch(land_number, proxy.as_ref()),
        )
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };
        if let Err(err) = &result {
            metrics::FETCH_FAILURE_TOTAL
                .with_label_values(&[err.reason()])
                .inc();
        }
        result
    }
}

/// Keeps the in-flight gauge honest even if a fetch panics or is dropped at
/// the timeout.
struct InFlight;

impl InFlight {
    fn track() -> Self {
        metrics::ACTIVE_FETCHES.inc();
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::ACTIVE_FETCHES.dec();
    }
}
