// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{sync::Arc, time::Duration};

use chrono::{Duration as TimeDelta, Utc};
use landwatch_db::Store;
use landwatch_state::{
    datetime_format, next_delay, parse, CachedLandState, LandNumber, LandUpdate,
};
use log::{debug, error, info, warn};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{dispatcher::FetchDispatcher, fetcher::StateFetch, metrics};

/// Bounds of the backoff after a transient failure.
const RETRY_DELAY_SECS: std::ops::RangeInclusive<u64> = 60..=300;

/// Keeps one land's snapshot fresh for as long as the process lives.
///
/// Each pass reads the cache first; a live snapshot just re-arms the timer,
/// so a land is never fetched twice concurrently. The worker itself is the
/// serializer. On a miss the worker fetches through the shared dispatcher,
/// derives the ttl from the parsed timers, stores the snapshot and publishes
/// it to the update channel.
pub struct LandWorker<F, S> {
    land_number: LandNumber,
    dispatcher: Arc<FetchDispatcher<F>>,
    store: Arc<S>,
}

impl<F, S> LandWorker<F, S>
where
    F: StateFetch,
    S: Store,
{
    pub fn new(
        land_number: LandNumber,
        dispatcher: Arc<FetchDispatcher<F>>,
        store: Arc<S>,
    ) -> Self {
        Self {
            land_number,
            dispatcher,
            store,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            let Some(sleep_secs) = self.tick(&cancel).await else {
                return;
            };
            debug!(
                "land {} next sync in {sleep_secs} seconds",
                self.land_number
            );
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(sleep_secs)) => {}
            }
        }
    }

    /// One pass of the loop; returns how long to sleep before the next one,
    /// or `None` when cancelled mid-fetch.
    async fn tick(&self, cancel: &CancellationToken) -> Option<u64> {
        let land_number = self.land_number;

        match self.store.get(land_number).await {
            Ok(Some(snapshot)) => {
                let now = Utc::now().naive_utc();
                if snapshot.expires_at > now {
                    let remaining = (snapshot.expires_at - now).num_seconds().max(0) as u64;
                    return Some(remaining);
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!("store read for land {land_number} failed: {err}");
                return Some(retry_delay());
            }
        }

        let raw = tokio::select! {
            _ = cancel.cancelled() => return None,
            fetched = self.dispatcher.fetch(land_number) => match fetched {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("failed to fetch land {land_number} state: {err}");
                    return Some(retry_delay());
                }
            },
        };

        let parsed = match parse(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!("land {land_number} returned an unusable state: {err}");
                return Some(retry_delay());
            }
        };

        let now = datetime_format::now();
        let ttl_secs = next_delay(&parsed, now);
        let snapshot = CachedLandState {
            created_at: now,
            expires_at: now + TimeDelta::seconds(ttl_secs as i64),
            state: raw,
        };

        if let Err(err) = self
            .store
            .put(land_number, &snapshot, Duration::from_secs(ttl_secs))
            .await
        {
            warn!("store write for land {land_number} failed: {err}");
            return Some(retry_delay());
        }

        if let Err(err) = self
            .store
            .publish(&LandUpdate::new(land_number, &snapshot))
            .await
        {
            warn!("publish for land {land_number} failed: {err}");
        }

        metrics::LANDS_SYNCED_TOTAL.inc();
        info!("land {land_number} synced, next refresh in {ttl_secs} seconds");
        Some(ttl_secs)
    }
}

fn retry_delay() -> u64 {
    rand::thread_rng().gen_range(RETRY_DELAY_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{proxy::ProxySettings, FetchConfig, FetchError};
    use async_trait::async_trait;
    use landwatch_db::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedFetcher {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl StateFetch for Arc<ScriptedFetcher> {
        async fn fetch(
            &self,
            land_number: LandNumber,
            _proxy: Option<&ProxySettings>,
        ) -> Result<Value, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::BrowserBusy);
            }
            Ok(json!({
                "permissions": { "use": ["ANY"] },
                "entities": {},
                "nft": { "tokenId": land_number },
                "players": [],
            }))
        }
    }

    fn worker(
        fetcher: Arc<ScriptedFetcher>,
        store: Arc<MemoryStore>,
    ) -> LandWorker<Arc<ScriptedFetcher>, MemoryStore> {
        let dispatcher = Arc::new(FetchDispatcher::new(
            fetcher,
            &FetchConfig {
                concurrency: 2,
                timeout_ms: 5_000,
                ..Default::default()
            },
            None,
        ));
        LandWorker::new(7, dispatcher, store)
    }

    #[tokio::test]
    async fn cold_cache_fetches_stores_and_publishes() {
        let fetcher = ScriptedFetcher::ok();
        let store = Arc::new(MemoryStore::default());
        let updates = store.subscribe().await.unwrap();

        let sleep = worker(fetcher.clone(), store.clone())
            .tick(&CancellationToken::new())
            .await
            .unwrap();

        // Empty unblocked land: every timer reads "idle", one look a day.
        assert_eq!(sleep, 86_400);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let snapshot = store.get(7).await.unwrap().unwrap();
        let update = updates.try_recv().unwrap();
        assert_eq!(update.land_number, 7);
        assert_eq!(update.created_at, snapshot.created_at);
        assert_eq!(update.expires_at, snapshot.expires_at);
        assert_eq!(update.state, snapshot.state);
    }

    #[tokio::test]
    async fn warm_cache_skips_fetch_and_publish() {
        let fetcher = ScriptedFetcher::ok();
        let store = Arc::new(MemoryStore::default());
        let worker = worker(fetcher.clone(), store.clone());

        worker.tick(&CancellationToken::new()).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let updates = store.subscribe().await.unwrap();
        let sleep = worker.tick(&CancellationToken::new()).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1, "no second fetch");
        assert!(updates.try_recv().is_err(), "cache hit must not publish");
        assert!(sleep <= 86_400);
    }

    #[tokio::test]
    async fn transient_failure_backs_off_without_storing() {
        let fetcher = ScriptedFetcher::failing();
        let store = Arc::new(MemoryStore::default());

        let sleep = worker(fetcher, store.clone())
            .tick(&CancellationToken::new())
            .await
            .unwrap();

        assert!((60..=300).contains(&sleep), "sleep {sleep} out of range");
        assert!(store.get(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_state_backs_off_without_storing() {
        struct Garbage;

        #[async_trait]
        impl StateFetch for Garbage {
            async fn fetch(
                &self,
                _land_number: LandNumber,
                _proxy: Option<&ProxySettings>,
            ) -> Result<Value, FetchError> {
                Ok(json!({ "unexpected": true }))
            }
        }

        let dispatcher = Arc::new(FetchDispatcher::new(
            Garbage,
            &FetchConfig::default(),
            None,
        ));
        let store = Arc::new(MemoryStore::default());
        let worker = LandWorker::new(7, dispatcher, store.clone());

        let sleep = worker.tick(&CancellationToken::new()).await.unwrap();
        assert!((60..=300).contains(&sleep));
        assert!(store.get(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancelled_worker_stops_promptly() {
        let fetcher = ScriptedFetcher::ok();
        let store = Arc::new(MemoryStore::default());
        let worker = worker(fetcher, store);

        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), worker.run(cancel))
            .await
            .expect("run must return once cancelled");
    }
}
