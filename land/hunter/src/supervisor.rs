// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{collections::HashMap, sync::Arc, time::Duration};

use landwatch_db::Store;
use landwatch_state::LandNumber;
use log::{error, info, warn};
use tokio::{
    task::{Id, JoinSet},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatcher::FetchDispatcher, fetcher::StateFetch, metrics, worker::LandWorker, HuntConfig,
};

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// A worker alive this long is considered healthy again.
const BACKOFF_RESET_AFTER: Duration = Duration::from_secs(60);

/// Owns the whole worker fleet: spawns one [`LandWorker`] per land at
/// startup, respawns panicked ones with exponential backoff, and drains
/// everything on shutdown.
pub struct Supervisor<F, S> {
    dispatcher: Arc<FetchDispatcher<F>>,
    store: Arc<S>,
    config: HuntConfig,
}

impl<F, S> Supervisor<F, S>
where
    F: StateFetch,
    S: Store,
{
    pub fn new(dispatcher: Arc<FetchDispatcher<F>>, store: Arc<S>, config: HuntConfig) -> Self {
        Self {
            dispatcher,
            store,
            config,
        }
    }

    /// Runs until `cancel` fires, then waits up to the shutdown grace for
    /// in-flight work to drain before aborting stragglers.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut workers = JoinSet::new();
        let mut lands: HashMap<Id, (LandNumber, Instant)> = HashMap::new();
        let mut backoffs: HashMap<LandNumber, Duration> = HashMap::new();

        info!("spawning {} land workers", self.config.max_land);
        for land_number in 1..=self.config.max_land {
            self.spawn_worker(&mut workers, &mut lands, land_number, None, &cancel);
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                joined = workers.join_next_with_id() => match joined {
                    Some(Ok((id, land_number))) => {
                        // Workers only return on cancellation.
                        lands.remove(&id);
                        if !cancel.is_cancelled() {
                            warn!("worker for land {land_number} exited unexpectedly, respawning");
                            self.spawn_worker(&mut workers, &mut lands, land_number, None, &cancel);
                        }
                    }
                    Some(Err(err)) => {
                        let Some((land_number, spawned_at)) = lands.remove(&err.id()) else {
                            continue;
                        };
                        if !err.is_panic() {
                            continue;
                        }
                        let backoff = if spawned_at.elapsed() >= BACKOFF_RESET_AFTER {
                            BACKOFF_INITIAL
                        } else {
                            backoffs
                                .get(&land_number)
                                .map(|prev| (*prev * 2).min(BACKOFF_CAP))
                                .unwrap_or(BACKOFF_INITIAL)
                        };
                        backoffs.insert(land_number, backoff);
                        metrics::WORKER_RESTARTS_TOTAL.inc();
                        error!(
                            "worker for land {land_number} panicked, respawning in {}s: {err}",
                            backoff.as_secs()
                        );
                        self.spawn_worker(&mut workers, &mut lands, land_number, Some(backoff), &cancel);
                    }
                    None => break,
                },
            }
        }

        self.drain(workers).await;
    }

    fn spawn_worker(
        &self,
        workers: &mut JoinSet<LandNumber>,
        lands: &mut HashMap<Id, (LandNumber, Instant)>,
        land_number: LandNumber,
        delay: Option<Duration>,
        cancel: &CancellationToken,
    ) {
        let worker = LandWorker::new(land_number, self.dispatcher.clone(), self.store.clone());
        let cancel = cancel.clone();
        let handle = workers.spawn(async move {
            if let Some(delay) = delay {
                tokio::select! {
                    _ = cancel.cancelled() => return land_number,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            worker.run(cancel).await;
            land_number
        });
        lands.insert(handle.id(), (land_number, Instant::now()));
    }

    async fn drain(&self, mut workers: JoinSet<LandNumber>) {
        let deadline = Instant::now() + self.config.shutdown_grace();
        info!("waiting for land workers to drain");
        loop {
            match tokio::time::timeout_at(deadline, workers.join_next()).await {
                Ok(Some(_)) => {}
                Ok(None) => return,
                Err(_) => {
                    warn!("{} workers still busy past the grace period", workers.len());
                    break;
                }
            }
        }
        workers.abort_all();
        while workers.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{proxy::ProxySettings, FetchConfig, FetchError};
    use async_trait::async_trait;
    use landwatch_db::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Panics on the first call, succeeds afterwards.
    struct FlakyFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StateFetch for Arc<FlakyFetcher> {
        async fn fetch(
            &self,
            land_number: LandNumber,
            _proxy: Option<&ProxySettings>,
        ) -> Result<Value, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("injected worker panic");
            }
            Ok(json!({
                "permissions": { "use": ["ANY"] },
                "entities": {},
                "nft": { "tokenId": land_number },
                "players": [],
            }))
        }
    }

    fn supervisor(
        fetcher: Arc<FlakyFetcher>,
        store: Arc<MemoryStore>,
    ) -> Supervisor<Arc<FlakyFetcher>, MemoryStore> {
        let dispatcher = Arc::new(FetchDispatcher::new(
            fetcher,
            &FetchConfig {
                concurrency: 2,
                timeout_ms: 5_000,
                ..Default::default()
            },
            None,
        ));
        Supervisor::new(
            dispatcher,
            store,
            HuntConfig {
                max_land: 1,
                shutdown_grace_secs: 2,
            },
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicked_worker_is_respawned() {
        let fetcher = Arc::new(FlakyFetcher {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemoryStore::default());
        let supervisor = supervisor(fetcher, store.clone());

        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let running = tokio::spawn(async move { supervisor.run(run_cancel).await });

        // First attempt panics; after the 1s backoff the respawned worker
        // stores the snapshot.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if store.get(1).await.unwrap().is_some() {
                break;
            }
            assert!(Instant::now() < deadline, "worker was not respawned");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("supervisor must drain after cancel")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_drains_idle_fleet_quickly() {
        let fetcher = Arc::new(FlakyFetcher {
            calls: AtomicUsize::new(1),
        });
        let store = Arc::new(MemoryStore::default());
        let supervisor = supervisor(fetcher, store);

        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let running = tokio::spawn(async move { supervisor.run(run_cancel).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(3), running)
            .await
            .expect("supervisor must return promptly")
            .unwrap();
    }
}
