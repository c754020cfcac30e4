// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use landwatch_state::{CachedLandState, LandNumber, LandUpdate};
use parking_lot::RwLock;

use super::{Error, Store};

/// A thread-safe in-process [`Store`], used by tests and tooling.
///
/// Snapshots are held JSON-encoded so a round trip through this store
/// behaves exactly like a round trip through the external backend,
/// including the datetime precision loss of the wire format. Expiry is
/// checked lazily on read.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    db: Arc<RwLock<HashMap<LandNumber, Entry>>>,
    subscribers: Arc<RwLock<Vec<flume::Sender<LandUpdate>>>>,
}

#[derive(Debug, Clone)]
struct Entry {
    payload: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(
        &self,
        land_number: LandNumber,
        snapshot: &CachedLandState,
        ttl: Duration,
    ) -> Result<(), Error> {
        let entry = Entry {
            payload: serde_json::to_string(snapshot)?,
            expires_at: Instant::now() + ttl,
        };
        self.db.write().insert(land_number, entry);
        Ok(())
    }

    async fn get(&self, land_number: LandNumber) -> Result<Option<CachedLandState>, Error> {
        let payload = match self.db.read().get(&land_number) {
            Some(entry) if entry.is_live() => entry.payload.clone(),
            _ => return Ok(None),
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    async fn keys(&self) -> Result<Vec<LandNumber>, Error> {
        let mut keys: Vec<LandNumber> = self
            .db
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(land, _)| *land)
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn read_all(&self) -> Result<HashMap<LandNumber, CachedLandState>, Error> {
        // The aggregate index ignores per-land expiry, like the hash the
        // external backend keeps next to the TTL'd keys.
        self.db
            .read()
            .iter()
            .map(|(land, entry)| Ok((*land, serde_json::from_str(&entry.payload)?)))
            .collect()
    }

    async fn publish(&self, update: &LandUpdate) -> Result<(), Error> {
        self.subscribers
            .write()
            .retain(|tx| tx.send(update.clone()).is_ok());
        Ok(())
    }

    async fn subscribe(&self) -> Result<flume::Receiver<LandUpdate>, Error> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.write().push(tx);
        Ok(rx)
    }
}
