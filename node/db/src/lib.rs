// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod errors;
mod memory;
mod redis_store;

pub use errors::Error;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use landwatch_state::{CachedLandState, LandNumber, LandUpdate};

/// Key of a single land snapshot.
pub fn land_state_key(land_number: LandNumber) -> String {
    format!("app:land:{land_number}:state")
}

/// Glob matching every land snapshot key.
pub const LAND_STATE_KEY_PATTERN: &str = "app:land:*:state";
/// Aggregate hash of the latest snapshot per land.
pub const LANDS_STATES_KEY: &str = "app:lands:states";
/// Channel carrying one [`LandUpdate`] per successful snapshot write.
pub const LANDS_STATES_CHANNEL: &str = "app:lands:states:channel";

/// Pulls the land number back out of a snapshot key.
pub(crate) fn land_number_from_key(key: &str) -> Option<LandNumber> {
    key.strip_prefix("app:land:")?
        .strip_suffix(":state")?
        .parse()
        .ok()
}

/// Snapshot cache with an update channel.
///
/// `put` replaces the previous snapshot for the land atomically and arms the
/// backend TTL; `get` returns `None` once the TTL elapsed. `publish` and
/// `subscribe` carry freshly stored snapshots to live readers: delivery is
/// at-most-once, order-preserving per publisher, and a receiver only sees
/// events published after it subscribed.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn put(
        &self,
        land_number: LandNumber,
        snapshot: &CachedLandState,
        ttl: Duration,
    ) -> Result<(), Error>;

    async fn get(&self, land_number: LandNumber) -> Result<Option<CachedLandState>, Error>;

    /// Land numbers with a live snapshot, ascending.
    async fn keys(&self) -> Result<Vec<LandNumber>, Error>;

    /// The aggregate index. Unlike [`Store::get`] this may include entries
    /// whose per-land TTL already elapsed; readers filter by time window.
    async fn read_all(&self) -> Result<HashMap<LandNumber, CachedLandState>, Error>;

    async fn publish(&self, update: &LandUpdate) -> Result<(), Error>;

    async fn subscribe(&self) -> Result<flume::Receiver<LandUpdate>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_round_trips() {
        assert_eq!(land_state_key(731), "app:land:731:state");
        assert_eq!(land_number_from_key("app:land:731:state"), Some(731));
        assert_eq!(land_number_from_key("app:land::state"), None);
        assert_eq!(land_number_from_key("app:lands:states"), None);
    }
}
