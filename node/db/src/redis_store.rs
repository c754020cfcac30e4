// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use landwatch_state::{CachedLandState, LandNumber, LandUpdate};
use log::warn;
use redis::{aio::ConnectionManager, AsyncCommands};

use super::{
    land_number_from_key, land_state_key, Error, Store, LANDS_STATES_CHANNEL, LANDS_STATES_KEY,
    LAND_STATE_KEY_PATTERN,
};

/// [`Store`] backed by a redis-compatible server.
///
/// Commands go through a [`ConnectionManager`] which reconnects under the
/// hood; each [`Store::subscribe`] call gets its own pubsub connection so a
/// slow or abandoned subscriber never interferes with command traffic.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, conn })
    }

    /// One round trip to confirm the server is reachable.
    pub async fn ping(&self) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn put(
        &self,
        land_number: LandNumber,
        snapshot: &CachedLandState,
        ttl: Duration,
    ) -> Result<(), Error> {
        let payload = serde_json::to_string(snapshot)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(land_state_key(land_number), &payload, ttl.as_secs())
            .await?;
        let _: () = conn
            .hset(LANDS_STATES_KEY, land_number.to_string(), &payload)
            .await?;
        Ok(())
    }

    async fn get(&self, land_number: LandNumber) -> Result<Option<CachedLandState>, Error> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(land_state_key(land_number)).await?;
        payload
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<LandNumber>, Error> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(LAND_STATE_KEY_PATTERN).await?;
        let mut lands: Vec<LandNumber> = keys
            .iter()
            .filter_map(|key| land_number_from_key(key))
            .collect();
        lands.sort_unstable();
        Ok(lands)
    }

    async fn read_all(&self) -> Result<HashMap<LandNumber, CachedLandState>, Error> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn.hgetall(LANDS_STATES_KEY).await?;
        let mut all = HashMap::with_capacity(raw.len());
        for (field, payload) in raw {
            let Ok(land_number) = field.parse::<LandNumber>() else {
                continue;
            };
            match serde_json::from_str(&payload) {
                Ok(snapshot) => {
                    all.insert(land_number, snapshot);
                }
                Err(err) => warn!("dropping undecodable snapshot for land {land_number}: {err}"),
            }
        }
        Ok(all)
    }

    async fn publish(&self, update: &LandUpdate) -> Result<(), Error> {
        let payload = serde_json::to_string(update)?;
        let mut conn = self.conn.clone();
        let _: () = conn.publish(LANDS_STATES_CHANNEL, payload).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<flume::Receiver<LandUpdate>, Error> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(LANDS_STATES_CHANNEL).await?;

        let (tx, rx) = flume::unbounded();
        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!("non-text payload on {LANDS_STATES_CHANNEL}: {err}");
                        continue;
                    }
                };
                match serde_json::from_str::<LandUpdate>(&payload) {
                    Ok(update) => {
                        if tx.send(update).is_err() {
                            // Receiver gone; drop the pubsub connection.
                            break;
                        }
                    }
                    Err(err) => warn!("undecodable update on {LANDS_STATES_CHANNEL}: {err}"),
                }
            }
        });
        Ok(rx)
    }
}
