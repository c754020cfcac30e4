// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::VecDeque;

use log::warn;
use tokio::sync::Mutex;

use crate::webshare::{self, WebshareProxy};

/// Proxy connection settings handed to the gateway fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl From<WebshareProxy> for ProxySettings {
    fn from(proxy: WebshareProxy) -> Self {
        Self {
            server: format!("http://{}:{}", proxy.proxy_address, proxy.port),
            username: proxy.username,
            password: proxy.password,
        }
    }
}

/// Hands out one proxy per fetch, consuming the provider's list and
/// re-fetching it once drained. A failed or empty refresh yields `None`,
/// which callers treat as "connect directly".
pub struct ProxyYielder {
    client: reqwest::Client,
    token: String,
    pool: Mutex<VecDeque<ProxySettings>>,
}

impl ProxyYielder {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            pool: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn next(&self) -> Option<ProxySettings> {
        let mut pool = self.pool.lock().await;
        if pool.is_empty() {
            match webshare::fetch_proxy_list(&self.client, &self.token).await {
                Ok(proxies) => pool.extend(proxies.into_iter().map(ProxySettings::from)),
                Err(err) => {
                    warn!("proxy list refresh failed, connecting directly: {err}");
                    return None;
                }
            }
        }
        pool.pop_front()
    }
}
