// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

const PROXY_LIST_URL: &str =
    "https://proxy.webshare.io/api/v2/proxy/list/?mode=direct&page=1&page_size=25";

/// One proxy as listed by the webshare API.
#[derive(Debug, Clone, Deserialize)]
pub struct WebshareProxy {
    pub username: String,
    pub password: String,
    pub proxy_address: String,
    pub port: u16,
    #[serde(default)]
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
struct ProxyListResponse {
    #[serde(default)]
    results: Vec<WebshareProxy>,
}

pub async fn fetch_proxy_list(
    client: &reqwest::Client,
    token: &str,
) -> Result<Vec<WebshareProxy>, reqwest::Error> {
    let response = client
        .get(PROXY_LIST_URL)
        .header(AUTHORIZATION, format!("Token {token}"))
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json::<ProxyListResponse>().await?.results)
}
