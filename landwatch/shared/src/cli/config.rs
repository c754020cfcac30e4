// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use landwatch_api::ApiConfig;
use landwatch_hunter::{FetchConfig, HuntConfig};
use landwatch_metrics::MetricsConfig;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {0}: `{1}`")]
    InvalidEnv(&'static str, String),
    #[error("WEBSHARE_TOKEN is required when proxy rotation is enabled")]
    MissingWebshareToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string of the snapshot store.
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub filters: Vec<LogValue>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filters: vec![
                LogValue::new("hyper", LevelFilter::Warn),
                LogValue::new("reqwest", LevelFilter::Warn),
                LogValue::new("tungstenite", LevelFilter::Warn),
                LogValue::new("mio", LevelFilter::Error),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogValue {
    pub module: String,
    pub level: LevelFilter,
}

impl LogValue {
    pub fn new(module: &str, level: LevelFilter) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// Structure that defines the whole daemon configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub fetch: FetchConfig,
    pub hunt: HuntConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub log: LogConfig,
}

impl Config {
    /// Reads the optional TOML file, then applies environment overrides and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        let config = config.overridden_by(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the recognized environment overrides through `lookup`.
    pub fn overridden_by(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("REDIS_URL") {
            self.store.url = value;
        }
        if let Some(value) = lookup("PW_WS_ENDPOINT") {
            self.fetch.gateway_endpoint = value;
        }
        if let Some(value) = lookup("WEBSHARE_TOKEN") {
            self.fetch.webshare_token = Some(value);
        }
        if let Some(value) = lookup("CONCURRENCY") {
            self.fetch.concurrency = parse_env("CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("PW_DEFAULT_TIMEOUT") {
            self.fetch.timeout_ms = parse_env("PW_DEFAULT_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("PW_PROXY_ENABLED") {
            self.fetch.proxy_enabled = parse_env_bool("PW_PROXY_ENABLED", &value)?;
        }
        if let Some(value) = lookup("MAX_LAND") {
            self.hunt.max_land = parse_env("MAX_LAND", &value)?;
        }
        if let Some(value) = lookup("API_PORT") {
            self.api.port = parse_env("API_PORT", &value)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.proxy_enabled
            && self
                .fetch
                .webshare_token
                .as_deref()
                .map_or(true, str::is_empty)
        {
            return Err(ConfigError::MissingWebshareToken);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv(name, value.to_string()))
}

fn parse_env_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv(name, value.to_string())),
    }
}
