// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config;

pub use config::{Config, ConfigError, LogConfig, LogValue, StoreConfig};
