// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The hunting side of the watcher: one long-lived worker per land keeps its
//! snapshot fresh, dispatching expensive browser-gateway fetches through a
//! process-wide concurrency cap and persisting results to the store.

mod config;
mod dispatcher;
mod errors;
mod fetcher;
pub mod metrics;
mod proxy;
mod supervisor;
mod webshare;
mod worker;

pub use config::{FetchConfig, HuntConfig};
pub use dispatcher::FetchDispatcher;
pub use errors::FetchError;
pub use fetcher::{GatewayFetcher, StateFetch};
pub use proxy::{ProxySettings, ProxyYielder};
pub use supervisor::Supervisor;
pub use worker::LandWorker;
