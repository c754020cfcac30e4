// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

/// Failures of a single gateway fetch. All of these are transient; the
/// worker loop answers every one of them with a short randomized backoff.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to navigate to the land [http-code {0}]")]
    Navigation(u16),
    #[error("the browser engine is at its limit")]
    BrowserBusy,
    #[error("failed to connect to the browser engine: {0}")]
    BrowserUnreachable(String),
    #[error("the land state came back empty")]
    EmptyState,
    #[error("gateway call exceeded the fetch timeout")]
    Timeout,
    #[error("fetch dispatcher is shut down")]
    Shutdown,
}

impl FetchError {
    /// Stable label for the failure-counter metric.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Navigation(_) => "navigation",
            FetchError::BrowserBusy => "busy",
            FetchError::BrowserUnreachable(_) => "unreachable",
            FetchError::EmptyState => "empty",
            FetchError::Timeout => "timeout",
            FetchError::Shutdown => "shutdown",
        }
    }
}
