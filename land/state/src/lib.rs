// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Pure domain logic for land states: the raw-blob parser and the refresh
//! scheduling policy. Nothing in this crate performs IO; the watcher and the
//! API crates feed it raw states pulled from the browser gateway or the
//! store.

mod parser;
mod refresh;
mod types;

pub use parser::{parse, ParseError};
pub use refresh::{next_delay, MAX_DELAY_SECS, MIN_DELAY_SECS};
pub use types::{
    datetime_format, CachedLandState, LandEntityPosition, LandNumber, LandUpdate,
    ParsedLandIndustry, ParsedLandState, ParsedLandTree,
};
