// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use chrono::{Duration, NaiveDateTime};
use rand::Rng;

use crate::types::ParsedLandState;

/// Floor for any computed refresh delay.
pub const MIN_DELAY_SECS: u64 = 15;
/// Ceiling for any refresh delay; also the delay for blocked or idle lands.
pub const MAX_DELAY_SECS: u64 = 86_400;

/// Bounds of the random delay used when the snapshot looks stale.
const STALE_DELAY_SECS: std::ops::RangeInclusive<u64> = 60..=300;

/// Seconds until the next useful re-fetch of a land.
///
/// Trees gate on the *last* one to respawn so a single visit harvests them
/// all; industries gate on the *earliest* one to free up. A blocked land is
/// worth one look a day. A zero delta means every timer reads "now", which in
/// practice is a locked land, so it also gets the one-day delay. A negative
/// delta means the data predates its own timers; re-scan at a randomized
/// short delay so a fleet of stale lands does not stampede the fetcher.
pub fn next_delay(parsed: &ParsedLandState, now: NaiveDateTime) -> u64 {
    if parsed.is_blocked {
        return MAX_DELAY_SECS;
    }

    let mut timers = vec![now + Duration::days(1)];

    if !parsed.trees.is_empty() {
        let last_tree_respawn = parsed
            .trees
            .iter()
            .map(|tree| tree.utc_refresh.unwrap_or(now))
            .max()
            .unwrap_or(now);
        timers.push(last_tree_respawn);
    }

    for industries in parsed.industries() {
        if industries.is_empty() {
            continue;
        }
        let first_available = industries
            .iter()
            .map(|industry| industry.finish_time.unwrap_or(now))
            .min()
            .unwrap_or(now);
        timers.push(first_available);
    }

    let target = timers.into_iter().min().unwrap_or(now);
    let delta = (target - now).num_seconds();

    if delta == 0 {
        MAX_DELAY_SECS
    } else if delta < 0 {
        rand::thread_rng().gen_range(STALE_DELAY_SECS)
    } else {
        (delta as u64).max(MIN_DELAY_SECS)
    }
}
