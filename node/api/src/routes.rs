// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use landwatch_state::{parse, CachedLandState, LandNumber, ParsedLandState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::ApiError, AppState};

pub(crate) async fn get_land_state(
    Path(land_number): Path<LandNumber>,
    State(state): State<AppState>,
) -> Result<Json<CachedLandState>, ApiError> {
    match state.store.get(land_number).await? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(ApiError::not_found(format!(
            "There is no live state for land {land_number}"
        ))),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CachedLands {
    total_items: usize,
    cached_lands: Vec<LandNumber>,
}

pub(crate) async fn get_cached_lands(
    State(state): State<AppState>,
) -> Result<Json<CachedLands>, ApiError> {
    let cached_lands = state.store.keys().await?;
    Ok(Json(CachedLands {
        total_items: cached_lands.len(),
        cached_lands,
    }))
}

const RESULTS_PER_PAGE: usize = 50;
/// A resource is "available soon" when it frees up within this window.
const DUE_WINDOW_SECS: i64 = 600;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResourcesQuery {
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AvailableResources {
    total_items: usize,
    current_offset: usize,
    results_per_page: usize,
    resources: Vec<Value>,
}

/// Resources across all cached lands that free up within the next ten
/// minutes, soonest first.
pub(crate) async fn get_available_resources(
    Query(query): Query<ResourcesQuery>,
    State(state): State<AppState>,
) -> Result<Json<AvailableResources>, ApiError> {
    let all = state.store.read_all().await?;
    let now = Utc::now().naive_utc();

    let mut due: Vec<(NaiveDateTime, Value)> = Vec::new();
    for (land_number, snapshot) in all {
        // Snapshots that stopped parsing are stale data, not a read failure.
        let Ok(parsed) = parse(&snapshot.state) else {
            continue;
        };
        due.extend(land_resources(land_number, &parsed, now));
    }
    due.sort_by_key(|(due_at, _)| *due_at);

    let total_items = due.len();
    let resources = due
        .into_iter()
        .skip(query.offset)
        .take(RESULTS_PER_PAGE)
        .map(|(_, resource)| resource)
        .collect();

    Ok(Json(AvailableResources {
        total_items,
        current_offset: query.offset,
        results_per_page: RESULTS_PER_PAGE,
        resources,
    }))
}

fn land_resources(
    land_number: LandNumber,
    parsed: &ParsedLandState,
    now: NaiveDateTime,
) -> Vec<(NaiveDateTime, Value)> {
    let mut due = Vec::new();

    let mut push = |due_at: Option<NaiveDateTime>, resource: Value| {
        let due_at = due_at.unwrap_or(now);
        let delta = (due_at - now).num_seconds();
        if delta > 0 && delta < DUE_WINDOW_SECS {
            due.push((due_at, tag_land(land_number, parsed, resource)));
        }
    };

    for tree in &parsed.trees {
        if let Ok(resource) = serde_json::to_value(tree) {
            push(tree.utc_refresh, resource);
        }
    }
    for industries in parsed.industries() {
        for industry in industries {
            if let Ok(resource) = serde_json::to_value(industry) {
                push(industry.finish_time, resource);
            }
        }
    }

    due
}

fn tag_land(land_number: LandNumber, parsed: &ParsedLandState, mut resource: Value) -> Value {
    if let Some(fields) = resource.as_object_mut() {
        fields.insert("landNumber".to_string(), land_number.into());
        fields.insert("isBlocked".to_string(), parsed.is_blocked.into());
        fields.insert("totalPlayers".to_string(), parsed.total_players.into());
    }
    resource
}
