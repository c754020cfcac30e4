// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;

use crate::types::{
    LandEntityPosition, ParsedLandIndustry, ParsedLandState, ParsedLandTree,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A key the game always ships is absent or carries the wrong shape.
    #[error("malformed land state: missing or ill-typed `{0}`")]
    MalformedState(&'static str),
}

/// Entity prefixes, first match wins.
const ENT_TREE: &str = "ent_tree";
const ENT_WINDMILL: &str = "ent_windmill";
const ENT_WINERY: &str = "ent_winery";
const ENT_GRILL: &str = "ent_landbbq";
const ENT_KILN: &str = "ent_kiln";

/// Converts a raw land-state blob into a [`ParsedLandState`].
///
/// The blob stays schemaless up to here; this is the only place that knows
/// where the game hides its fields. Entities with an unknown prefix are
/// dropped. Statics are a list of `{name, value}` pairs with no guarantee of
/// which names are present, so every lookup has an explicit default.
pub fn parse(raw: &Value) -> Result<ParsedLandState, ParseError> {
    let permissions_use = raw
        .pointer("/permissions/use")
        .and_then(Value::as_array)
        .filter(|seq| !seq.is_empty())
        .ok_or(ParseError::MalformedState("permissions.use"))?;
    let is_blocked = permissions_use[0].as_str() != Some("ANY");

    let entities = raw
        .get("entities")
        .and_then(Value::as_object)
        .ok_or(ParseError::MalformedState("entities"))?;

    let land_number = raw
        .pointer("/nft/tokenId")
        .and_then(int_coerce)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or(ParseError::MalformedState("nft.tokenId"))?;

    let total_players = raw
        .get("players")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    let mut parsed = ParsedLandState {
        land_number,
        is_blocked,
        total_players,
        ..Default::default()
    };

    for (key, entity) in entities {
        let kind = entity.get("entity").and_then(Value::as_str).unwrap_or("");
        if kind.starts_with(ENT_TREE) {
            parsed.trees.push(parse_tree(key, entity));
        } else if kind.starts_with(ENT_WINDMILL) {
            parsed.windmills.push(parse_industry(key, entity));
        } else if kind.starts_with(ENT_WINERY) {
            parsed.wineries.push(parse_industry(key, entity));
        } else if kind.starts_with(ENT_GRILL) {
            parsed.grills.push(parse_industry(key, entity));
        } else if kind.starts_with(ENT_KILN) {
            parsed.kilns.push(parse_industry(key, entity));
        }
    }

    Ok(parsed)
}

fn parse_tree(key: &str, entity: &Value) -> ParsedLandTree {
    let statics = collect_statics(entity);
    ParsedLandTree {
        mid: entity_mid(key, entity),
        entity: str_field(entity, "entity"),
        position: parse_position(entity),
        state: generic_state(entity),
        utc_refresh: entity
            .pointer("/generic/utcRefresh")
            .and_then(int_coerce)
            .and_then(ms_to_datetime),
        chops: static_int(&statics, "chops"),
        last_timer: ms_to_datetime(static_int(&statics, "lastTimer")),
        last_chop: ms_to_datetime(static_int(&statics, "lastChop")),
    }
}

fn parse_industry(key: &str, entity: &Value) -> ParsedLandIndustry {
    let statics = collect_statics(entity);
    let in_use_by = static_str(&statics, "inUseBy");
    ParsedLandIndustry {
        mid: entity_mid(key, entity),
        entity: str_field(entity, "entity"),
        position: parse_position(entity),
        state: generic_state(entity),
        allow_public: static_int(&statics, "allowPublic") != 0,
        in_use_by: (!in_use_by.is_empty()).then_some(in_use_by),
        finish_time: ms_to_datetime(static_int(&statics, "finishTime")),
        fired_until: ms_to_datetime(static_int(&statics, "firedUntil")),
    }
}

/// The statics sequence as an unordered name-to-value mapping.
fn collect_statics(entity: &Value) -> HashMap<&str, &Value> {
    entity
        .pointer("/generic/statics")
        .and_then(Value::as_array)
        .map(|seq| {
            seq.iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?;
                    Some((name, item.get("value")?))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn static_int(statics: &HashMap<&str, &Value>, name: &str) -> i64 {
    statics.get(name).copied().and_then(int_coerce).unwrap_or(0)
}

fn static_str(statics: &HashMap<&str, &Value>, name: &str) -> String {
    statics
        .get(name)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// The game ships numbers both as JSON numbers and as decimal strings.
fn int_coerce(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Millisecond epoch to naive UTC; zero and negatives mean "not set".
fn ms_to_datetime(ms: i64) -> Option<NaiveDateTime> {
    if ms <= 0 {
        return None;
    }
    DateTime::from_timestamp(ms / 1000, 0).map(|dt| dt.naive_utc())
}

fn entity_mid(key: &str, entity: &Value) -> String {
    entity
        .get("mid")
        .and_then(Value::as_str)
        .unwrap_or(key)
        .to_string()
}

fn str_field(entity: &Value, field: &str) -> String {
    entity
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn generic_state(entity: &Value) -> String {
    entity
        .pointer("/generic/state")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_position(entity: &Value) -> LandEntityPosition {
    let coord = |axis| {
        entity
            .pointer(&format!("/position/{axis}"))
            .and_then(int_coerce)
            .unwrap_or(0)
    };
    LandEntityPosition {
        x: coord("x"),
        y: coord("y"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_state(entities: Value) -> Value {
        json!({
            "permissions": { "use": ["ANY"] },
            "entities": entities,
            "nft": { "tokenId": "42" },
            "players": [{}, {}],
        })
    }

    #[test]
    fn empty_blocked_land() {
        let raw = json!({
            "permissions": { "use": ["addr"] },
            "entities": {},
            "nft": { "tokenId": "42" },
            "players": [],
        });
        let parsed = parse(&raw).unwrap();
        assert_eq!(parsed.land_number, 42);
        assert!(parsed.is_blocked);
        assert_eq!(parsed.total_players, 0);
        assert!(parsed.trees.is_empty());
        assert!(parsed.windmills.is_empty());
        assert!(parsed.wineries.is_empty());
        assert!(parsed.grills.is_empty());
        assert!(parsed.kilns.is_empty());
    }

    #[test]
    fn token_id_accepts_numbers_and_numeric_strings() {
        let mut raw = raw_state(json!({}));
        raw["nft"]["tokenId"] = json!(731);
        assert_eq!(parse(&raw).unwrap().land_number, 731);

        raw["nft"]["tokenId"] = json!("9");
        assert_eq!(parse(&raw).unwrap().land_number, 9);
    }

    #[test]
    fn missing_required_keys_are_malformed() {
        for key in ["permissions", "entities", "nft"] {
            let mut raw = raw_state(json!({}));
            raw.as_object_mut().unwrap().remove(key);
            assert!(parse(&raw).is_err(), "expected failure without {key}");
        }

        let mut raw = raw_state(json!({}));
        raw["permissions"]["use"] = json!([]);
        assert_eq!(
            parse(&raw).unwrap_err(),
            ParseError::MalformedState("permissions.use")
        );

        let mut raw = raw_state(json!({}));
        raw["nft"]["tokenId"] = json!("not-a-number");
        assert_eq!(
            parse(&raw).unwrap_err(),
            ParseError::MalformedState("nft.tokenId")
        );
    }

    #[test]
    fn missing_players_defaults_to_zero() {
        let mut raw = raw_state(json!({}));
        raw.as_object_mut().unwrap().remove("players");
        assert_eq!(parse(&raw).unwrap().total_players, 0);
    }

    #[test]
    fn classifies_entities_by_prefix() {
        let raw = raw_state(json!({
            "e1": { "mid": "t1", "entity": "ent_tree_pine", "position": {"x": 1, "y": 2},
                    "generic": { "state": "grown", "statics": [] } },
            "e2": { "mid": "w1", "entity": "ent_windmill", "position": {"x": 3, "y": 4},
                    "generic": { "state": "idle", "statics": [] } },
            "e3": { "mid": "v1", "entity": "ent_winery_big", "position": {"x": 0, "y": 0},
                    "generic": { "state": "", "statics": [] } },
            "e4": { "mid": "g1", "entity": "ent_landbbq", "position": {"x": 0, "y": 0},
                    "generic": { "state": "", "statics": [] } },
            "e5": { "mid": "k1", "entity": "ent_kiln", "position": {"x": 0, "y": 0},
                    "generic": { "state": "", "statics": [] } },
            "e6": { "mid": "x1", "entity": "ent_fence", "position": {"x": 0, "y": 0},
                    "generic": { "state": "", "statics": [] } },
        }));
        let parsed = parse(&raw).unwrap();
        assert_eq!(parsed.trees.len(), 1);
        assert_eq!(parsed.windmills.len(), 1);
        assert_eq!(parsed.wineries.len(), 1);
        assert_eq!(parsed.grills.len(), 1);
        assert_eq!(parsed.kilns.len(), 1);
        assert_eq!(parsed.trees[0].mid, "t1");
        assert_eq!(parsed.trees[0].position, LandEntityPosition { x: 1, y: 2 });
    }

    #[test]
    fn tree_statics_decode_with_defaults() {
        let raw = raw_state(json!({
            "e1": {
                "mid": "t1",
                "entity": "ent_tree",
                "position": {"x": 0, "y": 0},
                "generic": {
                    "state": "grown",
                    "utcRefresh": 1700000000000_i64,
                    "statics": [
                        { "name": "chops", "value": "3" },
                        { "name": "lastChop", "value": "1699999000000" },
                    ],
                },
            },
        }));
        let tree = &parse(&raw).unwrap().trees[0];
        assert_eq!(tree.chops, 3);
        assert_eq!(
            tree.utc_refresh.unwrap(),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap().naive_utc()
        );
        assert_eq!(
            tree.last_chop.unwrap(),
            DateTime::from_timestamp(1_699_999_000, 0).unwrap().naive_utc()
        );
        // lastTimer was absent from statics
        assert_eq!(tree.last_timer, None);
    }

    #[test]
    fn industry_statics_decode_with_defaults() {
        let raw = raw_state(json!({
            "e1": {
                "mid": "w1",
                "entity": "ent_windmill",
                "position": {"x": 0, "y": 0},
                "generic": {
                    "state": "producing",
                    "statics": [
                        { "name": "allowPublic", "value": "1" },
                        { "name": "inUseBy", "value": "player-9" },
                        { "name": "finishTime", "value": 1700000360000_i64 },
                    ],
                },
            },
            "e2": {
                "mid": "w2",
                "entity": "ent_windmill",
                "position": {"x": 0, "y": 0},
                "generic": { "state": "idle", "statics": [] },
            },
        }));
        let parsed = parse(&raw).unwrap();
        let busy = parsed.windmills.iter().find(|w| w.mid == "w1").unwrap();
        assert!(busy.allow_public);
        assert_eq!(busy.in_use_by.as_deref(), Some("player-9"));
        assert!(busy.finish_time.is_some());

        let idle = parsed.windmills.iter().find(|w| w.mid == "w2").unwrap();
        assert!(!idle.allow_public);
        assert_eq!(idle.in_use_by, None);
        assert_eq!(idle.finish_time, None);
        assert_eq!(idle.fired_until, None);
    }

    #[test]
    fn zero_timestamps_mean_unset() {
        let raw = raw_state(json!({
            "e1": {
                "mid": "t1",
                "entity": "ent_tree",
                "position": {"x": 0, "y": 0},
                "generic": {
                    "state": "grown",
                    "utcRefresh": 0,
                    "statics": [ { "name": "lastTimer", "value": "0" } ],
                },
            },
        }));
        let tree = &parse(&raw).unwrap().trees[0];
        assert_eq!(tree.utc_refresh, None);
        assert_eq!(tree.last_timer, None);
    }
}
