// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical land identifier, in `[1, max_land]`.
pub type LandNumber = u64;

/// Serde helpers for the store's datetime encoding, `YYYY-MM-DD HH:MM:SS.ffffff`.
///
/// Every datetime that crosses the store or the wire goes through this
/// format; in-memory values stay as naive UTC [`NaiveDateTime`].
pub mod datetime_format {
    use chrono::{NaiveDateTime, Timelike, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

    /// The current time, truncated to the microsecond precision the wire
    /// format preserves. Snapshots built from this survive an encode/decode
    /// round trip unchanged.
    pub fn now() -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        now.with_nanosecond(now.nanosecond() / 1000 * 1000)
            .unwrap_or(now)
    }

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(de)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }

    /// Same format, over `Option<NaiveDateTime>` with `None` as JSON null.
    pub mod opt {
        use super::FORMAT;
        use chrono::NaiveDateTime;
        use serde::{self, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<NaiveDateTime>,
            ser: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => ser.serialize_str(&dt.format(FORMAT).to_string()),
                None => ser.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            de: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            let raw = Option::<String>::deserialize(de)?;
            raw.map(|s| NaiveDateTime::parse_from_str(&s, FORMAT))
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}

/// A snapshot of a land's raw state as persisted in the store under
/// `app:land:{n}:state`. The raw blob is kept schemaless; readers that need
/// structure run it through [`crate::parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLandState {
    #[serde(rename = "createdAt", with = "datetime_format")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "expiresAt", with = "datetime_format")]
    pub expires_at: NaiveDateTime,
    pub state: Value,
}

/// The payload published on `app:lands:states:channel` after every
/// successful snapshot write: the snapshot plus the land it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandUpdate {
    #[serde(rename = "landNumber")]
    pub land_number: LandNumber,
    #[serde(rename = "createdAt", with = "datetime_format")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "expiresAt", with = "datetime_format")]
    pub expires_at: NaiveDateTime,
    pub state: Value,
}

impl LandUpdate {
    pub fn new(land_number: LandNumber, snapshot: &CachedLandState) -> Self {
        Self {
            land_number,
            created_at: snapshot.created_at,
            expires_at: snapshot.expires_at,
            state: snapshot.state.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LandEntityPosition {
    pub x: i64,
    pub y: i64,
}

/// A choppable tree on a land. `utc_refresh` is when the tree respawns;
/// `None` means it is available right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLandTree {
    pub mid: String,
    pub entity: String,
    pub position: LandEntityPosition,
    pub state: String,
    #[serde(default, with = "datetime_format::opt")]
    pub utc_refresh: Option<NaiveDateTime>,
    pub chops: i64,
    #[serde(default, with = "datetime_format::opt")]
    pub last_timer: Option<NaiveDateTime>,
    #[serde(default, with = "datetime_format::opt")]
    pub last_chop: Option<NaiveDateTime>,
}

/// A production building (windmill, winery, grill or kiln). `finish_time`
/// is when the current batch completes; `None` means the building is idle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLandIndustry {
    pub mid: String,
    pub entity: String,
    pub position: LandEntityPosition,
    pub state: String,
    pub allow_public: bool,
    pub in_use_by: Option<String>,
    #[serde(default, with = "datetime_format::opt")]
    pub finish_time: Option<NaiveDateTime>,
    #[serde(default, with = "datetime_format::opt")]
    pub fired_until: Option<NaiveDateTime>,
}

/// The typed view of a raw land state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLandState {
    pub land_number: LandNumber,
    pub is_blocked: bool,
    pub total_players: usize,
    pub trees: Vec<ParsedLandTree>,
    pub windmills: Vec<ParsedLandIndustry>,
    pub wineries: Vec<ParsedLandIndustry>,
    pub grills: Vec<ParsedLandIndustry>,
    pub kilns: Vec<ParsedLandIndustry>,
}

impl ParsedLandState {
    /// All industry lists, in refresh-policy evaluation order.
    pub fn industries(&self) -> [&Vec<ParsedLandIndustry>; 4] {
        [&self.windmills, &self.wineries, &self.grills, &self.kilns]
    }
}
