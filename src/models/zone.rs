//! Zones, classes and per-player zone results.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MapId, PlayerId, PlayerMap, ResultKey, ZoneClassKey, ZoneKey};

/// Kind of timed segment within a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Map,
    Course,
    Bonus,
    Trick,
}

impl ZoneKind {
    /// Every kind, in catalog order.
    pub const ALL: [ZoneKind; 4] = [
        ZoneKind::Map,
        ZoneKind::Course,
        ZoneKind::Bonus,
        ZoneKind::Trick,
    ];

    /// Trick zones never carry point value.
    pub fn is_ranked(&self) -> bool {
        !matches!(self, ZoneKind::Trick)
    }

    /// Path segment used by the remote API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Map => "map",
            ZoneKind::Course => "course",
            ZoneKind::Bonus => "bonus",
            ZoneKind::Trick => "trick",
        }
    }
}

impl std::fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "map" => Ok(ZoneKind::Map),
            "course" => Ok(ZoneKind::Course),
            "bonus" => Ok(ZoneKind::Bonus),
            "trick" => Ok(ZoneKind::Trick),
            other => Err(format!("zone kind '{}' is not supported", other)),
        }
    }
}

/// Playable class. Each class has independent tiers and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    Soldier,
    Demoman,
}

impl Class {
    pub const ALL: [Class; 2] = [Class::Soldier, Class::Demoman];

    /// Numeric class id used by the remote API.
    pub fn api_id(&self) -> u8 {
        match self {
            Class::Soldier => 3,
            Class::Demoman => 4,
        }
    }
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Class::Soldier => write!(f, "soldier"),
            Class::Demoman => write!(f, "demoman"),
        }
    }
}

impl FromStr for Class {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soldier" => Ok(Class::Soldier),
            "demoman" => Ok(Class::Demoman),
            other => Err(format!("class '{}' is not supported", other)),
        }
    }
}

/// A single timed course segment within a map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub map_id: MapId,
    pub map_name: String,
    pub kind: ZoneKind,
    /// 1-based index within the map for this kind
    pub index: u8,
}

impl Zone {
    pub fn key(&self) -> ZoneKey {
        ZoneKey {
            map_id: self.map_id,
            kind: self.kind,
            index: self.index,
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.map_name, self.kind, self.index)
    }
}

/// Per-(zone, class) population metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneClassInfo {
    pub map_id: MapId,
    pub map_name: String,
    pub kind: ZoneKind,
    pub index: u8,
    pub class: Class,
    pub custom_name: String,

    /// 0 means unranked for this class
    pub tier: u8,

    /// Number of players who have ever finished the zone
    pub completions: u32,
}

impl ZoneClassInfo {
    pub fn key(&self) -> ZoneClassKey {
        ZoneClassKey {
            zone: ZoneKey {
                map_id: self.map_id,
                kind: self.kind,
                index: self.index,
            },
            class: self.class,
        }
    }

    /// Whether this zone contributes to points, percentages and tier masks.
    pub fn is_ranked(&self) -> bool {
        self.tier != 0 && self.kind.is_ranked()
    }
}

/// One player's state for a (zone, class).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerClassZoneResult {
    pub player_id: PlayerId,
    pub map_id: MapId,
    pub map_name: String,
    pub kind: ZoneKind,
    pub index: u8,
    pub class: Class,
    pub custom_name: String,
    pub tier: u8,

    /// When this record was fetched
    pub updated: DateTime<Utc>,

    /// 0 = incomplete, otherwise the leaderboard placement
    pub rank: u32,

    /// Run time in seconds, 0 when incomplete
    pub duration: f64,

    /// Date of the best run
    pub date: Option<DateTime<Utc>>,

    /// Population completion count at fetch time
    pub completions: u32,
}

impl PlayerClassZoneResult {
    pub fn key(&self) -> ResultKey {
        ResultKey {
            player_id: self.player_id,
            zone: ZoneKey {
                map_id: self.map_id,
                kind: self.kind,
                index: self.index,
            },
            class: self.class,
        }
    }

    pub fn zone_class_key(&self) -> ZoneClassKey {
        self.key().into()
    }

    pub fn player_map(&self) -> PlayerMap {
        PlayerMap {
            player_id: self.player_id,
            map_id: self.map_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.duration > 0.0
    }

    pub fn is_ranked(&self) -> bool {
        self.tier != 0 && self.kind.is_ranked()
    }
}

impl From<ResultKey> for ZoneClassKey {
    fn from(key: ResultKey) -> Self {
        ZoneClassKey {
            zone: key.zone,
            class: key.class,
        }
    }
}

/// A (player, map) whose raw results changed after its stats were last computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StalePlayerMap {
    pub player_map: PlayerMap,

    /// The "latest update" value observed when the work was selected
    pub latest_update: DateTime<Utc>,
}

/// Keep only results that placed in the top 10.
pub fn filter_top_times(results: &mut Vec<PlayerClassZoneResult>) {
    results.retain(|r| r.rank >= 1 && r.rank <= 10);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rank: u32, duration: f64) -> PlayerClassZoneResult {
        PlayerClassZoneResult {
            player_id: 1,
            map_id: 2,
            map_name: "jump_cow".to_string(),
            kind: ZoneKind::Map,
            index: 1,
            class: Class::Soldier,
            custom_name: String::new(),
            tier: 3,
            updated: Utc::now(),
            rank,
            duration,
            date: None,
            completions: 100,
        }
    }

    #[test]
    fn test_zone_kind_serialization() {
        let json = serde_json::to_string(&ZoneKind::Bonus).unwrap();
        assert_eq!(json, "\"bonus\"");

        let parsed: ZoneKind = serde_json::from_str("\"trick\"").unwrap();
        assert_eq!(parsed, ZoneKind::Trick);
    }

    #[test]
    fn test_zone_kind_ranked() {
        assert!(ZoneKind::Map.is_ranked());
        assert!(ZoneKind::Course.is_ranked());
        assert!(ZoneKind::Bonus.is_ranked());
        assert!(!ZoneKind::Trick.is_ranked());
    }

    #[test]
    fn test_zone_kind_from_str() {
        assert_eq!("course".parse::<ZoneKind>(), Ok(ZoneKind::Course));
        assert!("checkpoint".parse::<ZoneKind>().is_err());
    }

    #[test]
    fn test_class_api_ids() {
        assert_eq!(Class::Soldier.api_id(), 3);
        assert_eq!(Class::Demoman.api_id(), 4);
    }

    #[test]
    fn test_zone_class_info_ranked() {
        let mut info = ZoneClassInfo {
            map_id: 1,
            map_name: "jump_beef".to_string(),
            kind: ZoneKind::Bonus,
            index: 1,
            class: Class::Demoman,
            custom_name: String::new(),
            tier: 2,
            completions: 10,
        };
        assert!(info.is_ranked());

        info.tier = 0;
        assert!(!info.is_ranked());

        info.tier = 2;
        info.kind = ZoneKind::Trick;
        assert!(!info.is_ranked());
    }

    #[test]
    fn test_result_completion() {
        assert!(result(4, 81.5).is_completed());
        assert!(!result(0, 0.0).is_completed());
    }

    #[test]
    fn test_filter_top_times() {
        let mut results = vec![result(1, 10.0), result(11, 12.0), result(0, 0.0), result(10, 9.0)];
        filter_top_times(&mut results);

        let ranks: Vec<u32> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 10]);
    }
}
