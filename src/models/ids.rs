//! Identity keys shared by the store and the aggregation engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Class, ZoneKind};

/// Remote player identifier.
pub type PlayerId = u64;

/// Remote map identifier.
pub type MapId = u64;

/// Identity of a zone, without its denormalized map name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneKey {
    pub map_id: MapId,
    pub kind: ZoneKind,
    pub index: u8,
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.map_id, self.kind, self.index)
    }
}

/// Identity of a zone for one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneClassKey {
    pub zone: ZoneKey,
    pub class: Class,
}

/// Primary key of a player's result: `(player, map, kind, index, class)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultKey {
    pub player_id: PlayerId,
    pub zone: ZoneKey,
    pub class: Class,
}

/// A (player, map) pair; the unit of staleness for derived statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerMap {
    pub player_id: PlayerId,
    pub map_id: MapId,
}

impl fmt::Display for PlayerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {} map {}", self.player_id, self.map_id)
    }
}

/// A (map, class) pair; the unit of population statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapClass {
    pub map_id: MapId,
    pub class: Class,
}
