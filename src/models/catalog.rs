//! Map catalog and the zone universe derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MapId, Zone, ZoneKind};

/// Number of zones of each ranked or trick kind on a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCounts {
    pub map: u8,
    pub course: u8,
    pub bonus: u8,
    pub trick: u8,
}

impl ZoneCounts {
    pub fn get(&self, kind: ZoneKind) -> u8 {
        match kind {
            ZoneKind::Map => self.map,
            ZoneKind::Course => self.course,
            ZoneKind::Bonus => self.bonus,
            ZoneKind::Trick => self.trick,
        }
    }
}

/// One map from the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMap {
    pub id: MapId,
    pub name: String,
    pub zone_counts: ZoneCounts,
    pub soldier_tier: u8,
    pub demoman_tier: u8,
}

impl CatalogMap {
    /// Zones of this map, with 1-based indices per kind.
    pub fn zones(&self) -> Vec<Zone> {
        ZoneKind::ALL
            .iter()
            .flat_map(|&kind| {
                (1..=self.zone_counts.get(kind)).map(move |index| Zone {
                    map_id: self.id,
                    map_name: self.name.clone(),
                    kind,
                    index,
                })
            })
            .collect()
    }
}

/// Map catalog snapshot with the time it was refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCatalog {
    pub updated: DateTime<Utc>,
    pub maps: Vec<CatalogMap>,
}

impl MapCatalog {
    /// A catalog that has never been refreshed.
    pub fn empty() -> Self {
        Self {
            updated: DateTime::<Utc>::UNIX_EPOCH,
            maps: Vec::new(),
        }
    }

    pub fn is_older_than(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.updated) > max_age
    }

    /// The full zone universe of the catalog.
    pub fn zones(&self) -> Vec<Zone> {
        self.maps.iter().flat_map(CatalogMap::zones).collect()
    }

    pub fn find(&self, map_id: MapId) -> Option<&CatalogMap> {
        self.maps.iter().find(|m| m.id == map_id)
    }
}
