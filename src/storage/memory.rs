//! In-memory tables with upsert semantics.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::{
    Class, MapCatalog, MapId, MapStatsInfo, PlayerClassZoneResult, PlayerId, PlayerMap,
    PlayerMapStats, ResultKey, StalePlayerMap, Zone, ZoneClassInfo, ZoneClassKey, ZoneKey,
    ZoneKind,
};

use super::{ResultFilter, StorageError, Store};

/// A zone and when its leaderboard was last fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRow {
    pub zone: Zone,
    pub fetched: Option<DateTime<Utc>>,
}

/// Raw-update bookkeeping for one (player, map).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMapStatus {
    pub player_map: PlayerMap,
    pub latest_update: DateTime<Utc>,
    pub latest_processed_update: Option<DateTime<Utc>>,
}

impl PlayerMapStatus {
    pub fn is_stale(&self) -> bool {
        self.latest_processed_update != Some(self.latest_update)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMapStatsRow {
    pub player_id: PlayerId,
    pub stats: PlayerMapStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStatsRow {
    pub map_id: MapId,
    pub stats: MapStatsInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteamIdRow {
    pub steam_id: String,
    pub player_id: PlayerId,
}

/// Every table, keyed by primary identity.
#[derive(Debug, Clone)]
pub struct Tables {
    pub catalog: MapCatalog,
    pub zones: BTreeMap<ZoneKey, ZoneRow>,
    pub zone_class_info: BTreeMap<ZoneClassKey, ZoneClassInfo>,
    pub results: BTreeMap<ResultKey, PlayerClassZoneResult>,
    pub player_maps: BTreeMap<PlayerMap, PlayerMapStatus>,
    pub player_map_stats: BTreeMap<PlayerMap, PlayerMapStats>,
    pub map_stats: BTreeMap<MapId, MapStatsInfo>,
    pub steam_ids: BTreeMap<String, PlayerId>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            catalog: MapCatalog::empty(),
            zones: BTreeMap::new(),
            zone_class_info: BTreeMap::new(),
            results: BTreeMap::new(),
            player_maps: BTreeMap::new(),
            player_map_stats: BTreeMap::new(),
            map_stats: BTreeMap::new(),
            steam_ids: BTreeMap::new(),
        }
    }
}

impl Tables {
    pub fn replace_zones(&mut self, zones: &[Zone]) {
        let mut next = BTreeMap::new();
        for zone in zones {
            let key = zone.key();
            let fetched = self.zones.get(&key).and_then(|row| row.fetched);
            next.insert(
                key,
                ZoneRow {
                    zone: zone.clone(),
                    fetched,
                },
            );
        }
        self.zones = next;
    }

    pub fn stale_zones(&self, threshold: DateTime<Utc>, limit: usize) -> Vec<Zone> {
        let mut stale: Vec<&ZoneRow> = self
            .zones
            .values()
            .filter(|row| row.fetched.map_or(true, |at| at < threshold))
            .collect();
        // never-fetched first, then oldest
        stale.sort_by_key(|row| row.fetched);

        stale
            .into_iter()
            .take(limit)
            .map(|row| row.zone.clone())
            .collect()
    }

    pub fn mark_zones_fetched(&mut self, zones: &[Zone], at: DateTime<Utc>) {
        for zone in zones {
            if let Some(row) = self.zones.get_mut(&zone.key()) {
                row.fetched = Some(at);
            }
        }
    }

    pub fn upsert_zone_class_info(&mut self, info: &[ZoneClassInfo]) {
        for item in info {
            self.zone_class_info.insert(item.key(), item.clone());
        }
    }

    pub fn upsert_results(&mut self, results: &[PlayerClassZoneResult]) {
        for result in results {
            self.results.insert(result.key(), result.clone());

            let player_map = result.player_map();
            let status = self
                .player_maps
                .entry(player_map)
                .or_insert_with(|| PlayerMapStatus {
                    player_map,
                    latest_update: result.updated,
                    latest_processed_update: None,
                });
            if result.updated > status.latest_update {
                status.latest_update = result.updated;
            }
        }
    }

    /// Returns the mappings that were new.
    pub fn insert_steam_ids(&mut self, ids: &HashMap<String, PlayerId>) -> Vec<SteamIdRow> {
        let mut added = Vec::new();
        for (steam_id, player_id) in ids {
            if !self.steam_ids.contains_key(steam_id) {
                self.steam_ids.insert(steam_id.clone(), *player_id);
                added.push(SteamIdRow {
                    steam_id: steam_id.clone(),
                    player_id: *player_id,
                });
            }
        }
        added
    }

    pub fn stale_player_maps(&self, limit: usize) -> Vec<StalePlayerMap> {
        self.player_maps
            .values()
            .filter(|status| status.is_stale())
            .take(limit)
            .map(|status| StalePlayerMap {
                player_map: status.player_map,
                latest_update: status.latest_update,
            })
            .collect()
    }

    pub fn player_map_results(&self, player_map: PlayerMap) -> Vec<PlayerClassZoneResult> {
        let start = ResultKey {
            player_id: player_map.player_id,
            zone: ZoneKey {
                map_id: player_map.map_id,
                kind: ZoneKind::Map,
                index: 0,
            },
            class: Class::Soldier,
        };

        self.results
            .range(start..)
            .take_while(|(key, _)| {
                key.player_id == player_map.player_id && key.zone.map_id == player_map.map_id
            })
            .map(|(_, result)| result.clone())
            .collect()
    }

    pub fn mark_player_maps_processed(&mut self, player_maps: &[StalePlayerMap]) {
        for stale in player_maps {
            if let Some(status) = self.player_maps.get_mut(&stale.player_map) {
                status.latest_processed_update = Some(stale.latest_update);
            }
        }
    }

    pub fn player_class_zone_results(
        &self,
        player_id: PlayerId,
        filter: &ResultFilter,
    ) -> Vec<PlayerClassZoneResult> {
        self.zone_class_info
            .values()
            .filter(|info| info.tier != 0 && filter.matches(info))
            .map(|info| {
                let key = ResultKey {
                    player_id,
                    zone: info.key().zone,
                    class: info.class,
                };

                match self.results.get(&key) {
                    Some(result) => PlayerClassZoneResult {
                        tier: info.tier,
                        completions: info.completions,
                        custom_name: info.custom_name.clone(),
                        ..result.clone()
                    },
                    None => PlayerClassZoneResult {
                        player_id,
                        map_id: info.map_id,
                        map_name: info.map_name.clone(),
                        kind: info.kind,
                        index: info.index,
                        class: info.class,
                        custom_name: info.custom_name.clone(),
                        tier: info.tier,
                        updated: DateTime::<Utc>::UNIX_EPOCH,
                        rank: 0,
                        duration: 0.0,
                        date: None,
                        completions: info.completions,
                    },
                }
            })
            .collect()
    }
}

/// Store backed by in-process tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_maps(&self) -> Result<MapCatalog, StorageError> {
        Ok(self.tables.read().await.catalog.clone())
    }

    async fn insert_maps(&self, catalog: &MapCatalog) -> Result<(), StorageError> {
        self.tables.write().await.catalog = catalog.clone();
        Ok(())
    }

    async fn insert_zones(&self, zones: &[Zone]) -> Result<(), StorageError> {
        self.tables.write().await.replace_zones(zones);
        Ok(())
    }

    async fn get_stale_zones(
        &self,
        threshold: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Zone>, StorageError> {
        Ok(self.tables.read().await.stale_zones(threshold, limit))
    }

    async fn set_zones_fetched(
        &self,
        zones: &[Zone],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.tables.write().await.mark_zones_fetched(zones, at);
        Ok(())
    }

    async fn insert_zone_class_info(&self, info: &[ZoneClassInfo]) -> Result<(), StorageError> {
        self.tables.write().await.upsert_zone_class_info(info);
        Ok(())
    }

    async fn get_all_zone_class_info(&self) -> Result<Vec<ZoneClassInfo>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .zone_class_info
            .values()
            .cloned()
            .collect())
    }

    async fn insert_player_class_zone_results(
        &self,
        results: &[PlayerClassZoneResult],
    ) -> Result<(), StorageError> {
        self.tables.write().await.upsert_results(results);
        Ok(())
    }

    async fn insert_steam_ids(
        &self,
        ids: &HashMap<String, PlayerId>,
    ) -> Result<(), StorageError> {
        self.tables.write().await.insert_steam_ids(ids);
        Ok(())
    }

    async fn get_player_by_steam_id(
        &self,
        steam_id: &str,
    ) -> Result<Option<PlayerId>, StorageError> {
        Ok(self.tables.read().await.steam_ids.get(steam_id).copied())
    }

    async fn insert_map_stats(
        &self,
        stats: &HashMap<MapId, MapStatsInfo>,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        for (map_id, info) in stats {
            tables.map_stats.insert(*map_id, info.clone());
        }
        Ok(())
    }

    async fn get_map_stats(&self, map_id: MapId) -> Result<Option<MapStatsInfo>, StorageError> {
        Ok(self.tables.read().await.map_stats.get(&map_id).cloned())
    }

    async fn get_stale_player_maps(
        &self,
        limit: usize,
    ) -> Result<Vec<StalePlayerMap>, StorageError> {
        Ok(self.tables.read().await.stale_player_maps(limit))
    }

    async fn get_player_map_results(
        &self,
        player_maps: &[StalePlayerMap],
    ) -> Result<HashMap<PlayerMap, Vec<PlayerClassZoneResult>>, StorageError> {
        let tables = self.tables.read().await;
        Ok(player_maps
            .iter()
            .map(|stale| (stale.player_map, tables.player_map_results(stale.player_map)))
            .collect())
    }

    async fn insert_player_map_stats(
        &self,
        stats: &HashMap<PlayerMap, PlayerMapStats>,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        for (player_map, row) in stats {
            tables.player_map_stats.insert(*player_map, row.clone());
        }
        Ok(())
    }

    async fn get_player_map_stats(
        &self,
        player_map: PlayerMap,
    ) -> Result<Option<PlayerMapStats>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .player_map_stats
            .get(&player_map)
            .cloned())
    }

    async fn set_player_maps_processed(
        &self,
        player_maps: &[StalePlayerMap],
    ) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .mark_player_maps_processed(player_maps);
        Ok(())
    }

    async fn get_player_class_zone_results(
        &self,
        player_id: PlayerId,
        filter: &ResultFilter,
    ) -> Result<Vec<PlayerClassZoneResult>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .player_class_zone_results(player_id, filter))
    }
}
