//! Persistence layer.
//!
//! The scheduler talks to storage only through the [`Store`] trait. Every
//! mutation is an idempotent upsert keyed by the identities in
//! [`crate::models`], so replaying a batch converges to the same state.
//!
//! Two implementations:
//! - [`MemoryStore`]: in-process tables, used by tests and `--ephemeral` runs
//! - [`JsonlStore`]: the same tables mirrored to JSON Lines files under the data dir

pub mod jsonl;
pub mod memory;

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Class, MapCatalog, MapId, MapStatsInfo, PlayerClassZoneResult, PlayerId, PlayerMap,
    PlayerMapStats, StalePlayerMap, Zone, ZoneClassInfo, ZoneKind,
};

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt table: {0}")]
    Corrupt(String),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Directory holding one JSONL file per table.
    pub fn tables_dir(&self) -> PathBuf {
        self.data_dir.join("tables")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Restricts which zones a player result query returns. Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub kinds: Vec<ZoneKind>,
    pub tiers: Vec<u8>,
    pub classes: Vec<Class>,
}

impl ResultFilter {
    pub fn matches(&self, info: &ZoneClassInfo) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&info.kind))
            && (self.tiers.is_empty() || self.tiers.contains(&info.tier))
            && (self.classes.is_empty() || self.classes.contains(&info.class))
    }
}

/// Repository interface used by the scheduler.
#[async_trait]
pub trait Store: Send + Sync {
    /// The stored map catalog, or an empty never-refreshed one.
    async fn get_maps(&self) -> Result<MapCatalog, StorageError>;

    async fn insert_maps(&self, catalog: &MapCatalog) -> Result<(), StorageError>;

    /// Replace the zone universe. Zones already known keep their fetched
    /// time, new zones start never-fetched, and zones not listed are dropped.
    async fn insert_zones(&self, zones: &[Zone]) -> Result<(), StorageError>;

    /// Zones never fetched or last fetched before `threshold`, oldest first.
    async fn get_stale_zones(
        &self,
        threshold: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Zone>, StorageError>;

    async fn set_zones_fetched(&self, zones: &[Zone], at: DateTime<Utc>)
        -> Result<(), StorageError>;

    async fn insert_zone_class_info(&self, info: &[ZoneClassInfo]) -> Result<(), StorageError>;

    async fn get_all_zone_class_info(&self) -> Result<Vec<ZoneClassInfo>, StorageError>;

    /// Upsert raw results and advance each touched (player, map)'s latest update.
    async fn insert_player_class_zone_results(
        &self,
        results: &[PlayerClassZoneResult],
    ) -> Result<(), StorageError>;

    /// Record Steam ID mappings. Existing mappings are left untouched.
    async fn insert_steam_ids(&self, ids: &HashMap<String, PlayerId>)
        -> Result<(), StorageError>;

    async fn get_player_by_steam_id(&self, steam_id: &str)
        -> Result<Option<PlayerId>, StorageError>;

    async fn insert_map_stats(
        &self,
        stats: &HashMap<MapId, MapStatsInfo>,
    ) -> Result<(), StorageError>;

    async fn get_map_stats(&self, map_id: MapId) -> Result<Option<MapStatsInfo>, StorageError>;

    /// (player, map) pairs whose latest update differs from their latest processed update.
    async fn get_stale_player_maps(&self, limit: usize)
        -> Result<Vec<StalePlayerMap>, StorageError>;

    async fn get_player_map_results(
        &self,
        player_maps: &[StalePlayerMap],
    ) -> Result<HashMap<PlayerMap, Vec<PlayerClassZoneResult>>, StorageError>;

    async fn insert_player_map_stats(
        &self,
        stats: &HashMap<PlayerMap, PlayerMapStats>,
    ) -> Result<(), StorageError>;

    async fn get_player_map_stats(
        &self,
        player_map: PlayerMap,
    ) -> Result<Option<PlayerMapStats>, StorageError>;

    /// Advance the processed marker to the latest update observed at selection time.
    ///
    /// Raw data that arrived after selection leaves the pair stale.
    async fn set_player_maps_processed(
        &self,
        player_maps: &[StalePlayerMap],
    ) -> Result<(), StorageError>;

    /// Every ranked zone-class matching `filter`, joined with the player's
    /// result. Zones the player has no result for come back incomplete.
    async fn get_player_class_zone_results(
        &self,
        player_id: PlayerId,
        filter: &ResultFilter,
    ) -> Result<Vec<PlayerClassZoneResult>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(kind: ZoneKind, tier: u8, class: Class) -> ZoneClassInfo {
        ZoneClassInfo {
            map_id: 1,
            map_name: "jump_a".to_string(),
            kind,
            index: 1,
            class,
            custom_name: String::new(),
            tier,
            completions: 0,
        }
    }

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));
        assert_eq!(config.tables_dir(), PathBuf::from("/data/tables"));
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = ResultFilter::default();
        assert!(filter.matches(&info(ZoneKind::Bonus, 3, Class::Demoman)));
    }

    #[test]
    fn test_filter_combines_fields() {
        let filter = ResultFilter {
            kinds: vec![ZoneKind::Map, ZoneKind::Course],
            tiers: vec![4, 5],
            classes: vec![Class::Soldier],
        };

        assert!(filter.matches(&info(ZoneKind::Map, 4, Class::Soldier)));
        assert!(!filter.matches(&info(ZoneKind::Bonus, 4, Class::Soldier)));
        assert!(!filter.matches(&info(ZoneKind::Map, 3, Class::Soldier)));
        assert!(!filter.matches(&info(ZoneKind::Map, 4, Class::Demoman)));
    }
}
