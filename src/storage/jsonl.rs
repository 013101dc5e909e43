//! JSONL (JSON Lines) storage.
//!
//! Each table lives in its own file under the tables directory, one JSON
//! object per line. The whole data set is loaded at open. A mutation is
//! applied to a staged copy of the tables it touches, written out, and only
//! then swapped into memory, so a failed write leaves memory matching disk.
//!
//! Results and Steam ID mappings are appended rather than rewritten. The
//! results file is an upsert log where the last line for a key wins; it is
//! compacted when the store is opened.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{
    MapCatalog, MapId, MapStatsInfo, PlayerClassZoneResult, PlayerId, PlayerMap, PlayerMapStats,
    StalePlayerMap, Zone, ZoneClassInfo,
};

use super::memory::{MapStatsRow, PlayerMapStatsRow, PlayerMapStatus, SteamIdRow, Tables, ZoneRow};
use super::{ResultFilter, StorageConfig, StorageError, Store};

/// Tables persisted as JSONL files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Catalog,
    Zones,
    ZoneClassInfo,
    Results,
    PlayerMaps,
    PlayerMapStats,
    MapStats,
    SteamIds,
}

impl Table {
    /// Get the filename for this table.
    pub fn filename(&self) -> &'static str {
        match self {
            Table::Catalog => "catalog.jsonl",
            Table::Zones => "zones.jsonl",
            Table::ZoneClassInfo => "zone_class_info.jsonl",
            Table::Results => "player_class_zone_results.jsonl",
            Table::PlayerMaps => "player_maps.jsonl",
            Table::PlayerMapStats => "player_map_stats.jsonl",
            Table::MapStats => "map_stats.jsonl",
            Table::SteamIds => "steam_ids.jsonl",
        }
    }

    pub fn path(&self, config: &StorageConfig) -> PathBuf {
        config.tables_dir().join(self.filename())
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a writer for a table.
    pub fn for_table(config: &StorageConfig, table: Table) -> Self {
        Self::new(table.path(config))
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append multiple entities to the file.
    pub fn append_batch<'a, I>(&self, entities: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut entities = entities.into_iter().peekable();
        if entities.peek().is_none() {
            return Ok(0);
        }

        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        debug!("Appended {} entities to {:?}", count, self.path);

        Ok(count)
    }

    /// Write entities, replacing the entire file.
    ///
    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash mid-write leaves the previous contents intact.
    pub fn write_all<'a, I>(&self, entities: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &self.path)?;

        debug!("Wrote {} entities to {:?}", count, self.path);
        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a reader for a table.
    pub fn for_table(config: &StorageConfig, table: Table) -> Self {
        Self::new(table.path(config))
    }

    /// Check if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all entities from the file. Unparseable lines are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();
        let mut line_num = 0;

        for line in reader.lines() {
            line_num += 1;
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        line_num, self.path, e
                    );
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// Load every table from disk, compacting the results log if it holds
/// superseded lines.
pub fn load_tables(config: &StorageConfig) -> Result<Tables, StorageError> {
    let mut tables = Tables::default();

    let catalogs = JsonlReader::<MapCatalog>::for_table(config, Table::Catalog).read_all()?;
    match catalogs.len() {
        0 => {}
        1 => tables.catalog = catalogs.into_iter().next().unwrap_or_else(MapCatalog::empty),
        n => {
            return Err(StorageError::Corrupt(format!(
                "{} holds {} catalogs, expected one",
                Table::Catalog.filename(),
                n
            )))
        }
    }

    for row in JsonlReader::<ZoneRow>::for_table(config, Table::Zones).read_all()? {
        tables.zones.insert(row.zone.key(), row);
    }
    for info in JsonlReader::<ZoneClassInfo>::for_table(config, Table::ZoneClassInfo).read_all()? {
        tables.zone_class_info.insert(info.key(), info);
    }
    let results = JsonlReader::<PlayerClassZoneResult>::for_table(config, Table::Results).read_all()?;
    let logged = results.len();
    for result in results {
        tables.results.insert(result.key(), result);
    }
    if logged > tables.results.len() {
        info!(
            "Compacting {}: {} lines down to {}",
            Table::Results.filename(),
            logged,
            tables.results.len()
        );
        JsonlWriter::for_table(config, Table::Results).write_all(tables.results.values())?;
    }
    for status in JsonlReader::<PlayerMapStatus>::for_table(config, Table::PlayerMaps).read_all()? {
        tables.player_maps.insert(status.player_map, status);
    }
    for row in JsonlReader::<PlayerMapStatsRow>::for_table(config, Table::PlayerMapStats).read_all()? {
        let player_map = PlayerMap {
            player_id: row.player_id,
            map_id: row.stats.map_id,
        };
        tables.player_map_stats.insert(player_map, row.stats);
    }
    for row in JsonlReader::<MapStatsRow>::for_table(config, Table::MapStats).read_all()? {
        tables.map_stats.insert(row.map_id, row.stats);
    }
    for row in JsonlReader::<SteamIdRow>::for_table(config, Table::SteamIds).read_all()? {
        tables.steam_ids.entry(row.steam_id).or_insert(row.player_id);
    }

    info!(
        "Loaded {} zones, {} zone classes, {} results from {:?}",
        tables.zones.len(),
        tables.zone_class_info.len(),
        tables.results.len(),
        config.tables_dir()
    );
    Ok(tables)
}

/// Copy the current contents of `table` into `staged`.
///
/// Results are not copied: staging starts empty and collects only the rows
/// being upserted.
fn stage(tables: &Tables, staged: &mut Tables, table: Table) {
    match table {
        Table::Catalog => staged.catalog = tables.catalog.clone(),
        Table::Zones => staged.zones = tables.zones.clone(),
        Table::ZoneClassInfo => staged.zone_class_info = tables.zone_class_info.clone(),
        Table::Results => {}
        Table::PlayerMaps => staged.player_maps = tables.player_maps.clone(),
        Table::PlayerMapStats => staged.player_map_stats = tables.player_map_stats.clone(),
        Table::MapStats => staged.map_stats = tables.map_stats.clone(),
        Table::SteamIds => staged.steam_ids = tables.steam_ids.clone(),
    }
}

/// Move the staged contents of `table` into `tables`.
fn commit(staged: &mut Tables, tables: &mut Tables, table: Table) {
    match table {
        Table::Catalog => {
            tables.catalog = std::mem::replace(&mut staged.catalog, MapCatalog::empty())
        }
        Table::Zones => tables.zones = std::mem::take(&mut staged.zones),
        Table::ZoneClassInfo => tables.zone_class_info = std::mem::take(&mut staged.zone_class_info),
        Table::Results => tables.results.append(&mut staged.results),
        Table::PlayerMaps => tables.player_maps = std::mem::take(&mut staged.player_maps),
        Table::PlayerMapStats => {
            tables.player_map_stats = std::mem::take(&mut staged.player_map_stats)
        }
        Table::MapStats => tables.map_stats = std::mem::take(&mut staged.map_stats),
        Table::SteamIds => tables.steam_ids = std::mem::take(&mut staged.steam_ids),
    }
}

/// Write one staged table to disk. Results are appended to the upsert log;
/// every other table is rewritten.
fn persist(config: &StorageConfig, tables: &Tables, table: Table) -> Result<usize, StorageError> {
    match table {
        Table::Catalog => JsonlWriter::for_table(config, table).write_all([&tables.catalog]),
        Table::Zones => JsonlWriter::for_table(config, table).write_all(tables.zones.values()),
        Table::ZoneClassInfo => {
            JsonlWriter::for_table(config, table).write_all(tables.zone_class_info.values())
        }
        Table::Results => JsonlWriter::for_table(config, table).append_batch(tables.results.values()),
        Table::PlayerMaps => {
            JsonlWriter::for_table(config, table).write_all(tables.player_maps.values())
        }
        Table::PlayerMapStats => {
            let rows: Vec<PlayerMapStatsRow> = tables
                .player_map_stats
                .iter()
                .map(|(player_map, stats)| PlayerMapStatsRow {
                    player_id: player_map.player_id,
                    stats: stats.clone(),
                })
                .collect();
            JsonlWriter::for_table(config, table).write_all(&rows)
        }
        Table::MapStats => {
            let rows: Vec<MapStatsRow> = tables
                .map_stats
                .iter()
                .map(|(map_id, stats)| MapStatsRow {
                    map_id: *map_id,
                    stats: stats.clone(),
                })
                .collect();
            JsonlWriter::for_table(config, table).write_all(&rows)
        }
        Table::SteamIds => {
            let rows: Vec<SteamIdRow> = tables
                .steam_ids
                .iter()
                .map(|(steam_id, player_id)| SteamIdRow {
                    steam_id: steam_id.clone(),
                    player_id: *player_id,
                })
                .collect();
            JsonlWriter::for_table(config, table).write_all(&rows)
        }
    }
}

/// File-backed store. Reads are served from memory.
pub struct JsonlStore {
    config: StorageConfig,
    tables: RwLock<Tables>,
}

impl JsonlStore {
    /// Open the store, loading any existing tables.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let tables = load_tables(&config)?;
        Ok(Self {
            config,
            tables: RwLock::new(tables),
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Apply a mutation to staged copies of the `touched` tables, persist
    /// them, then swap them into memory.
    ///
    /// `f` must only read and write the tables listed in `touched`.
    async fn mutate<F>(&self, touched: &[Table], f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Tables),
    {
        let mut tables = self.tables.write().await;

        let mut staged = Tables::default();
        for table in touched {
            stage(&tables, &mut staged, *table);
        }
        f(&mut staged);

        // PlayerMaps is listed before Results, so a failed results append
        // leaves at worst a spurious stale marker on disk.
        for table in touched {
            persist(&self.config, &staged, *table)?;
        }
        for table in touched {
            commit(&mut staged, &mut tables, *table);
        }
        Ok(())
    }
}

#[async_trait]
impl Store for JsonlStore {
    async fn get_maps(&self) -> Result<MapCatalog, StorageError> {
        Ok(self.tables.read().await.catalog.clone())
    }

    async fn insert_maps(&self, catalog: &MapCatalog) -> Result<(), StorageError> {
        self.mutate(&[Table::Catalog], |t| t.catalog = catalog.clone())
            .await
    }

    async fn insert_zones(&self, zones: &[Zone]) -> Result<(), StorageError> {
        self.mutate(&[Table::Zones], |t| t.replace_zones(zones)).await
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
        self.mutate(&[Table::Zones], |t| t.mark_zones_fetched(zones, at))
            .await
    }

    async fn insert_zone_class_info(&self, info: &[ZoneClassInfo]) -> Result<(), StorageError> {
        self.mutate(&[Table::ZoneClassInfo], |t| t.upsert_zone_class_info(info))
            .await
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
        if results.is_empty() {
            return Ok(());
        }
        self.mutate(&[Table::PlayerMaps, Table::Results], |t| {
            t.upsert_results(results)
        })
        .await
    }

    async fn insert_steam_ids(
        &self,
        ids: &HashMap<String, PlayerId>,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let added: Vec<SteamIdRow> = ids
            .iter()
            .filter(|(steam_id, _)| !tables.steam_ids.contains_key(*steam_id))
            .map(|(steam_id, player_id)| SteamIdRow {
                steam_id: steam_id.clone(),
                player_id: *player_id,
            })
            .collect();

        JsonlWriter::for_table(&self.config, Table::SteamIds).append_batch(&added)?;
        for row in added {
            tables.steam_ids.insert(row.steam_id, row.player_id);
        }
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
        self.mutate(&[Table::MapStats], |t| {
            for (map_id, info) in stats {
                t.map_stats.insert(*map_id, info.clone());
            }
        })
        .await
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
        self.mutate(&[Table::PlayerMapStats], |t| {
            for (player_map, row) in stats {
                t.player_map_stats.insert(*player_map, row.clone());
            }
        })
        .await
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
        self.mutate(&[Table::PlayerMaps], |t| {
            t.mark_player_maps_processed(player_maps)
        })
        .await
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
