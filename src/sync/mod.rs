//! Staleness scheduler.
//!
//! Each iteration does at most one kind of work, in priority order:
//! 1. Refresh the map catalog if it is older than the catalog max age
//! 2. Fetch leaderboards for a small batch of stale zones
//! 3. Recompute stats for (player, map) pairs with unprocessed results
//!
//! The periodic loop re-runs immediately while work remains, sleeps the
//! configured interval when idle, and backs off linearly on failure.
//! Aggregation errors stop the loop, since refetching the same data cannot
//! fix them.

pub mod pipeline;
pub mod records;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::calculate::{
    aggregate_map_stats, calculate_player_map_stats, collect_map_stats_info, CalculateError,
};
use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::models::{
    Class, MapCatalog, MapClass, MapClassStatsInfo, MapId, PlayerClassZoneResult, PlayerId,
    ZoneClassInfo, ZoneKind,
};
use crate::storage::{StorageError, Store};

use pipeline::{BatchStatus, FetchPipeline, PipelineError, PlayerZoneWorker, ZoneRecordsWorker};
use records::{PlayerZoneQuery, RecordsSource};

/// Errors that can occur during sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Calculation error: {0}")]
    Calculate(#[from] CalculateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Map {0} is not in the catalog")]
    UnknownMap(MapId),
}

impl SyncError {
    /// Whether a later attempt can succeed without the input data changing.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::Calculate(_))
    }
}

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Idle sleep, and the base of the failure backoff
    pub interval: Duration,

    /// Zones fetched longer ago than this are stale
    pub zone_max_age: chrono::Duration,

    pub catalog_max_age: chrono::Duration,

    pub stale_zone_batch: usize,

    pub stale_player_map_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            zone_max_age: chrono::Duration::hours(24),
            catalog_max_age: chrono::Duration::hours(24),
            stale_zone_batch: 5,
            stale_player_map_batch: 10_000,
        }
    }
}

/// What an iteration ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    RefreshingZones,
    RefreshingPlayers,
    Idle,
}

impl RefreshState {
    /// Whether the caller should loop again without waiting.
    pub fn has_pending_work(&self) -> bool {
        !matches!(self, RefreshState::Idle)
    }
}

/// Delay policy between iterations.
///
/// Success clears the retry count. The first failure waits two intervals and
/// each consecutive one waits an interval longer than the last.
#[derive(Debug, Clone)]
pub struct Backoff {
    interval: Duration,
    retries: u32,
}

impl Backoff {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            retries: 0,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn on_success(&mut self, state: RefreshState) -> Duration {
        self.retries = 0;
        if state.has_pending_work() {
            Duration::ZERO
        } else {
            self.interval
        }
    }

    pub fn on_failure(&mut self) -> Duration {
        self.retries = self.retries.saturating_add(1);
        self.interval.saturating_mul(self.retries.saturating_add(1))
    }
}

/// Drives catalog, zone and player refreshes against a store.
pub struct Scheduler {
    config: SchedulerConfig,
    source: Arc<dyn RecordsSource>,
    store: Arc<dyn Store>,
    pipeline: FetchPipeline,
    population: RwLock<HashMap<MapClass, MapClassStatsInfo>>,
}

impl Scheduler {
    /// Create a scheduler, rebuilding population stats from stored zone info.
    pub async fn load(
        config: SchedulerConfig,
        source: Arc<dyn RecordsSource>,
        store: Arc<dyn Store>,
        pipeline: FetchPipeline,
    ) -> Result<Self, SyncError> {
        let infos = store.get_all_zone_class_info().await?;
        let population = aggregate_map_stats(&infos)?;
        debug!("Loaded population stats for {} map classes", population.len());

        Ok(Self {
            config,
            source,
            store,
            pipeline,
            population: RwLock::new(population),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Snapshot of the current population stats.
    pub async fn population(&self) -> HashMap<MapClass, MapClassStatsInfo> {
        self.population.read().await.clone()
    }

    /// Refresh the map catalog and resync the zone universe.
    ///
    /// Returns the number of maps in the new catalog.
    pub async fn update_maps(&self, now: DateTime<Utc>) -> Result<usize, SyncError> {
        let maps = self.source.detailed_map_list().await?;

        let catalog = MapCatalog {
            updated: now,
            maps: maps.iter().map(|m| m.to_catalog_map()).collect(),
        };
        let zones = catalog.zones();

        self.store.insert_maps(&catalog).await?;
        self.store.insert_zones(&zones).await?;

        let map_stats = collect_map_stats_info(&*self.population.read().await);
        self.store.insert_map_stats(&map_stats).await?;

        info!(
            "Updated catalog: {} maps, {} zones",
            catalog.maps.len(),
            zones.len()
        );
        Ok(catalog.maps.len())
    }

    /// Run one iteration. The returned state says whether work remains.
    pub async fn run_iteration(&self, now: DateTime<Utc>) -> Result<RefreshState, SyncError> {
        let catalog = self.store.get_maps().await?;
        if catalog.is_older_than(self.config.catalog_max_age, now) {
            info!("Map catalog last updated {}, refreshing", catalog.updated);
            self.update_maps(now).await?;
        }

        if self.refresh_zones(now).await? {
            return Ok(RefreshState::RefreshingZones);
        }

        if self.refresh_players().await? {
            return Ok(RefreshState::RefreshingPlayers);
        }

        Ok(RefreshState::Idle)
    }

    /// Fetch one batch of stale zones. Returns false if nothing was stale.
    ///
    /// Only zones whose leaderboard arrived are marked fetched; the rest of
    /// a partial batch stays stale for the next iteration.
    async fn refresh_zones(&self, now: DateTime<Utc>) -> Result<bool, SyncError> {
        let threshold = now - self.config.zone_max_age;
        let stale = self
            .store
            .get_stale_zones(threshold, self.config.stale_zone_batch)
            .await?;

        if stale.is_empty() {
            return Ok(false);
        }

        info!("Found {} stale zones", stale.len());

        let worker = Arc::new(ZoneRecordsWorker::new(Arc::clone(&self.source), now));
        let outcome = self.pipeline.run(stale, worker).await?;

        let mut fetched = Vec::with_capacity(outcome.results.len());
        let mut infos: Vec<ZoneClassInfo> = Vec::new();
        let mut results: Vec<PlayerClassZoneResult> = Vec::new();
        let mut steam_ids: HashMap<String, PlayerId> = HashMap::new();

        for zone_result in outcome.results {
            infos.extend(zone_result.class_info().into_iter().cloned());
            results.extend(zone_result.results);
            steam_ids.extend(zone_result.steam_ids);
            fetched.push(zone_result.zone);
        }

        self.store.insert_zone_class_info(&infos).await?;
        self.store.insert_player_class_zone_results(&results).await?;
        self.store.insert_steam_ids(&steam_ids).await?;
        self.refresh_population().await?;
        self.store.set_zones_fetched(&fetched, now).await?;

        if outcome.status == BatchStatus::PartiallyComplete {
            warn!(
                "Fetched {} of {} zones before the deadline, the rest stay stale",
                fetched.len(),
                outcome.expected
            );
        }

        info!(
            "Stored {} results from {} zones",
            results.len(),
            fetched.len()
        );
        Ok(true)
    }

    /// Recompute population stats from every stored zone-class row.
    async fn refresh_population(&self) -> Result<(), SyncError> {
        let infos = self.store.get_all_zone_class_info().await?;
        let population = aggregate_map_stats(&infos)?;

        self.store
            .insert_map_stats(&collect_map_stats_info(&population))
            .await?;
        *self.population.write().await = population;
        Ok(())
    }

    /// Recompute stats for one batch of stale (player, map) pairs.
    async fn refresh_players(&self) -> Result<bool, SyncError> {
        let stale = self
            .store
            .get_stale_player_maps(self.config.stale_player_map_batch)
            .await?;

        if stale.is_empty() {
            return Ok(false);
        }

        info!("Found {} stale player maps", stale.len());

        let results = self.store.get_player_map_results(&stale).await?;
        let stats = {
            let population = self.population.read().await;
            calculate_player_map_stats(&results, &population)?
        };

        self.store.insert_player_map_stats(&stats).await?;
        self.store.set_player_maps_processed(&stale).await?;

        info!("Updated stats for {} player maps", stats.len());
        Ok(true)
    }

    /// Look up one player's state on every non-trick zone of a map, both classes.
    ///
    /// Zones the player has not finished are stored as incomplete results.
    /// Returns the number of results stored.
    pub async fn refresh_player_map(
        &self,
        player_id: PlayerId,
        map_id: MapId,
        now: DateTime<Utc>,
    ) -> Result<usize, SyncError> {
        let catalog = self.store.get_maps().await?;
        let map = catalog.find(map_id).ok_or(SyncError::UnknownMap(map_id))?;

        let queries: Vec<PlayerZoneQuery> = map
            .zones()
            .into_iter()
            .filter(|zone| zone.kind != ZoneKind::Trick)
            .flat_map(|zone| {
                Class::ALL.into_iter().map(move |class| PlayerZoneQuery {
                    map_name: zone.map_name.clone(),
                    zone: zone.key(),
                    player_id,
                    class,
                })
            })
            .collect();

        info!(
            "Refreshing {} zone classes on {} for player {}",
            queries.len(),
            map.name,
            player_id
        );

        let worker = Arc::new(PlayerZoneWorker::new(Arc::clone(&self.source), now));
        let outcome = self.pipeline.run(queries, worker).await?;

        self.store
            .insert_player_class_zone_results(&outcome.results)
            .await?;

        Ok(outcome.results.len())
    }

    /// Run iterations until `shutdown` fires or an iteration hits an error
    /// that retrying cannot fix.
    ///
    /// Shutdown is observed between iterations; a running iteration is
    /// allowed to finish.
    pub async fn run_periodic(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), SyncError> {
        let mut backoff = Backoff::new(self.config.interval);
        let mut iteration: u64 = 0;

        info!(
            "Starting scheduler, idle interval {:?}",
            self.config.interval
        );

        loop {
            iteration += 1;
            debug!("Iteration {} started", iteration);

            let delay = match self.run_iteration(Utc::now()).await {
                Ok(state) => {
                    debug!("Iteration {} finished: {:?}", iteration, state);
                    backoff.on_success(state)
                }
                Err(e) if e.is_retryable() => {
                    error!("Iteration {} failed: {}", iteration, e);
                    backoff.on_failure()
                }
                Err(e) => {
                    error!("Iteration {} hit bad input data, stopping: {}", iteration, e);
                    return Err(e);
                }
            };

            if backoff.retries() > 0 {
                warn!(
                    "Retrying in {:?} after {} consecutive failures",
                    delay,
                    backoff.retries()
                );
            } else if !delay.is_zero() {
                debug!("Idle, next check in {:?}", delay);
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Scheduler stopped after {} iterations", iteration);
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlayerMap, TierMask, ZoneKey};
    use crate::storage::MemoryStore;
    use crate::sync::records::tests::{record_json, zone_records_json};
    use crate::sync::records::{
        DetailedMap, PlayerZoneCompletionResponse, SearchResponse, ZoneRecordsResponse,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockSource {
        catalog_calls: AtomicUsize,
        zone_calls: AtomicUsize,
        fail_zones: AtomicBool,
        bad_tiers: AtomicBool,
    }

    impl MockSource {
        fn new() -> Self {
            Self {
                catalog_calls: AtomicUsize::new(0),
                zone_calls: AtomicUsize::new(0),
                fail_zones: AtomicBool::new(false),
                bad_tiers: AtomicBool::new(false),
            }
        }
    }

    fn detailed_list() -> Value {
        json!([{
            "id": 12,
            "name": "jump_beef",
            "zone_counts": { "map": 1, "bonus": 1, "trick": 1, "checkpoint": 4 },
            "authors": [],
            "tier_info": { "3": 4, "4": 2 },
            "videos": { "soldier": null, "demoman": null }
        }])
    }

    #[async_trait]
    impl RecordsSource for MockSource {
        async fn detailed_map_list(&self) -> Result<Vec<DetailedMap>, FetchError> {
            self.catalog_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(detailed_list()).unwrap())
        }

        async fn zone_records(
            &self,
            zone: ZoneKey,
            _limit: u32,
        ) -> Result<ZoneRecordsResponse, FetchError> {
            self.zone_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_zones.load(Ordering::SeqCst) {
                return Err(FetchError::HttpStatus {
                    status: 502,
                    message: "Bad Gateway".to_string(),
                });
            }

            let mut body = zone_records_json(zone.map_id, zone.kind.as_str(), zone.index);
            if zone.kind == ZoneKind::Trick {
                body["tier_info"] = json!({ "3": 0, "4": 0 });
            } else if self.bad_tiers.load(Ordering::SeqCst) {
                body["tier_info"] = json!({ "3": 9, "4": 2 });
            }
            Ok(serde_json::from_value(body).unwrap())
        }

        async fn player_zone_completion(
            &self,
            query: &PlayerZoneQuery,
        ) -> Result<PlayerZoneCompletionResponse, FetchError> {
            let result = match query.class {
                Class::Soldier => record_json(query.player_id, 3, 120.0),
                Class::Demoman => Value::Null,
            };

            Ok(serde_json::from_value(json!({
                "zone_info": {
                    "id": 55,
                    "map_id": query.zone.map_id,
                    "zoneindex": query.zone.index,
                    "custom_name": null,
                    "type": query.zone.kind.as_str()
                },
                "tier_info": { "3": 4, "4": 2 },
                "completion_info": { "soldier": 2, "demoman": 0 },
                "result": result
            }))
            .unwrap())
        }

        async fn search_players_and_maps(&self, _name: &str) -> Result<SearchResponse, FetchError> {
            Ok(SearchResponse::default())
        }
    }

    async fn scheduler(source: Arc<MockSource>, store: Arc<MemoryStore>) -> Scheduler {
        Scheduler::load(
            SchedulerConfig::default(),
            source,
            store,
            FetchPipeline::default(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_backoff_success_with_work_is_immediate() {
        let mut backoff = Backoff::new(Duration::from_secs(60));
        assert_eq!(backoff.on_success(RefreshState::RefreshingZones), Duration::ZERO);
        assert_eq!(backoff.on_success(RefreshState::RefreshingPlayers), Duration::ZERO);
        assert_eq!(backoff.on_success(RefreshState::Idle), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_grows_per_failure_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(60));

        assert_eq!(backoff.on_failure(), Duration::from_secs(120));
        assert_eq!(backoff.on_failure(), Duration::from_secs(180));
        assert_eq!(backoff.on_failure(), Duration::from_secs(240));
        assert_eq!(backoff.retries(), 3);

        assert_eq!(backoff.on_success(RefreshState::Idle), Duration::from_secs(60));
        assert_eq!(backoff.retries(), 0);
        assert_eq!(backoff.on_failure(), Duration::from_secs(120));
    }

    #[test]
    fn test_backoff_saturates() {
        let mut backoff = Backoff {
            interval: Duration::from_secs(60),
            retries: u32::MAX,
        };

        assert_eq!(backoff.on_failure(), Duration::from_secs(60) * u32::MAX);
        assert_eq!(backoff.retries(), u32::MAX);
    }

    #[test]
    fn test_calculate_errors_are_not_retryable() {
        let err = SyncError::Calculate(CalculateError::InvalidTier(crate::models::InvalidTier(9)));
        assert!(!err.is_retryable());
        assert!(SyncError::UnknownMap(1).is_retryable());
    }

    #[tokio::test]
    async fn test_iterations_drain_then_idle() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(Arc::clone(&source), Arc::clone(&store)).await;
        let now = Utc::now();

        // empty store: catalog refresh, then all three zones fetched
        let state = scheduler.run_iteration(now).await.unwrap();
        assert_eq!(state, RefreshState::RefreshingZones);
        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.zone_calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            store.get_player_by_steam_id("STEAM_0:1:1").await.unwrap(),
            Some(1)
        );

        let map_stats = store.get_map_stats(12).await.unwrap().unwrap();
        assert_eq!(map_stats.soldier.zone_count, 2);
        assert_eq!(map_stats.soldier.tiers, TierMask::T4);
        assert_eq!(map_stats.demoman.tiers, TierMask::T2);

        let state = scheduler.run_iteration(now).await.unwrap();
        assert_eq!(state, RefreshState::RefreshingPlayers);

        let stats = store
            .get_player_map_stats(PlayerMap {
                player_id: 1,
                map_id: 12,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.map_name, "jump_beef");
        assert_eq!(stats.soldier.total_completion_percentage, 100);
        assert_eq!(stats.soldier.point_completion_percentage, 100);
        assert!(stats.soldier.incomplete_tiers.is_empty());
        assert_eq!(stats.demoman.incomplete_tiers, TierMask::T2);

        let state = scheduler.run_iteration(now).await.unwrap();
        assert_eq!(state, RefreshState::Idle);
        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.zone_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stale_zones_are_refetched_after_max_age() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(Arc::clone(&source), Arc::clone(&store)).await;
        let now = Utc::now();

        scheduler.run_iteration(now).await.unwrap();
        scheduler.run_iteration(now).await.unwrap();

        let later = now + chrono::Duration::hours(25);
        let state = scheduler.run_iteration(later).await.unwrap();

        assert_eq!(state, RefreshState::RefreshingZones);
        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.zone_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_zones_stale() {
        let source = Arc::new(MockSource::new());
        source.fail_zones.store(true, Ordering::SeqCst);
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(Arc::clone(&source), Arc::clone(&store)).await;
        let now = Utc::now();

        let err = scheduler.run_iteration(now).await.unwrap_err();
        assert!(matches!(err, SyncError::Pipeline(PipelineError::Fetch { .. })));
        assert!(err.is_retryable());

        let stale = store
            .get_stale_zones(now - chrono::Duration::hours(24), 10)
            .await
            .unwrap();
        assert_eq!(stale.len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_player_map_stores_incomplete_results() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(Arc::clone(&source), Arc::clone(&store)).await;
        let now = Utc::now();

        scheduler.update_maps(now).await.unwrap();
        let stored = scheduler.refresh_player_map(77, 12, now).await.unwrap();

        // map and bonus zones, two classes each; the trick zone is skipped
        assert_eq!(stored, 4);

        let stale = store.get_stale_player_maps(10).await.unwrap();
        assert_eq!(stale.len(), 1);

        let results = store.get_player_map_results(&stale).await.unwrap();
        let results = &results[&stale[0].player_map];
        assert_eq!(results.len(), 4);

        let incomplete: Vec<&PlayerClassZoneResult> =
            results.iter().filter(|r| !r.is_completed()).collect();
        assert_eq!(incomplete.len(), 2);
        assert!(incomplete
            .iter()
            .all(|r| r.class == Class::Demoman && r.rank == 0 && r.date.is_none()));
    }

    #[tokio::test]
    async fn test_refresh_unknown_map() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(source, store).await;

        let err = scheduler
            .refresh_player_map(1, 99, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownMap(99)));
    }

    #[tokio::test]
    async fn test_load_rebuilds_population() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        {
            let first = scheduler(Arc::clone(&source), Arc::clone(&store)).await;
            first.run_iteration(now).await.unwrap();
        }

        let reloaded = scheduler(source, store).await;
        let population = reloaded.population().await;
        let soldier = &population[&MapClass {
            map_id: 12,
            class: Class::Soldier,
        }];
        assert_eq!(soldier.stats.zone_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_periodic_finishes_iteration_before_shutdown() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(scheduler(Arc::clone(&source), Arc::clone(&store)).await);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        let handle = tokio::spawn(Arc::clone(&scheduler).run_periodic(shutdown_rx));
        tokio::time::timeout(Duration::from_secs(600), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(source.catalog_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.zone_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_periodic_stops_on_invalid_tier() {
        let source = Arc::new(MockSource::new());
        source.bad_tiers.store(true, Ordering::SeqCst);
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(scheduler(Arc::clone(&source), Arc::clone(&store)).await);

        // never fired: the loop has to end on its own
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(Arc::clone(&scheduler).run_periodic(shutdown_rx));
        let err = tokio::time::timeout(Duration::from_secs(3600), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, SyncError::Calculate(CalculateError::InvalidTier(_))));
        assert!(!err.is_retryable());
        assert_eq!(source.zone_calls.load(Ordering::SeqCst), 3);

        let stale = store
            .get_stale_zones(Utc::now() - chrono::Duration::hours(24), 10)
            .await
            .unwrap();
        assert_eq!(stale.len(), 3);
    }
}
