//! Bounded-concurrency fetch pipeline.
//!
//! A batch of work units is loaded into a bounded queue and drained by a
//! fixed pool of workers. Each request gets its own timeout and the whole
//! batch gets a deadline. When the deadline fires the pipeline stops waiting,
//! abandons in-flight requests, and returns whatever results already arrived.
//!
//! Batch lifecycle:
//! `Dispatching → Awaiting → Complete | PartiallyComplete | Failed`
//! where `Failed` is returned as a [`PipelineError`].

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::fetch::FetchError;
use crate::models::{Class, PlayerClassZoneResult, PlayerId, Zone, ZoneClassInfo};

use super::records::{
    PlayerZoneCompletionResponse, PlayerZoneQuery, RecordsSource, ZoneRecordsResponse, ALL_RECORDS,
};

/// Errors that fail a whole batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch {unit}: {source}")]
    Fetch {
        unit: String,
        #[source]
        source: FetchError,
    },

    #[error("Worker failed: {0}")]
    Worker(String),
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every unit produced a result
    Complete,

    /// The batch deadline fired first
    PartiallyComplete,
}

/// Results of one batch.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    pub status: BatchStatus,
    pub expected: usize,
    pub results: Vec<R>,
    pub elapsed: Duration,
}

/// Turns one work unit into one result.
#[async_trait]
pub trait BatchWorker<U>: Send + Sync + 'static
where
    U: Send + Sync + 'static,
{
    type Output: Send + 'static;

    async fn process(&self, unit: &U) -> Result<Self::Output, FetchError>;
}

/// Pool sizing and time limits for a batch.
#[derive(Debug, Clone)]
pub struct FetchPipeline {
    pub workers: usize,
    pub request_timeout: Duration,
    pub batch_deadline: Duration,
}

impl Default for FetchPipeline {
    fn default() -> Self {
        Self {
            workers: 8,
            request_timeout: Duration::from_secs(10),
            batch_deadline: Duration::from_secs(5 * 60),
        }
    }
}

impl FetchPipeline {
    pub fn new(workers: usize, request_timeout: Duration, batch_deadline: Duration) -> Self {
        Self {
            workers: workers.max(1),
            request_timeout,
            batch_deadline,
        }
    }

    /// Resolve every unit through `worker`, bounded by the batch deadline.
    ///
    /// A worker error before the deadline fails the batch. Results are
    /// returned in arrival order.
    pub async fn run<U, W>(
        &self,
        units: Vec<U>,
        worker: Arc<W>,
    ) -> Result<BatchOutcome<W::Output>, PipelineError>
    where
        U: Display + Send + Sync + 'static,
        W: BatchWorker<U>,
    {
        let start = Instant::now();
        let expected = units.len();

        if expected == 0 {
            return Ok(BatchOutcome {
                status: BatchStatus::Complete,
                expected,
                results: Vec::new(),
                elapsed: start.elapsed(),
            });
        }

        let deadline = tokio::time::Instant::now() + self.batch_deadline;
        let pool_size = self.workers.min(expected);
        debug!("Dispatching {} units to {} workers", expected, pool_size);

        let (unit_tx, unit_rx) = mpsc::channel(expected);
        for unit in units {
            unit_tx
                .try_send(unit)
                .map_err(|_| PipelineError::Worker("work queue rejected a unit".to_string()))?;
        }
        drop(unit_tx);

        let queue = Arc::new(Mutex::new(unit_rx));
        let (result_tx, mut result_rx) = mpsc::channel(expected);

        let handles: Vec<JoinHandle<()>> = (0..pool_size)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let result_tx = result_tx.clone();
                let worker = Arc::clone(&worker);
                let request_timeout = self.request_timeout;

                tokio::spawn(async move {
                    loop {
                        let next = queue.lock().await.recv().await;
                        let Some(unit) = next else {
                            break;
                        };

                        let result =
                            match tokio::time::timeout(request_timeout, worker.process(&unit)).await
                            {
                                Ok(Ok(output)) => Ok(output),
                                Ok(Err(source)) => Err(PipelineError::Fetch {
                                    unit: unit.to_string(),
                                    source,
                                }),
                                Err(_) => Err(PipelineError::Fetch {
                                    unit: unit.to_string(),
                                    source: FetchError::Timeout(request_timeout),
                                }),
                            };

                        let failed = result.is_err();
                        if result_tx.send(result).await.is_err() || failed {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(result_tx);

        debug!("Awaiting {} results", expected);
        let mut results = Vec::with_capacity(expected);

        let status = loop {
            if results.len() == expected {
                break BatchStatus::Complete;
            }

            match tokio::time::timeout_at(deadline, result_rx.recv()).await {
                Ok(Some(Ok(output))) => results.push(output),
                Ok(Some(Err(e))) => {
                    abort_all(&handles);
                    error!("Batch failed after {} of {} results: {}", results.len(), expected, e);
                    return Err(e);
                }
                Ok(None) => {
                    abort_all(&handles);
                    return Err(PipelineError::Worker(format!(
                        "workers exited after {} of {} results",
                        results.len(),
                        expected
                    )));
                }
                Err(_) => {
                    warn!(
                        "Batch deadline of {:?} reached with {} of {} results",
                        self.batch_deadline,
                        results.len(),
                        expected
                    );
                    break BatchStatus::PartiallyComplete;
                }
            }
        };

        abort_all(&handles);

        let elapsed = start.elapsed();
        info!("Found {} results in {:?}", results.len(), elapsed);

        Ok(BatchOutcome {
            status,
            expected,
            results,
            elapsed,
        })
    }
}

fn abort_all(handles: &[JoinHandle<()>]) {
    for handle in handles {
        handle.abort();
    }
}

// ── Zone records ────────────────────────────────────────────────────────────

/// Everything learned from one zone leaderboard.
#[derive(Debug, Clone)]
pub struct ZoneFetchResult {
    /// The zone as requested
    pub zone: Zone,
    pub soldier: ZoneClassInfo,
    pub demoman: ZoneClassInfo,
    pub results: Vec<PlayerClassZoneResult>,
    pub steam_ids: HashMap<String, PlayerId>,
}

impl ZoneFetchResult {
    pub fn class_info(&self) -> [&ZoneClassInfo; 2] {
        [&self.soldier, &self.demoman]
    }
}

fn unix_date(seconds: f64) -> Option<DateTime<Utc>> {
    if seconds <= 0.0 {
        return None;
    }
    Utc.timestamp_opt(seconds as i64, 0).single()
}

/// Convert a leaderboard into results and population metadata.
///
/// The reported completion count wins over the number of records returned;
/// a mismatch is logged.
pub fn zone_results_from_response(
    zone: &Zone,
    response: &ZoneRecordsResponse,
    updated: DateTime<Utc>,
) -> ZoneFetchResult {
    let info = &response.zone_info;
    let custom_name = info.custom_name.clone().unwrap_or_default();

    let mut results = Vec::new();
    let mut steam_ids = HashMap::new();
    let mut class_info = Vec::with_capacity(Class::ALL.len());

    for class in Class::ALL {
        let records = response.results.get(class);
        let completions = response.completion_info.get(class);
        let tier = response.tier_info.get(class);

        if records.len() as u64 != u64::from(completions) {
            warn!(
                "Zone {} expects {} {} completions, found {}",
                zone,
                completions,
                class,
                records.len()
            );
        }

        for record in records {
            let player_id = record.player_info.id;
            results.push(PlayerClassZoneResult {
                player_id,
                map_id: info.map_id,
                map_name: zone.map_name.clone(),
                kind: info.kind,
                index: info.zoneindex,
                class,
                custom_name: custom_name.clone(),
                tier,
                updated,
                rank: record.rank,
                duration: record.duration,
                date: unix_date(record.date),
                completions,
            });
            steam_ids.insert(record.steamid.clone(), player_id);
        }

        class_info.push(ZoneClassInfo {
            map_id: info.map_id,
            map_name: zone.map_name.clone(),
            kind: info.kind,
            index: info.zoneindex,
            class,
            custom_name: custom_name.clone(),
            tier,
            completions,
        });
    }

    let demoman = class_info.pop().unwrap_or_else(|| empty_info(zone, Class::Demoman));
    let soldier = class_info.pop().unwrap_or_else(|| empty_info(zone, Class::Soldier));

    ZoneFetchResult {
        zone: zone.clone(),
        soldier,
        demoman,
        results,
        steam_ids,
    }
}

fn empty_info(zone: &Zone, class: Class) -> ZoneClassInfo {
    ZoneClassInfo {
        map_id: zone.map_id,
        map_name: zone.map_name.clone(),
        kind: zone.kind,
        index: zone.index,
        class,
        custom_name: String::new(),
        tier: 0,
        completions: 0,
    }
}

/// Fetches full leaderboards for stale zones.
pub struct ZoneRecordsWorker {
    source: Arc<dyn RecordsSource>,
    updated: DateTime<Utc>,
}

impl ZoneRecordsWorker {
    pub fn new(source: Arc<dyn RecordsSource>, updated: DateTime<Utc>) -> Self {
        Self { source, updated }
    }
}

#[async_trait]
impl BatchWorker<Zone> for ZoneRecordsWorker {
    type Output = ZoneFetchResult;

    async fn process(&self, zone: &Zone) -> Result<ZoneFetchResult, FetchError> {
        let response = self.source.zone_records(zone.key(), ALL_RECORDS).await?;
        Ok(zone_results_from_response(zone, &response, self.updated))
    }
}

// ── Player zone completion ──────────────────────────────────────────────────

/// Convert a single-player lookup into a result. No record means incomplete.
pub fn player_result_from_response(
    query: &PlayerZoneQuery,
    response: &PlayerZoneCompletionResponse,
    updated: DateTime<Utc>,
) -> PlayerClassZoneResult {
    let info = &response.zone_info;
    let (rank, duration, date) = match &response.result {
        Some(record) => (record.rank, record.duration, unix_date(record.date)),
        None => (0, 0.0, None),
    };

    PlayerClassZoneResult {
        player_id: query.player_id,
        map_id: info.map_id,
        map_name: query.map_name.clone(),
        kind: info.kind,
        index: info.zoneindex,
        class: query.class,
        custom_name: info.custom_name.clone().unwrap_or_default(),
        tier: response.tier_info.get(query.class),
        updated,
        rank,
        duration,
        date,
        completions: response.completion_info.get(query.class),
    }
}

/// Fetches one player's state for individual zones.
pub struct PlayerZoneWorker {
    source: Arc<dyn RecordsSource>,
    updated: DateTime<Utc>,
}

impl PlayerZoneWorker {
    pub fn new(source: Arc<dyn RecordsSource>, updated: DateTime<Utc>) -> Self {
        Self { source, updated }
    }
}

#[async_trait]
impl BatchWorker<PlayerZoneQuery> for PlayerZoneWorker {
    type Output = PlayerClassZoneResult;

    async fn process(&self, query: &PlayerZoneQuery) -> Result<PlayerClassZoneResult, FetchError> {
        let response = self.source.player_zone_completion(query).await?;
        Ok(player_result_from_response(query, &response, self.updated))
    }
}
