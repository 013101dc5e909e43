//! Completion aggregation engine.
//!
//! Turns raw zone-completion records into tier-weighted progress statistics:
//! - Population baselines per (map, class) from zone-class info
//! - Per-player, per-map, per-class progress against those baselines
//! - Rank-aware completion reports (see [`report`])
//!
//! Nothing here performs I/O. The only failure is a tier outside 1..=6 on a
//! ranked zone, which means upstream data is corrupt.

pub mod points;
pub mod report;

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::models::{
    tier_index, Class, InvalidTier, MapClass, MapClassStats, MapClassStatsInfo, MapId,
    MapStatsInfo, PlayerClassMapStats, PlayerClassZoneResult, PlayerMap, PlayerMapStats,
    TierMask, ZoneClassInfo, TIER_COUNT,
};

pub use points::{point_value, rank_bonus};
pub use report::aggregate_map_result_stats;

/// Errors raised by aggregation.
#[derive(Debug, Error)]
pub enum CalculateError {
    #[error("Aggregation input is corrupt: {0}")]
    InvalidTier(#[from] InvalidTier),
}

/// `floor(100 * part / whole)`, clamped to 100. A zero `whole` yields 0.
pub fn percentage(part: u32, whole: u32) -> u8 {
    if whole == 0 {
        return 0;
    }

    let pct = (u64::from(part) * 100) / u64::from(whole);
    pct.min(100) as u8
}

/// Aggregate one player's results for one (map, class) against the population.
///
/// Only finished results (`duration > 0`) acquire points. Points acquired on a
/// zone are removed from that tier's outstanding total, and any tier with
/// points left over is flagged incomplete. A tier can therefore be incomplete
/// even though some of its zones were earned.
pub fn aggregate_player_map_class(
    results: &[PlayerClassZoneResult],
    population: &MapClassStats,
) -> Result<PlayerClassMapStats, CalculateError> {
    if population.points_total == 0 {
        return Ok(PlayerClassMapStats::default());
    }

    let mut remaining = population.tier_points_total;
    let mut points_acquired = 0u32;
    let mut zones_finished = 0u32;

    for result in results {
        if !result.is_ranked() {
            continue;
        }

        let slot = tier_index(result.tier)?;

        if !result.is_completed() {
            continue;
        }

        let points = point_value(result.tier, result.kind);
        remaining[slot] = remaining[slot].saturating_sub(points);
        points_acquired += points;
        zones_finished += 1;
    }

    let mut incomplete_tiers = TierMask::EMPTY;
    for (slot, points) in remaining.iter().enumerate() {
        if *points > 0 {
            incomplete_tiers.set(TierMask::from_tier(slot as u8 + 1)?);
        }
    }

    Ok(PlayerClassMapStats {
        total_completion_percentage: percentage(zones_finished, population.zone_count),
        point_completion_percentage: percentage(points_acquired, population.points_total),
        tiers: population.tiers,
        incomplete_tiers: incomplete_tiers & population.tiers,
        total_points_available: population.points_total,
        points_available_by_tier: remaining,
    })
}

/// Build population baselines for every (map, class) from the full zone-class table.
///
/// Unranked (tier 0) and trick zones are skipped. A (map, class) with no
/// ranked zones has no entry.
pub fn aggregate_map_stats(
    infos: &[ZoneClassInfo],
) -> Result<HashMap<MapClass, MapClassStatsInfo>, CalculateError> {
    let mut stats: HashMap<MapClass, MapClassStatsInfo> = HashMap::new();

    for info in infos {
        if !info.is_ranked() {
            continue;
        }

        let slot = tier_index(info.tier)?;
        let mask = TierMask::from_tier(info.tier)?;
        let points = point_value(info.tier, info.kind);

        let key = MapClass {
            map_id: info.map_id,
            class: info.class,
        };
        let entry = stats.entry(key).or_insert_with(|| MapClassStatsInfo {
            map_name: info.map_name.clone(),
            stats: MapClassStats::default(),
        });

        entry.stats.zone_count += 1;
        entry.stats.points_total += points;
        entry.stats.tier_points_total[slot] += points;
        entry.stats.tiers.set(mask);
    }

    debug!("Aggregated population stats for {} map classes", stats.len());
    Ok(stats)
}

/// Fold per-class population stats into per-map records for persistence.
pub fn collect_map_stats_info(
    stats: &HashMap<MapClass, MapClassStatsInfo>,
) -> HashMap<MapId, MapStatsInfo> {
    let mut maps: HashMap<MapId, MapStatsInfo> = HashMap::new();

    for (key, info) in stats {
        let entry = maps.entry(key.map_id).or_default();
        entry.map_name = info.map_name.clone();
        *entry.class_mut(key.class) = info.stats.clone();
    }

    maps
}

/// Compute fresh stats for each stale (player, map) from its stored results.
///
/// A class whose population baseline is missing gets zero-valued stats.
pub fn calculate_player_map_stats(
    player_map_results: &HashMap<PlayerMap, Vec<PlayerClassZoneResult>>,
    population: &HashMap<MapClass, MapClassStatsInfo>,
) -> Result<HashMap<PlayerMap, PlayerMapStats>, CalculateError> {
    let mut out = HashMap::with_capacity(player_map_results.len());

    for (player_map, results) in player_map_results {
        let mut stats = PlayerMapStats {
            map_id: player_map.map_id,
            map_name: results
                .first()
                .map(|r| r.map_name.clone())
                .unwrap_or_default(),
            ..Default::default()
        };

        for class in Class::ALL {
            let key = MapClass {
                map_id: player_map.map_id,
                class,
            };

            let Some(info) = population.get(&key) else {
                debug!("No population stats for map {} {}", key.map_id, class);
                continue;
            };

            stats.map_name = info.map_name.clone();

            let class_results: Vec<PlayerClassZoneResult> = results
                .iter()
                .filter(|r| r.class == class)
                .cloned()
                .collect();

            *stats.class_mut(class) = aggregate_player_map_class(&class_results, &info.stats)?;
        }

        out.insert(*player_map, stats);
    }

    Ok(out)
}
