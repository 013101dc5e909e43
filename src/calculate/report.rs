//! Per-player completion reports with rank bonuses.

use std::collections::HashMap;

use crate::models::{
    Class, MapId, PlayerClassMapResultStats, PlayerClassZoneResult,
    PlayerMapResultStats, TierMask,
};

use super::{percentage, point_value, rank_bonus, CalculateError};

/// Build one report per map from a player's joined zone results.
///
/// Each input row is one ranked-or-not zone for one class; rows without a
/// finished run (`duration == 0`) still count toward the totals. When
/// `hide_completed` is set, finished zones are counted but left out of the
/// listed `results`. Maps come back sorted by name.
pub fn aggregate_map_result_stats(
    results: Vec<PlayerClassZoneResult>,
    hide_completed: bool,
) -> Result<Vec<PlayerMapResultStats>, CalculateError> {
    let mut maps: HashMap<MapId, PlayerMapResultStats> = HashMap::new();

    for result in results {
        if !result.is_ranked() {
            continue;
        }

        let mask = TierMask::from_tier(result.tier)?;
        let points = point_value(result.tier, result.kind);

        let map = maps.entry(result.map_id).or_insert_with(|| PlayerMapResultStats {
            map_id: result.map_id,
            map_name: result.map_name.clone(),
            ..Default::default()
        });
        let stats = map.class_mut(result.class);

        if stats.zones_total == 0 {
            stats.most_popular_completions = result.completions;
            stats.least_popular_completions = result.completions;
        } else {
            stats.most_popular_completions = stats.most_popular_completions.max(result.completions);
            stats.least_popular_completions =
                stats.least_popular_completions.min(result.completions);
        }

        stats.zones_total += 1;
        stats.points_total += points;
        stats.completions_count += result.completions;
        stats.tiers.set(mask);

        let completed = result.is_completed();
        if completed {
            stats.zones_finished += 1;
            stats.points_finished += points;
            stats.rank_points += rank_bonus(result.tier, result.kind, result.rank);
        }

        if !(hide_completed && completed) {
            stats.results.push(result);
        }
    }

    let mut out: Vec<PlayerMapResultStats> = maps.into_values().collect();
    for map in &mut out {
        for class in Class::ALL {
            finish_percentages(map.class_mut(class));
        }
    }
    out.sort_by(|a, b| a.map_name.cmp(&b.map_name).then(a.map_id.cmp(&b.map_id)));

    Ok(out)
}

fn finish_percentages(stats: &mut PlayerClassMapResultStats) {
    stats.points_finished_percentage = percentage(stats.points_finished, stats.points_total);
    stats.zones_finished_percentage = percentage(stats.zones_finished, stats.zones_total);
}
