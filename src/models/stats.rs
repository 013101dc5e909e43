//! Derived statistics models.

use serde::{Deserialize, Serialize};

use super::{Class, MapId, PlayerClassZoneResult, TierMask, TIER_COUNT};

/// Population-level aggregate for a (map, class).
///
/// This is the denominator for every player-level percentage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapClassStats {
    pub zone_count: u32,
    pub points_total: u32,
    pub tiers: TierMask,
    pub tier_points_total: [u32; TIER_COUNT],
}

/// Population stats for a (map, class) along with the map name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapClassStatsInfo {
    pub map_name: String,
    pub stats: MapClassStats,
}

/// Population stats for both classes of one map, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStatsInfo {
    pub map_name: String,
    pub soldier: MapClassStats,
    pub demoman: MapClassStats,
}

impl MapStatsInfo {
    pub fn class(&self, class: Class) -> &MapClassStats {
        match class {
            Class::Soldier => &self.soldier,
            Class::Demoman => &self.demoman,
        }
    }

    pub fn class_mut(&mut self, class: Class) -> &mut MapClassStats {
        match class {
            Class::Soldier => &mut self.soldier,
            Class::Demoman => &mut self.demoman,
        }
    }
}

/// Per-player, per-map, per-class progress summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerClassMapStats {
    pub total_completion_percentage: u8,
    pub point_completion_percentage: u8,

    /// Tiers that have ranked zones on this map
    pub tiers: TierMask,

    /// Tiers with at least one unfinished zone; always a subset of `tiers`
    pub incomplete_tiers: TierMask,

    pub total_points_available: u32,

    /// Points still outstanding per tier
    pub points_available_by_tier: [u32; TIER_COUNT],
}

/// Both classes' stats for one (player, map).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMapStats {
    pub map_id: MapId,
    pub map_name: String,
    pub soldier: PlayerClassMapStats,
    pub demoman: PlayerClassMapStats,
}

impl PlayerMapStats {
    pub fn class_mut(&mut self, class: Class) -> &mut PlayerClassMapStats {
        match class {
            Class::Soldier => &mut self.soldier,
            Class::Demoman => &mut self.demoman,
        }
    }
}

/// Completion report for one class of one map, as seen by one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerClassMapResultStats {
    pub points_total: u32,
    pub zones_total: u32,
    pub points_finished: u32,
    pub zones_finished: u32,
    pub points_finished_percentage: u8,
    pub zones_finished_percentage: u8,

    /// Highest population completion count among the map's zones
    pub most_popular_completions: u32,

    /// Lowest population completion count among the map's zones
    pub least_popular_completions: u32,

    /// Sum of population completions across the map's zones
    pub completions_count: u32,

    /// Top-10 placement bonus earned on this map
    pub rank_points: u32,

    pub tiers: TierMask,
    pub results: Vec<PlayerClassZoneResult>,
}

/// Completion report for both classes of one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMapResultStats {
    pub map_id: MapId,
    pub map_name: String,
    pub soldier: PlayerClassMapResultStats,
    pub demoman: PlayerClassMapResultStats,
}

impl PlayerMapResultStats {
    pub fn class_mut(&mut self, class: Class) -> &mut PlayerClassMapResultStats {
        match class {
            Class::Soldier => &mut self.soldier,
            Class::Demoman => &mut self.demoman,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_class_map_stats_default_is_zero() {
        let stats = PlayerClassMapStats::default();
        assert_eq!(stats.total_completion_percentage, 0);
        assert_eq!(stats.point_completion_percentage, 0);
        assert!(stats.tiers.is_empty());
        assert!(stats.incomplete_tiers.is_empty());
        assert_eq!(stats.points_available_by_tier, [0; TIER_COUNT]);
    }

    #[test]
    fn test_map_stats_info_class_access() {
        let mut info = MapStatsInfo::default();
        info.class_mut(Class::Demoman).zone_count = 4;

        assert_eq!(info.class(Class::Demoman).zone_count, 4);
        assert_eq!(info.class(Class::Soldier).zone_count, 0);
    }

    #[test]
    fn test_player_map_stats_serialization() {
        let mut stats = PlayerMapStats {
            map_id: 7,
            map_name: "jump_four".to_string(),
            ..Default::default()
        };
        stats.soldier.tiers = TierMask::T4;

        let json = serde_json::to_string(&stats).unwrap();
        let parsed: PlayerMapStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }
}
