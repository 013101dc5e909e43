//! Point value and top-10 rank bonus tables.
//!
//! Both tables are keyed by `(tier, zone kind)` and built once on first use.
//! Trick zones and tier 0 are absent from both and yield nothing.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::models::ZoneKind;

/// Placements that earn a rank bonus.
pub const RANK_BONUS_PLACES: usize = 10;

type PointKey = (u8, ZoneKind);

static POINT_VALUES: Lazy<HashMap<PointKey, u32>> = Lazy::new(|| {
    let rows: [(u8, [u32; 3]); 6] = [
        // tier, [bonus, course, map]
        (1, [2, 5, 10]),
        (2, [5, 10, 20]),
        (3, [10, 20, 30]),
        (4, [20, 30, 50]),
        (5, [30, 50, 100]),
        (6, [50, 100, 200]),
    ];

    let mut table = HashMap::with_capacity(18);
    for (tier, [bonus, course, map]) in rows {
        table.insert((tier, ZoneKind::Bonus), bonus);
        table.insert((tier, ZoneKind::Course), course);
        table.insert((tier, ZoneKind::Map), map);
    }
    table
});

static RANK_BONUSES: Lazy<HashMap<PointKey, [u32; RANK_BONUS_PLACES]>> = Lazy::new(|| {
    let rows: [(u8, ZoneKind, [u32; RANK_BONUS_PLACES]); 18] = [
        (1, ZoneKind::Bonus, [2, 2, 1, 1, 1, 1, 1, 0, 0, 0]),
        (2, ZoneKind::Bonus, [5, 4, 3, 3, 2, 2, 1, 1, 1, 1]),
        (3, ZoneKind::Bonus, [10, 8, 6, 5, 4, 3, 3, 2, 2, 1]),
        (4, ZoneKind::Bonus, [20, 15, 12, 10, 8, 6, 5, 4, 3, 2]),
        (5, ZoneKind::Bonus, [30, 23, 18, 15, 12, 9, 8, 6, 5, 3]),
        (6, ZoneKind::Bonus, [50, 38, 30, 25, 20, 15, 13, 10, 8, 5]),
        (1, ZoneKind::Course, [5, 4, 3, 3, 2, 2, 1, 1, 1, 1]),
        (2, ZoneKind::Course, [10, 8, 6, 5, 4, 3, 3, 2, 2, 1]),
        (3, ZoneKind::Course, [20, 15, 12, 10, 8, 6, 5, 4, 3, 2]),
        (4, ZoneKind::Course, [30, 23, 18, 15, 12, 9, 8, 6, 5, 3]),
        (5, ZoneKind::Course, [50, 38, 30, 25, 20, 15, 13, 10, 8, 5]),
        (6, ZoneKind::Course, [100, 75, 60, 50, 40, 30, 25, 20, 15, 10]),
        (1, ZoneKind::Map, [10, 8, 6, 5, 4, 3, 3, 2, 2, 1]),
        (2, ZoneKind::Map, [20, 15, 12, 10, 8, 6, 5, 4, 3, 2]),
        (3, ZoneKind::Map, [30, 23, 18, 15, 12, 9, 8, 6, 5, 3]),
        (4, ZoneKind::Map, [50, 38, 30, 25, 20, 15, 13, 10, 8, 5]),
        (5, ZoneKind::Map, [100, 75, 60, 50, 40, 30, 25, 20, 15, 10]),
        (6, ZoneKind::Map, [200, 150, 120, 100, 80, 60, 50, 40, 30, 20]),
    ];

    rows.into_iter()
        .map(|(tier, kind, bonuses)| ((tier, kind), bonuses))
        .collect()
});

/// Points awarded for finishing a zone of this tier and kind.
pub fn point_value(tier: u8, kind: ZoneKind) -> u32 {
    POINT_VALUES.get(&(tier, kind)).copied().unwrap_or(0)
}

/// Bonus points for finishing at `rank` (1-based). Ranks past 10 earn nothing.
pub fn rank_bonus(tier: u8, kind: ZoneKind, rank: u32) -> u32 {
    if rank == 0 || rank as usize > RANK_BONUS_PLACES {
        return 0;
    }

    RANK_BONUSES
        .get(&(tier, kind))
        .map(|bonuses| bonuses[rank as usize - 1])
        .unwrap_or(0)
}

/// The full bonus schedule for a tier and kind, if it has one.
pub fn rank_bonus_schedule(tier: u8, kind: ZoneKind) -> Option<&'static [u32; RANK_BONUS_PLACES]> {
    RANK_BONUSES.get(&(tier, kind))
}
