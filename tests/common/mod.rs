use std::collections::HashMap;

use tempest_tracks::calendar::{Calendar, TrackTime};
use tempest_tracks::reference::ReferenceSeries;
use tempest_tracks::track::ColumnMap;

/// Column layout used by the gridded test fixtures: grid cell, position,
/// sea-level pressure, surface wind, then the four trailing date columns.
pub fn gridded_map() -> ColumnMap {
    ColumnMap::new(HashMap::from([
        ("grid_x".to_string(), 0),
        ("grid_y".to_string(), 1),
        ("lon".to_string(), 2),
        ("lat".to_string(), 3),
        ("slp".to_string(), 4),
        ("sfcWind".to_string(), 5),
        ("year".to_string(), -4),
        ("month".to_string(), -3),
        ("day".to_string(), -2),
        ("hour".to_string(), -1),
    ]))
}

/// Six-hourly standard-calendar reference axis starting at the given date.
pub fn reference_from(year: i32, month: u32, day: u32) -> ReferenceSeries {
    ReferenceSeries::new(vec![TrackTime::new(year, month, day, 0)], Calendar::Standard).unwrap()
}
