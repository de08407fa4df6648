//! # Constants and type definitions for tempest-tracks
//!
//! Centralizes the shared conversion factors, the TempestExtremes text-format
//! sentinel, and the type aliases used across the crate.

/// Token opening a header line in TempestExtremes stitched output.
pub const HEADER_DELIM: &str = "start";

/// Number of hours in a day (every supported calendar keeps 24-hour days).
pub const HOURS_PER_DAY: i64 = 24;

/// Angle in degrees.
pub type Degree = f64;

/// Integer index of a time point relative to a reference series (step 1 is
/// the series' first entry).
pub type StepIndex = i64;

/// Position fields a [`ColumnMap`](crate::track::ColumnMap) may carry, as
/// opposed to auxiliary variable columns. `grid_x`/`grid_y` are optional and
/// tool-dependent; the remaining six are mandatory.
pub const POSITION_FIELDS: [&str; 8] = [
    "grid_x", "grid_y", "lon", "lat", "year", "month", "day", "hour",
];

/// The mandatory subset of [`POSITION_FIELDS`].
pub const REQUIRED_POSITION_FIELDS: [&str; 6] = ["lon", "lat", "year", "month", "day", "hour"];
