//! # Track data model and column mapping
//!
//! A [`Track`] is one reconstructed cyclone trajectory: an ordered sequence
//! of point records held as parallel per-field sequences, the layout the
//! rest of the crate (gap filler, overlap matcher, rewriter, archiver)
//! operates on.
//!
//! ## Data model
//! -----------------
//! - `steps` — integer time-step indices relative to a reference series,
//!   strictly increasing by 1 once parsing (and gap filling) has finished.
//! - `lon`/`lat` — degrees; longitudes normalized to `[0, 360)`.
//! - `times` — per-point [`TrackTime`] calendar timestamps.
//! - `grid_x`/`grid_y` — optional source-grid coordinates. Stored as `f64`
//!   because gap filling may continue them fractionally off-grid.
//! - `aux` — zero or more auxiliary variable columns (pressure, wind speed,
//!   …), each a scalar or a fixed-length profile per point.
//!
//! The declared `length` is the point count promised by the file header; it
//! is retained verbatim and may be smaller than the stored point count after
//! gap filling inserts interpolated records.
//!
//! ## Column maps
//! -----------------
//! The stitched text format has no fixed schema: callers targeting different
//! TempestExtremes configurations supply a [`ColumnMap`] naming each column
//! position. Negative positions count back from the end of the row, which is
//! how the date columns are conventionally addressed (`year` = -4 … `hour` =
//! -1). [`ColumnMap::legacy`] reproduces the fixed layout early versions of
//! the pipeline hard-coded.

use std::collections::HashMap;

use crate::calendar::TrackTime;
use crate::constants::{Degree, StepIndex, POSITION_FIELDS};
use crate::track_errors::TrackError;

/// One per-point value of an auxiliary variable.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackValue {
    Scalar(f64),
    /// Fixed-length numeric sequence (e.g. a radial profile).
    Profile(Vec<f64>),
}

impl TrackValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            TrackValue::Scalar(v) => Some(*v),
            TrackValue::Profile(_) => None,
        }
    }
}

/// One reconstructed storm trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Point count declared by the header line. Kept as declared; gap
    /// filling can make the stored sequences longer.
    pub length: usize,
    pub steps: Vec<StepIndex>,
    pub grid_x: Option<Vec<f64>>,
    pub grid_y: Option<Vec<f64>>,
    pub lon: Vec<Degree>,
    pub lat: Vec<Degree>,
    pub times: Vec<TrackTime>,
    /// Auxiliary variable columns keyed by field name. All value vectors
    /// stay in lock-step with the position sequences.
    pub aux: HashMap<String, Vec<TrackValue>>,
}

impl Track {
    /// Create an empty track with the given declared length, allocating the
    /// auxiliary sequences and (optionally) the grid sequences up front so
    /// every per-point push keeps the parallel-length invariant.
    pub fn new<'a, I>(length: usize, aux_fields: I, with_grid: bool) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let aux = aux_fields
            .into_iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        Track {
            length,
            steps: Vec::new(),
            grid_x: with_grid.then(Vec::new),
            grid_y: with_grid.then(Vec::new),
            lon: Vec::new(),
            lat: Vec::new(),
            times: Vec::new(),
            aux,
        }
    }

    /// Number of points actually stored (post gap-fill), as opposed to the
    /// declared [`Track::length`].
    pub fn n_points(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_grid(&self) -> bool {
        self.grid_x.is_some() && self.grid_y.is_some()
    }

    pub fn first_time(&self) -> Option<TrackTime> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<TrackTime> {
        self.times.last().copied()
    }

    /// Index of the point carrying timestamp `time`, if any.
    pub fn index_of_time(&self, time: TrackTime) -> Option<usize> {
        self.times.iter().position(|t| *t == time)
    }

    /// Append one point to every sequence. `grid` must be `Some` exactly
    /// when the track carries grid coordinates, and `aux` must cover every
    /// auxiliary field the track was created with.
    pub(crate) fn push_point(
        &mut self,
        step: StepIndex,
        grid: Option<(f64, f64)>,
        lon: Degree,
        lat: Degree,
        time: TrackTime,
        aux: &HashMap<String, TrackValue>,
    ) -> Result<(), TrackError> {
        if let Some(missing) = self.aux.keys().find(|name| !aux.contains_key(*name)) {
            return Err(TrackError::MissingColumn(missing.clone()));
        }
        for (name, values) in self.aux.iter_mut() {
            values.push(aux[name].clone());
        }
        if let (Some(gx), Some(gy)) = (self.grid_x.as_mut(), self.grid_y.as_mut()) {
            let (x, y) = grid.ok_or_else(|| TrackError::MissingColumn("grid_x".to_string()))?;
            gx.push(x);
            gy.push(y);
        }
        self.steps.push(step);
        self.lon.push(lon);
        self.lat.push(lat);
        self.times.push(time);
        Ok(())
    }
}

/// Mapping from field name to its whitespace-delimited column position in a
/// detail row. Negative positions count from the end of the row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    columns: HashMap<String, i64>,
}

impl ColumnMap {
    pub fn new(columns: HashMap<String, i64>) -> Self {
        ColumnMap { columns }
    }

    /// The fixed layout of early pipeline versions: no grid columns,
    /// `lon`/`lat` in columns 2 and 3, date fields in the last four columns.
    /// Kept as a compatibility mode for callers without an explicit map.
    pub fn legacy() -> Self {
        ColumnMap::new(HashMap::from([
            ("lon".to_string(), 2),
            ("lat".to_string(), 3),
            ("year".to_string(), -4),
            ("month".to_string(), -3),
            ("day".to_string(), -2),
            ("hour".to_string(), -1),
        ]))
    }

    pub fn position(&self, field: &str) -> Option<i64> {
        self.columns.get(field).copied()
    }

    pub fn require(&self, field: &str) -> Result<i64, TrackError> {
        self.position(field)
            .ok_or_else(|| TrackError::MissingColumn(field.to_string()))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.columns.contains_key(field)
    }

    /// Number of columns named by the map. Rendering a line requires the map
    /// to cover every column of the row.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Auxiliary (non-position) field names, ordered by column position so
    /// iteration order matches the row layout. Negative positions sort after
    /// non-negative ones, mirroring their place at the end of the row.
    pub fn aux_fields(&self) -> Vec<&str> {
        let mut fields: Vec<(&str, i64)> = self
            .columns
            .iter()
            .filter(|(name, _)| !POSITION_FIELDS.contains(&name.as_str()))
            .map(|(name, pos)| (name.as_str(), *pos))
            .collect();
        fields.sort_by_key(|(_, pos)| (*pos < 0, *pos));
        fields.into_iter().map(|(name, _)| name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.columns.iter().map(|(name, pos)| (name.as_str(), *pos))
    }
}

/// Resolve a possibly negative column position against a row of `row_len`
/// tokens.
pub fn resolve_column(position: i64, row_len: usize) -> Option<usize> {
    let idx = if position < 0 {
        position + row_len as i64
    } else {
        position
    };
    (0..row_len as i64).contains(&idx).then_some(idx as usize)
}
