//! # Stitched track-file parser
//!
//! Reads the line-oriented text format produced by the external tracking
//! tool into [`Track`] records.
//!
//! ## Input format
//! -----------------
//! A header line opens each track: the sentinel token (`start`), the
//! declared point count, then the nominal start date. It is followed by that
//! many whitespace-delimited detail lines (surplus lines are tolerated and
//! ignored); the caller-supplied [`ColumnMap`] names each column. Auxiliary
//! columns may hold either a scalar or a bracketed comma-separated profile
//! (`[v1,v2,…]`, optionally quoted), detected by the leading character.
//!
//! ## Gap repair
//! -----------------
//! Each point's step index comes from the [`ReferenceSeries`]; whenever the
//! index jumps by more than one the [gap filler](crate::gap_filling) is
//! invoked first, so a finished track is always step-contiguous.
//!
//! ## Error semantics
//! -----------------
//! The column map is validated before any line is read
//! ([`TrackError::MissingColumn`]); structural and numeric failures surface
//! as [`TrackError::MalformedTrackFile`] with the path, line number and
//! offending field, aborting the parse of that file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use camino::Utf8Path;
use log::debug;

use crate::calendar::TrackTime;
use crate::constants::{HEADER_DELIM, REQUIRED_POSITION_FIELDS};
use crate::gap_filling::fill_gap;
use crate::reference::ReferenceSeries;
use crate::track::{resolve_column, ColumnMap, Track, TrackValue};
use crate::track_errors::TrackError;

/// Load every track from a stitched track file.
///
/// Arguments
/// -----------------
/// * `path` — file produced by the external tracking tool.
/// * `reference` — time axis of the data the tracking was run on.
/// * `period_hours` — tracking period between consecutive time points.
/// * `column_map` — field-name to column-position mapping for detail rows.
pub fn load_tracks(
    path: &Utf8Path,
    reference: &ReferenceSeries,
    period_hours: i64,
    column_map: &ColumnMap,
) -> Result<Vec<Track>, TrackError> {
    debug!("loading tracks from {path}");
    let file = File::open(path.as_std_path())?;
    parse_tracks(
        BufReader::new(file).lines(),
        path.as_str(),
        reference,
        period_hours,
        column_map,
    )
}

/// Parse stitched-track lines from any line source. `source` labels the
/// origin (usually a path) in error messages.
pub fn parse_tracks<I>(
    lines: I,
    source: &str,
    reference: &ReferenceSeries,
    period_hours: i64,
    column_map: &ColumnMap,
) -> Result<Vec<Track>, TrackError>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    validate_column_map(column_map)?;
    let aux_fields = column_map.aux_fields();
    let with_grid = column_map.contains("grid_x");

    let mut tracks: Vec<Track> = Vec::new();
    let mut declared = 0usize;
    let mut seen = 0usize;

    for (index, line) in lines.into_iter().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        if tokens[0] == HEADER_DELIM {
            finish_track(tracks.last(), declared, seen, source, line_no)?;
            declared = tokens
                .get(1)
                .and_then(|t| t.parse::<usize>().ok())
                .ok_or_else(|| malformed(source, line_no, "header has no parseable point count"))?;
            seen = 0;
            tracks.push(Track::new(declared, aux_fields.iter().copied(), with_grid));
            continue;
        }

        let track = tracks
            .last_mut()
            .ok_or_else(|| malformed(source, line_no, "data line before any header"))?;
        if seen >= declared {
            // Tolerated surplus beyond the declared count.
            seen += 1;
            continue;
        }
        seen += 1;

        let field = |name: &str| -> Result<&str, TrackError> {
            let pos = column_map.require(name)?;
            let idx = resolve_column(pos, tokens.len()).ok_or_else(|| {
                malformed(
                    source,
                    line_no,
                    &format!(
                        "column {pos} for '{name}' outside {}-column row",
                        tokens.len()
                    ),
                )
            })?;
            Ok(tokens[idx])
        };
        let float_field = |name: &str| -> Result<f64, TrackError> {
            let token = field(name)?;
            token
                .parse::<f64>()
                .map_err(|_| malformed(source, line_no, &format!("invalid {name} value '{token}'")))
        };
        let int_field = |name: &str| -> Result<i64, TrackError> {
            let token = field(name)?;
            token
                .parse::<i64>()
                .map_err(|_| malformed(source, line_no, &format!("invalid {name} value '{token}'")))
        };

        let lon = float_field("lon")?.rem_euclid(360.0);
        let lat = float_field("lat")?;
        let time = TrackTime::new(
            int_field("year")? as i32,
            int_field("month")? as u32,
            int_field("day")? as u32,
            int_field("hour")? as u32,
        );
        let grid = if with_grid {
            Some((float_field("grid_x")?, float_field("grid_y")?))
        } else {
            None
        };

        let mut aux: HashMap<String, TrackValue> = HashMap::new();
        for name in aux_fields.iter().copied() {
            let token = field(name)?;
            aux.insert(name.to_string(), parse_value(token, name, source, line_no)?);
        }

        let step = reference.step_index(time, period_hours);
        if let Some(previous) = track.steps.last().copied() {
            if step <= previous {
                return Err(malformed(
                    source,
                    line_no,
                    &format!("time step {step} not after previous step {previous}"),
                ));
            }
            if step - previous > 1 {
                fill_gap(track, step, lon, lat, &aux, reference.calendar, period_hours)?;
            }
        }
        track.push_point(step, grid, lon, lat, time, &aux)?;
    }

    finish_track(tracks.last(), declared, seen, source, 0)?;
    debug!("loaded {} tracks from {source}", tracks.len());
    Ok(tracks)
}

/// A header promised `declared` points; fewer raw detail lines is a
/// structural failure.
fn finish_track(
    track: Option<&Track>,
    declared: usize,
    seen: usize,
    source: &str,
    line_no: usize,
) -> Result<(), TrackError> {
    if track.is_some() && seen < declared {
        return Err(malformed(
            source,
            line_no,
            &format!("track declared {declared} points but only {seen} data lines found"),
        ));
    }
    Ok(())
}

/// Parse one auxiliary column: a bracketed (optionally quoted) profile list
/// or a plain scalar.
fn parse_value(
    token: &str,
    name: &str,
    source: &str,
    line_no: usize,
) -> Result<TrackValue, TrackError> {
    if token.starts_with('"') || token.starts_with('[') {
        let inner = token.trim_matches('"');
        let inner = inner
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| {
                malformed(
                    source,
                    line_no,
                    &format!("unterminated profile list in '{name}': '{token}'"),
                )
            })?;
        let values = inner
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| {
                malformed(
                    source,
                    line_no,
                    &format!("invalid profile value in '{name}': '{token}'"),
                )
            })?;
        Ok(TrackValue::Profile(values))
    } else {
        token
            .parse::<f64>()
            .map(TrackValue::Scalar)
            .map_err(|_| malformed(source, line_no, &format!("invalid {name} value '{token}'")))
    }
}

fn validate_column_map(column_map: &ColumnMap) -> Result<(), TrackError> {
    for name in REQUIRED_POSITION_FIELDS {
        column_map.require(name)?;
    }
    // Grid coordinates come as a pair or not at all.
    match (column_map.contains("grid_x"), column_map.contains("grid_y")) {
        (true, false) => Err(TrackError::MissingColumn("grid_y".to_string())),
        (false, true) => Err(TrackError::MissingColumn("grid_x".to_string())),
        _ => Ok(()),
    }
}

fn malformed(source: &str, line: usize, reason: &str) -> TrackError {
    TrackError::MalformedTrackFile {
        path: source.to_string(),
        line,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;

    fn lines(text: &str) -> impl Iterator<Item = io::Result<String>> + '_ {
        text.lines().map(|l| Ok(l.to_string()))
    }

    fn reference() -> ReferenceSeries {
        ReferenceSeries::new(vec![TrackTime::new(2000, 1, 1, 0)], Calendar::Standard).unwrap()
    }

    fn gfdl_map() -> ColumnMap {
        ColumnMap::new(HashMap::from([
            ("grid_x".to_string(), 0),
            ("grid_y".to_string(), 1),
            ("lon".to_string(), 2),
            ("lat".to_string(), 3),
            ("slp".to_string(), 4),
            ("year".to_string(), -4),
            ("month".to_string(), -3),
            ("day".to_string(), -2),
            ("hour".to_string(), -1),
        ]))
    }

    const SIMPLE_FILE: &str = "\
start\t2\t2000\t1\t1\t0
\t10\t20\t1.000000e+00\t5.000000e+00\t9.997000e+04\t2000\t1\t1\t0
\t11\t21\t2.000000e+00\t6.000000e+00\t9.996000e+04\t2000\t1\t1\t6
";

    #[test]
    fn parses_a_simple_track() {
        let tracks =
            parse_tracks(lines(SIMPLE_FILE), "test", &reference(), 6, &gfdl_map()).unwrap();
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.length, 2);
        assert_eq!(track.steps, vec![1, 2]);
        assert_eq!(track.lon, vec![1.0, 2.0]);
        assert_eq!(track.lat, vec![5.0, 6.0]);
        assert_eq!(track.grid_x.as_ref().unwrap(), &vec![10.0, 11.0]);
        assert_eq!(
            track.aux["slp"],
            vec![TrackValue::Scalar(99970.0), TrackValue::Scalar(99960.0)]
        );
        assert_eq!(
            track.times,
            vec![TrackTime::new(2000, 1, 1, 0), TrackTime::new(2000, 1, 1, 6)]
        );
    }

    #[test]
    fn fills_step_gaps_between_detail_lines() {
        let text = "\
start\t2\t2000\t1\t1\t0
\t10\t20\t1.000000e+00\t5.000000e+00\t9.997000e+04\t2000\t1\t1\t0
\t16\t26\t4.000000e+00\t8.000000e+00\t9.994000e+04\t2000\t1\t1\t18
";
        let tracks = parse_tracks(lines(text), "test", &reference(), 6, &gfdl_map()).unwrap();
        let track = &tracks[0];
        assert_eq!(track.steps, vec![1, 2, 3, 4]);
        assert_eq!(track.lon, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(track.lat, vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(
            track.times,
            vec![
                TrackTime::new(2000, 1, 1, 0),
                TrackTime::new(2000, 1, 1, 6),
                TrackTime::new(2000, 1, 1, 12),
                TrackTime::new(2000, 1, 1, 18),
            ]
        );
        // Declared length stays at the header's promise.
        assert_eq!(track.length, 2);
        assert_eq!(track.n_points(), 4);
    }

    #[test]
    fn parses_profile_columns() {
        let map = ColumnMap::new(HashMap::from([
            ("lon".to_string(), 0),
            ("lat".to_string(), 1),
            ("rprof".to_string(), 2),
            ("year".to_string(), -4),
            ("month".to_string(), -3),
            ("day".to_string(), -2),
            ("hour".to_string(), -1),
        ]));
        let text = "\
start\t1\t2000\t1\t1\t0
\t1.0\t5.0\t[1.5,2.5,3.5]\t2000\t1\t1\t0
";
        let tracks = parse_tracks(lines(text), "test", &reference(), 6, &map).unwrap();
        assert_eq!(
            tracks[0].aux["rprof"],
            vec![TrackValue::Profile(vec![1.5, 2.5, 3.5])]
        );
    }

    #[test]
    fn rejects_unparseable_header_count() {
        let text = "start\tmany\t2000\t1\t1\t0\n";
        let err =
            parse_tracks(lines(text), "bad.txt", &reference(), 6, &gfdl_map()).unwrap_err();
        assert_eq!(
            err,
            TrackError::MalformedTrackFile {
                path: "bad.txt".to_string(),
                line: 1,
                reason: "header has no parseable point count".to_string(),
            }
        );
    }

    #[test]
    fn rejects_malformed_profile_list() {
        let map = ColumnMap::new(HashMap::from([
            ("lon".to_string(), 0),
            ("lat".to_string(), 1),
            ("rprof".to_string(), 2),
            ("year".to_string(), -4),
            ("month".to_string(), -3),
            ("day".to_string(), -2),
            ("hour".to_string(), -1),
        ]));
        let text = "\
start\t1\t2000\t1\t1\t0
\t1.0\t5.0\t[1.5,oops]\t2000\t1\t1\t0
";
        let err = parse_tracks(lines(text), "bad.txt", &reference(), 6, &map).unwrap_err();
        assert!(matches!(err, TrackError::MalformedTrackFile { line: 2, .. }));
    }

    #[test]
    fn missing_required_column_fails_before_parsing() {
        let map = ColumnMap::new(HashMap::from([
            ("lon".to_string(), 2),
            ("lat".to_string(), 3),
        ]));
        let err =
            parse_tracks(lines(SIMPLE_FILE), "test", &reference(), 6, &map).unwrap_err();
        assert_eq!(err, TrackError::MissingColumn("year".to_string()));
    }

    #[test]
    fn grid_columns_must_come_in_pairs() {
        let mut columns: HashMap<String, i64> = HashMap::from([
            ("grid_x".to_string(), 0),
            ("lon".to_string(), 1),
            ("lat".to_string(), 2),
            ("year".to_string(), -4),
            ("month".to_string(), -3),
            ("day".to_string(), -2),
            ("hour".to_string(), -1),
        ]);
        let err = parse_tracks(
            lines(SIMPLE_FILE),
            "test",
            &reference(),
            6,
            &ColumnMap::new(columns.clone()),
        )
        .unwrap_err();
        assert_eq!(err, TrackError::MissingColumn("grid_y".to_string()));

        columns.remove("grid_x");
        columns.insert("grid_y".to_string(), 0);
        let err = parse_tracks(
            lines(SIMPLE_FILE),
            "test",
            &reference(),
            6,
            &ColumnMap::new(columns),
        )
        .unwrap_err();
        assert_eq!(err, TrackError::MissingColumn("grid_x".to_string()));
    }

    #[test]
    fn short_track_is_rejected() {
        let text = "\
start\t3\t2000\t1\t1\t0
\t10\t20\t1.000000e+00\t5.000000e+00\t9.997000e+04\t2000\t1\t1\t0
";
        let err = parse_tracks(lines(text), "short.txt", &reference(), 6, &gfdl_map()).unwrap_err();
        assert!(matches!(err, TrackError::MalformedTrackFile { .. }));
    }

    #[test]
    fn surplus_detail_lines_are_ignored() {
        let text = "\
start\t1\t2000\t1\t1\t0
\t10\t20\t1.000000e+00\t5.000000e+00\t9.997000e+04\t2000\t1\t1\t0
\t11\t21\t2.000000e+00\t6.000000e+00\t9.996000e+04\t2000\t1\t1\t6
";
        let tracks = parse_tracks(lines(text), "test", &reference(), 6, &gfdl_map()).unwrap();
        assert_eq!(tracks[0].n_points(), 1);
    }

    #[test]
    fn non_monotonic_steps_are_rejected() {
        let text = "\
start\t2\t2000\t1\t1\t0
\t10\t20\t1.000000e+00\t5.000000e+00\t9.997000e+04\t2000\t1\t1\t6
\t11\t21\t2.000000e+00\t6.000000e+00\t9.996000e+04\t2000\t1\t1\t0
";
        let err = parse_tracks(lines(text), "test", &reference(), 6, &gfdl_map()).unwrap_err();
        assert!(matches!(err, TrackError::MalformedTrackFile { line: 3, .. }));
    }

    #[test]
    fn legacy_map_reads_gridless_rows() {
        let text = "\
start\t2\t2014\t12\t21\t0
\t226\t324\t1.000000e+00\t1.000000e+01\t9.997000e+04\t2014\t12\t21\t0
\t227\t325\t2.000000e+00\t1.100000e+01\t9.996000e+04\t2014\t12\t21\t6
";
        let series =
            ReferenceSeries::new(vec![TrackTime::new(2014, 12, 21, 0)], Calendar::Standard)
                .unwrap();
        let tracks =
            parse_tracks(lines(text), "test", &series, 6, &ColumnMap::legacy()).unwrap();
        let track = &tracks[0];
        assert!(!track.has_grid());
        assert_eq!(track.lon, vec![1.0, 2.0]);
        assert_eq!(track.lat, vec![10.0, 11.0]);
        assert!(track.aux.is_empty());
    }
}
