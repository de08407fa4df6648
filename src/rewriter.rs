//! # Track-file reconciliation
//!
//! Rewrites a pair of stitched track files once the
//! [overlap matcher](crate::overlap) has paired their duplicated segments:
//! the earlier file absorbs the later file's new trailing points and the
//! later file loses everything it merely repeats.
//!
//! ## Byte stability
//! -----------------
//! Downstream tooling diffs and re-parses these files, so reconciliation
//! works on the raw text rather than on parsed [`Track`]s: every line of an
//! unaffected block is copied through byte for byte, and a rewritten header
//! only has its count token spliced in place. Only appended lines are
//! re-rendered, with [`write_track_line`] matching the tracking tool's own
//! numeric conventions (six-decimal scientific notation for floating
//! columns, plain integers for grid and date columns) so they are
//! indistinguishable from originally emitted ones.

use std::fs;

use camino::Utf8Path;
use log::debug;

use crate::calendar::TrackTime;
use crate::constants::HEADER_DELIM;
use crate::overlap::{MatchDescriptor, MatchMethod};
use crate::track::{resolve_column, ColumnMap, Track, TrackValue};
use crate::track_errors::TrackError;

/// Render one point of a track as a (header, detail) line pair in the
/// layout described by `column_map`.
///
/// The header is the same for every point of the track: the sentinel, the
/// stored point count, and the date of the first point. The detail line
/// starts with a tab and carries one tab-separated cell per mapped column.
/// `track_number` only labels log output; the text format itself does not
/// number tracks.
pub fn write_track_line(
    track: &Track,
    point_index: usize,
    track_number: usize,
    column_map: &ColumnMap,
) -> Result<(String, String), TrackError> {
    let first = track
        .first_time()
        .ok_or_else(|| TrackError::MissingColumn("year".to_string()))?;
    let header = format!(
        "{HEADER_DELIM}\t{}\t{}\t{}\t{}\t{}",
        track.n_points(),
        first.year,
        first.month,
        first.day,
        first.hour
    );

    let width = column_map.width();
    let mut cells: Vec<Option<String>> = vec![None; width];
    for (name, pos) in column_map.iter() {
        let idx = resolve_column(pos, width)
            .ok_or_else(|| TrackError::MissingColumn(name.to_string()))?;
        cells[idx] = Some(render_cell(track, point_index, name)?);
    }
    let cells: Vec<String> = cells
        .into_iter()
        .enumerate()
        .map(|(idx, cell)| cell.ok_or(idx))
        .collect::<Result<_, _>>()
        .map_err(|idx| TrackError::MissingColumn(format!("column {idx}")))?;

    debug!(
        "rendered point {point_index} of track {track_number} ({} columns)",
        cells.len()
    );
    Ok((header, format!("\t{}", cells.join("\t"))))
}

fn render_cell(track: &Track, point: usize, name: &str) -> Result<String, TrackError> {
    let missing = || TrackError::MissingColumn(name.to_string());
    let time = track.times.get(point).copied().ok_or_else(missing)?;
    Ok(match name {
        "grid_x" => render_grid(track.grid_x.as_ref().ok_or_else(missing)?[point]),
        "grid_y" => render_grid(track.grid_y.as_ref().ok_or_else(missing)?[point]),
        "lon" => render_float(track.lon[point]),
        "lat" => render_float(track.lat[point]),
        "year" => time.year.to_string(),
        "month" => time.month.to_string(),
        "day" => time.day.to_string(),
        "hour" => time.hour.to_string(),
        _ => match track.aux.get(name).ok_or_else(missing)?.get(point) {
            Some(TrackValue::Scalar(v)) => render_float(*v),
            Some(TrackValue::Profile(values)) => {
                let rendered: Vec<String> = values.iter().map(|v| render_float(*v)).collect();
                format!("[{}]", rendered.join(","))
            }
            None => return Err(missing()),
        },
    })
}

/// Six-decimal scientific notation with a signed two-digit exponent
/// (`9.997000e+04`), the C `%1.6e` convention of the tracking tool.
fn render_float(value: f64) -> String {
    let raw = format!("{value:.6e}");
    match raw.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => format!("{mantissa}e{exp:+03}"),
            Err(_) => raw,
        },
        None => raw,
    }
}

/// Grid cells are integers in the tool's output; gap filling can leave a
/// fractional continuation, which rounds back to the nearest cell.
fn render_grid(value: f64) -> String {
    format!("{}", value.round() as i64)
}

/// One header-delimited block of a raw track file.
#[derive(Debug)]
struct Block {
    header: String,
    lines: Vec<String>,
}

/// Split raw file text into header blocks, preserving every line verbatim.
fn split_blocks(text: &str, source: &str) -> Result<Vec<Block>, TrackError> {
    let mut blocks: Vec<Block> = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let is_header = line.split_whitespace().next() == Some(HEADER_DELIM);
        if is_header {
            blocks.push(Block {
                header: line.to_string(),
                lines: Vec::new(),
            });
        } else {
            let block = blocks.last_mut().ok_or_else(|| {
                TrackError::MalformedTrackFile {
                    path: source.to_string(),
                    line: index + 1,
                    reason: "data line before any header".to_string(),
                }
            })?;
            block.lines.push(line.to_string());
        }
    }
    Ok(blocks)
}

/// Replace the count token of a header line in place, keeping the original
/// delimiting bytes around it untouched.
fn bump_header_count(header: &str, new_count: usize) -> String {
    let mut token = 0;
    let mut in_token = false;
    let (mut start, mut end) = (header.len(), header.len());
    for (i, c) in header.char_indices() {
        if c.is_whitespace() {
            if in_token && token == 2 {
                end = i;
                break;
            }
            in_token = false;
        } else if !in_token {
            in_token = true;
            token += 1;
            if token == 2 {
                start = i;
            }
        }
    }
    format!("{}{}{}", &header[..start], new_count, &header[end..])
}

fn header_count(header: &str, source: &str) -> Result<usize, TrackError> {
    header
        .split_whitespace()
        .nth(1)
        .and_then(|t| t.parse::<usize>().ok())
        .ok_or_else(|| TrackError::MalformedTrackFile {
            path: source.to_string(),
            line: 0,
            reason: format!("header has no parseable point count: '{header}'"),
        })
}

/// Calendar timestamp of one raw detail line, read through the column map.
fn line_time(line: &str, column_map: &ColumnMap) -> Option<TrackTime> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let field = |name: &str| -> Option<i64> {
        let idx = resolve_column(column_map.position(name)?, tokens.len())?;
        tokens[idx].parse::<i64>().ok()
    };
    Some(TrackTime::new(
        field("year")? as i32,
        field("month")? as u32,
        field("day")? as u32,
        field("hour")? as u32,
    ))
}

fn assemble(blocks: Vec<Block>, ends_with_newline: bool) -> String {
    let mut lines: Vec<String> = Vec::new();
    for block in blocks {
        lines.push(block.header);
        lines.extend(block.lines);
    }
    let mut text = lines.join("\n");
    if ends_with_newline && !text.is_empty() {
        text.push('\n');
    }
    text
}

/// Rewrite a pair of overlapping track files so each storm appears once.
///
/// `late_tracks` are the parsed tracks of the later file, in file order;
/// `matches` are the descriptors produced by
/// [`match_track_files`](crate::overlap::match_track_files) for the same
/// pair of files.
///
/// Per descriptor:
/// - `remove` drops the later file's whole block; the earlier file already
///   holds every point.
/// - `extend`/`extend_odd` append the later track's points past `time_c` to
///   the earlier block (re-rendered, header count increased) and strip the
///   duplicated leading lines from the later block (header count
///   decreased).
///
/// All other blocks, and every retained line, are copied through unchanged.
pub fn reconcile(
    earlier_path: &Utf8Path,
    later_path: &Utf8Path,
    earlier_out: &Utf8Path,
    later_out: &Utf8Path,
    late_tracks: &[Track],
    matches: &[MatchDescriptor],
    column_map: &ColumnMap,
) -> Result<(), TrackError> {
    let early_text = fs::read_to_string(earlier_path.as_std_path())?;
    let late_text = fs::read_to_string(later_path.as_std_path())?;
    let mut early_blocks = split_blocks(&early_text, earlier_path.as_str())?;
    let mut late_blocks = split_blocks(&late_text, later_path.as_str())?;
    let mut drop_late: Vec<usize> = Vec::new();

    for descriptor in matches {
        let late_track = late_tracks.get(descriptor.late_index).ok_or_else(|| {
            TrackError::MalformedTrackFile {
                path: later_path.to_string(),
                line: 0,
                reason: format!("no parsed track {}", descriptor.late_index),
            }
        })?;
        let late_block = late_blocks.get_mut(descriptor.late_index).ok_or_else(|| {
            TrackError::MalformedTrackFile {
                path: later_path.to_string(),
                line: 0,
                reason: format!("no block {}", descriptor.late_index),
            }
        })?;

        if descriptor.method == MatchMethod::Remove {
            debug!(
                "dropping duplicated block {} from {later_path}",
                descriptor.late_index
            );
            drop_late.push(descriptor.late_index);
            continue;
        }

        // The duplicated lead of the later block ends at the timestamp of
        // the last shared point; raw lines up to it are duplicates even
        // when gap filling inserted extra parsed points between them.
        let cutoff = descriptor
            .time_c
            .checked_sub(1)
            .and_then(|i| late_track.times.get(i).copied());
        let retained: Vec<String> = late_block
            .lines
            .iter()
            .filter(|line| match (cutoff, line_time(line, column_map)) {
                (Some(cutoff), Some(time)) => time > cutoff,
                _ => true,
            })
            .cloned()
            .collect();
        let dropped = late_block.lines.len() - retained.len();
        let late_count = header_count(&late_block.header, later_path.as_str())?;
        late_block.header =
            bump_header_count(&late_block.header, late_count.saturating_sub(dropped));
        late_block.lines = retained;

        let early_block = early_blocks.get_mut(descriptor.early_index).ok_or_else(|| {
            TrackError::MalformedTrackFile {
                path: earlier_path.to_string(),
                line: 0,
                reason: format!("no block {}", descriptor.early_index),
            }
        })?;
        let mut appended = 0usize;
        for point in descriptor.time_c..late_track.n_points() {
            let (_, detail) =
                write_track_line(late_track, point, descriptor.late_index, column_map)?;
            early_block.lines.push(detail);
            appended += 1;
        }
        let early_count = header_count(&early_block.header, earlier_path.as_str())?;
        early_block.header = bump_header_count(&early_block.header, early_count + appended);
        debug!(
            "extended block {} of {earlier_path} with {appended} points",
            descriptor.early_index
        );
    }

    let late_blocks: Vec<Block> = late_blocks
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !drop_late.contains(index))
        .map(|(_, block)| block)
        .collect();

    fs::write(
        earlier_out.as_std_path(),
        assemble(early_blocks, early_text.ends_with('\n')),
    )?;
    fs::write(
        later_out.as_std_path(),
        assemble(late_blocks, late_text.ends_with('\n')),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn floats_render_in_tool_notation() {
        assert_eq!(render_float(99970.0), "9.997000e+04");
        assert_eq!(render_float(-1.5), "-1.500000e+00");
        assert_eq!(render_float(0.0), "0.000000e+00");
        assert_eq!(render_float(2.5e-12), "2.500000e-12");
        assert_eq!(render_float(3.0e120), "3.000000e+120");
    }

    #[test]
    fn header_count_splice_keeps_delimiters() {
        assert_eq!(
            bump_header_count("start\t2\t2000\t1\t1\t0", 17),
            "start\t17\t2000\t1\t1\t0"
        );
        assert_eq!(
            bump_header_count("start   12  2000 1 1 0", 3),
            "start   3  2000 1 1 0"
        );
    }

    #[test]
    fn write_track_line_round_trips_through_the_parser() {
        let map = ColumnMap::new(HashMap::from([
            ("grid_x".to_string(), 0),
            ("grid_y".to_string(), 1),
            ("lon".to_string(), 2),
            ("lat".to_string(), 3),
            ("slp".to_string(), 4),
            ("year".to_string(), -4),
            ("month".to_string(), -3),
            ("day".to_string(), -2),
            ("hour".to_string(), -1),
        ]));
        let mut track = Track::new(1, ["slp"], true);
        track
            .push_point(
                1,
                Some((226.0, 324.0)),
                56.5,
                -12.25,
                TrackTime::new(2000, 1, 1, 6),
                &HashMap::from([("slp".to_string(), TrackValue::Scalar(99970.0))]),
            )
            .unwrap();

        let (header, detail) = write_track_line(&track, 0, 0, &map).unwrap();
        assert_eq!(header, "start\t1\t2000\t1\t1\t6");
        assert_eq!(
            detail,
            "\t226\t324\t5.650000e+01\t-1.225000e+01\t9.997000e+04\t2000\t1\t1\t6"
        );
    }

    #[test]
    fn profile_cells_render_bracketed() {
        let map = ColumnMap::new(HashMap::from([
            ("lon".to_string(), 0),
            ("lat".to_string(), 1),
            ("rprof".to_string(), 2),
            ("year".to_string(), -4),
            ("month".to_string(), -3),
            ("day".to_string(), -2),
            ("hour".to_string(), -1),
        ]));
        let mut track = Track::new(1, ["rprof"], false);
        track
            .push_point(
                1,
                None,
                1.0,
                2.0,
                TrackTime::new(2000, 1, 1, 0),
                &HashMap::from([(
                    "rprof".to_string(),
                    TrackValue::Profile(vec![1.5, 2.5]),
                )]),
            )
            .unwrap();
        let (_, detail) = write_track_line(&track, 0, 0, &map).unwrap();
        assert_eq!(
            detail,
            "\t1.000000e+00\t2.000000e+00\t[1.500000e+00,2.500000e+00]\t2000\t1\t1\t0"
        );
    }

    #[test]
    fn split_blocks_rejects_leading_data() {
        let err = split_blocks("\t1\t2\n", "orphan.txt").unwrap_err();
        assert!(matches!(err, TrackError::MalformedTrackFile { line: 1, .. }));
    }

    #[test]
    fn line_time_reads_trailing_date_columns() {
        let map = ColumnMap::legacy();
        let time = line_time("\t226\t324\t1.0e+00\t1.0e+01\t2014\t12\t21\t6", &map);
        assert_eq!(time, Some(TrackTime::new(2014, 12, 21, 6)));
        assert_eq!(line_time("nonsense", &map), None);
    }

    #[test]
    fn grid_cells_round_to_integers() {
        assert_eq!(render_grid(226.0), "226");
        assert_eq!(render_grid(226.4), "226");
        assert_eq!(render_grid(-0.2), "0");
    }
}
