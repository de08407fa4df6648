//! # Gap filling
//!
//! TempestExtremes occasionally skips time steps inside a stitched track.
//! [`fill_gap`] repairs such a track in place by appending one interpolated
//! point for every step strictly between the last recorded step and the
//! incoming one; the caller appends the incoming point itself afterwards, so
//! the finished step sequence is contiguous.
//!
//! Interpolation rules:
//! - longitude walks the shortest path around the 0/360 discontinuity and
//!   stays inside `[0, 360)`;
//! - latitude and every auxiliary variable step linearly toward the incoming
//!   value (profile variables element-wise);
//! - grid coordinates continue with the delta of the last two recorded
//!   points and may leave the integer grid;
//! - timestamps are produced by repeated calendar-correct
//!   [`advance`](Calendar::advance) from the last recorded time, never by
//!   interpolating calendar fields.

use std::collections::HashMap;

use crate::calendar::Calendar;
use crate::constants::Degree;
use crate::constants::StepIndex;
use crate::track::{Track, TrackValue};
use crate::track_errors::TrackError;

/// Append interpolated points for every step in `(last_step, target_step)`.
///
/// Arguments
/// -----------------
/// * `track` — track with at least one recorded point; mutated in place.
/// * `target_step` — step index of the incoming point (not appended here).
/// * `target_lon`, `target_lat` — position of the incoming point, degrees.
/// * `target_aux` — auxiliary values of the incoming point, one entry per
///   auxiliary field of the track.
/// * `calendar`, `period_hours` — time base for the interpolated stamps.
///
/// The gap must be at least 2 steps wide: a 1-step difference needs no
/// filling and must not reach this routine.
pub fn fill_gap(
    track: &mut Track,
    target_step: StepIndex,
    target_lon: Degree,
    target_lat: Degree,
    target_aux: &HashMap<String, TrackValue>,
    calendar: Calendar,
    period_hours: i64,
) -> Result<(), TrackError> {
    let last = track.n_points() - 1;
    let gap_length = target_step - track.steps[last];
    debug_assert!(gap_length >= 2, "fill_gap called for a contiguous step");

    // Shortest-path longitude delta across the 0/360 discontinuity
    // (https://stackoverflow.com/a/14498790).
    let dlon = ((target_lon - track.lon[last] + 180.0).rem_euclid(360.0) - 180.0)
        / gap_length as Degree;
    let dlat = (target_lat - track.lat[last]) / gap_length as Degree;

    let mut aux_deltas: HashMap<String, TrackValue> = HashMap::new();
    for (name, values) in &track.aux {
        let target = target_aux
            .get(name)
            .ok_or_else(|| TrackError::MissingColumn(name.clone()))?;
        let delta = value_delta(name, &values[last], target, gap_length)?;
        aux_deltas.insert(name.clone(), delta);
    }

    // Continue the last observed grid motion; with a single recorded point
    // there is none to continue.
    let grid_deltas = match (&track.grid_x, &track.grid_y) {
        (Some(gx), Some(gy)) if last > 0 => {
            Some((gx[last] - gx[last - 1], gy[last] - gy[last - 1]))
        }
        (Some(_), Some(_)) => Some((0.0, 0.0)),
        _ => None,
    };

    for _ in 1..gap_length {
        let i = track.n_points() - 1;

        let lon = (track.lon[i] + dlon).rem_euclid(360.0);
        let lat = track.lat[i] + dlat;
        let time = calendar.advance(track.times[i], period_hours);
        let step = track.steps[i] + 1;

        let mut aux = HashMap::new();
        for (name, values) in &track.aux {
            aux.insert(
                name.clone(),
                apply_delta(&values[i], &aux_deltas[name]),
            );
        }
        let grid = match (grid_deltas, &track.grid_x, &track.grid_y) {
            (Some((dx, dy)), Some(gx), Some(gy)) => Some((gx[i] + dx, gy[i] + dy)),
            _ => None,
        };

        track.push_point(step, grid, lon, lat, time, &aux)?;
    }
    Ok(())
}

/// Per-step increment between the last recorded value and the incoming one.
fn value_delta(
    field: &str,
    last: &TrackValue,
    target: &TrackValue,
    gap_length: i64,
) -> Result<TrackValue, TrackError> {
    match (last, target) {
        (TrackValue::Scalar(a), TrackValue::Scalar(b)) => {
            Ok(TrackValue::Scalar((b - a) / gap_length as f64))
        }
        (TrackValue::Profile(a), TrackValue::Profile(b)) => {
            if a.len() != b.len() {
                return Err(TrackError::ProfileLengthMismatch {
                    field: field.to_string(),
                    expected: a.len(),
                    found: b.len(),
                });
            }
            Ok(TrackValue::Profile(
                a.iter()
                    .zip(b)
                    .map(|(x, y)| (y - x) / gap_length as f64)
                    .collect(),
            ))
        }
        (TrackValue::Scalar(_), TrackValue::Profile(p)) => Err(TrackError::ProfileLengthMismatch {
            field: field.to_string(),
            expected: 1,
            found: p.len(),
        }),
        (TrackValue::Profile(p), TrackValue::Scalar(_)) => Err(TrackError::ProfileLengthMismatch {
            field: field.to_string(),
            expected: p.len(),
            found: 1,
        }),
    }
}

fn apply_delta(value: &TrackValue, delta: &TrackValue) -> TrackValue {
    match (value, delta) {
        (TrackValue::Scalar(v), TrackValue::Scalar(d)) => TrackValue::Scalar(v + d),
        (TrackValue::Profile(v), TrackValue::Profile(d)) => {
            TrackValue::Profile(v.iter().zip(d).map(|(a, b)| a + b).collect())
        }
        // Mixed shapes are rejected when the deltas are computed.
        _ => unreachable!("aux value shape verified by value_delta"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::TrackTime;
    use approx::assert_relative_eq;

    const AUX_FIELDS: [&str; 4] = ["slp", "sfcWind", "zg", "orog"];

    /// Two-point storm matching the fixtures the original pipeline's test
    /// suite used for gap filling.
    fn two_point_track(
        grid: [(f64, f64); 2],
        lon: [f64; 2],
        lat: [f64; 2],
    ) -> (Track, HashMap<String, TrackValue>) {
        let mut track = Track::new(3, AUX_FIELDS, true);
        let aux_start: [f64; 4] = [100000.0, 5.5, 5090.0, 10.0];
        let aux_second: [f64; 4] = [99999.0, 5.7, 5091.0, 8.0];
        for (i, (aux, hour)) in [(aux_start, 0u32), (aux_second, 6u32)].iter().enumerate() {
            let values: HashMap<String, TrackValue> = AUX_FIELDS
                .iter()
                .zip(aux)
                .map(|(name, v)| (name.to_string(), TrackValue::Scalar(*v)))
                .collect();
            track
                .push_point(
                    (i + 1) as i64,
                    Some(grid[i]),
                    lon[i],
                    lat[i],
                    TrackTime::new(2000, 1, 1, *hour),
                    &values,
                )
                .unwrap();
        }
        let target: HashMap<String, TrackValue> = AUX_FIELDS
            .iter()
            .zip([99995.0, 6.5, 5095.0, 0.0])
            .map(|(name, v)| (name.to_string(), TrackValue::Scalar(v)))
            .collect();
        (track, target)
    }

    fn scalars(track: &Track, field: &str) -> Vec<f64> {
        track.aux[field]
            .iter()
            .map(|v| v.as_scalar().unwrap())
            .collect()
    }

    #[test]
    fn fill_gap_increasing() {
        let (mut track, target) = two_point_track([(0.0, 0.0), (2.0, 2.0)], [0.0, 1.0], [0.0, 1.0]);
        fill_gap(&mut track, 6, 5.0, 5.0, &target, Calendar::Standard, 6).unwrap();

        assert_eq!(track.steps, vec![1, 2, 3, 4, 5]);
        assert_eq!(track.lon, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(track.lat, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(track.grid_x.as_ref().unwrap(), &vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(track.grid_y.as_ref().unwrap(), &vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(
            track.times,
            vec![
                TrackTime::new(2000, 1, 1, 0),
                TrackTime::new(2000, 1, 1, 6),
                TrackTime::new(2000, 1, 1, 12),
                TrackTime::new(2000, 1, 1, 18),
                TrackTime::new(2000, 1, 2, 0),
            ]
        );
        assert_eq!(
            scalars(&track, "slp"),
            vec![100000.0, 99999.0, 99998.0, 99997.0, 99996.0]
        );
        for (actual, expected) in scalars(&track, "sfcWind")
            .iter()
            .zip([5.5, 5.7, 5.9, 6.1, 6.3])
        {
            assert_relative_eq!(actual, &expected, epsilon = 1e-12);
        }
        assert_eq!(scalars(&track, "zg"), vec![5090.0, 5091.0, 5092.0, 5093.0, 5094.0]);
        assert_eq!(scalars(&track, "orog"), vec![10.0, 8.0, 6.0, 4.0, 2.0]);
        // Declared length is untouched by filling.
        assert_eq!(track.length, 3);
    }

    #[test]
    fn fill_gap_decreasing_wraps_longitude() {
        let (mut track, target) = two_point_track([(2.0, 2.0), (0.0, 0.0)], [1.0, 0.0], [1.0, 0.0]);
        fill_gap(&mut track, 6, 356.0, -4.0, &target, Calendar::Standard, 6).unwrap();

        assert_eq!(track.lon, vec![1.0, 0.0, 359.0, 358.0, 357.0]);
        assert_eq!(track.lat, vec![1.0, 0.0, -1.0, -2.0, -3.0]);
        assert_eq!(
            track.grid_x.as_ref().unwrap(),
            &vec![2.0, 0.0, -2.0, -4.0, -6.0]
        );
    }

    #[test]
    fn fill_gap_opposite_directions() {
        let (mut track, target) = two_point_track([(0.0, 2.0), (2.0, 0.0)], [1.0, 0.0], [0.0, 1.0]);
        fill_gap(&mut track, 6, 356.0, 5.0, &target, Calendar::Standard, 6).unwrap();

        assert_eq!(track.lon, vec![1.0, 0.0, 359.0, 358.0, 357.0]);
        assert_eq!(track.lat, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(track.grid_x.as_ref().unwrap(), &vec![0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(
            track.grid_y.as_ref().unwrap(),
            &vec![2.0, 0.0, -2.0, -4.0, -6.0]
        );
    }

    #[test]
    fn fill_gap_non_integer_deltas() {
        let (mut track, target) =
            two_point_track([(0.0, 2.0), (3.0, -1.0)], [1.0, 359.5], [0.0, 1.5]);
        fill_gap(&mut track, 6, 353.5, 7.5, &target, Calendar::Standard, 6).unwrap();

        for (actual, expected) in track.lon.iter().zip([1.0, 359.5, 358.0, 356.5, 355.0]) {
            assert_relative_eq!(actual, &expected, epsilon = 1e-12);
        }
        for (actual, expected) in track.lat.iter().zip([0.0, 1.5, 3.0, 4.5, 6.0]) {
            assert_relative_eq!(actual, &expected, epsilon = 1e-12);
        }
        assert_eq!(
            track.grid_x.as_ref().unwrap(),
            &vec![0.0, 3.0, 6.0, 9.0, 12.0]
        );
        assert_eq!(
            track.grid_y.as_ref().unwrap(),
            &vec![2.0, -1.0, -4.0, -7.0, -10.0]
        );
    }

    #[test]
    fn longitude_interpolation_stays_in_range() {
        // 356 -> 5 takes the short way around through 0, never through 180,
        // and every interpolated value stays inside [0, 360).
        let mut track = Track::new(2, [], false);
        track
            .push_point(1, None, 356.0, 10.0, TrackTime::new(2000, 1, 1, 0), &HashMap::new())
            .unwrap();
        fill_gap(&mut track, 10, 5.0, 10.0, &HashMap::new(), Calendar::Standard, 6).unwrap();

        let expected = [356.0, 357.0, 358.0, 359.0, 0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(track.lon.len(), expected.len());
        for (actual, want) in track.lon.iter().zip(expected) {
            assert_relative_eq!(actual, &want, epsilon = 1e-9);
            assert!((0.0..360.0).contains(actual));
        }
        assert_eq!(track.steps, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn profile_variables_interpolate_elementwise() {
        let mut track = Track::new(2, ["rprof"], false);
        let start = HashMap::from([(
            "rprof".to_string(),
            TrackValue::Profile(vec![10.0, 20.0, 30.0]),
        )]);
        track
            .push_point(1, None, 0.0, 0.0, TrackTime::new(2000, 1, 1, 0), &start)
            .unwrap();
        let target = HashMap::from([(
            "rprof".to_string(),
            TrackValue::Profile(vec![16.0, 26.0, 27.0]),
        )]);
        fill_gap(&mut track, 4, 3.0, 0.0, &target, Calendar::Standard, 6).unwrap();

        assert_eq!(
            track.aux["rprof"],
            vec![
                TrackValue::Profile(vec![10.0, 20.0, 30.0]),
                TrackValue::Profile(vec![12.0, 22.0, 29.0]),
                TrackValue::Profile(vec![14.0, 24.0, 28.0]),
            ]
        );
    }

    #[test]
    fn profile_length_change_is_rejected() {
        let mut track = Track::new(2, ["rprof"], false);
        let start = HashMap::from([("rprof".to_string(), TrackValue::Profile(vec![1.0, 2.0]))]);
        track
            .push_point(1, None, 0.0, 0.0, TrackTime::new(2000, 1, 1, 0), &start)
            .unwrap();
        let target = HashMap::from([("rprof".to_string(), TrackValue::Profile(vec![1.0]))]);
        let err = fill_gap(&mut track, 4, 3.0, 0.0, &target, Calendar::Standard, 6).unwrap_err();
        assert_eq!(
            err,
            TrackError::ProfileLengthMismatch {
                field: "rprof".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }
}
