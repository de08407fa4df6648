//! # netCDF archival of reconciled tracks
//!
//! Serializes a track set to the flat "record" layout used by downstream
//! cyclone analysis: one `tracks`-dimension entry per trajectory
//! (`FIRST_PT`/`NUM_PTS`/`TRACK_ID`) and one `record`-dimension entry per
//! point (`index`, `time`, `lon`, `lat`, plus one variable per scalar
//! auxiliary field). Point timestamps are written as CF numbers under the
//! caller's time units and calendar so the file round-trips through any CF
//! reader.
//!
//! Profile-valued auxiliary fields have no place in the flat record layout
//! and are skipped with a warning.

use std::collections::HashMap;

use camino::Utf8Path;
use itertools::Itertools;
use log::{debug, warn};

use crate::calendar::Calendar;
use crate::reference::TimeUnits;
use crate::track::{Track, TrackValue};
use crate::track_errors::TrackError;

/// Provenance attributes stamped on the archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMetadata {
    pub title: String,
    pub institution_id: String,
    pub algorithm: String,
    pub algorithm_ref: String,
    /// Sampling frequency of the tracked data, e.g. `6hr`.
    pub frequency: String,
    /// Exact detection command line, for reproducibility.
    pub detect_cmd: String,
    /// Exact stitching command line.
    pub stitch_cmd: String,
}

impl Default for ArchiveMetadata {
    fn default() -> Self {
        ArchiveMetadata {
            title: "Tempest TC tracks".to_string(),
            institution_id: "MOHC".to_string(),
            algorithm: "TempestExtremes_v2".to_string(),
            algorithm_ref: "Ullrich and Zarzycki 2017; Zarzycki and Ullrich 2017; \
                            Ullrich et al. 2020"
                .to_string(),
            frequency: String::new(),
            detect_cmd: String::new(),
            stitch_cmd: String::new(),
        }
    }
}

/// Units for the conventionally tracked fields, used when the caller does
/// not supply a units map. Unknown fields fall back to the CF dimensionless
/// unit `1` with a warning.
pub fn guess_variable_units<'a, I>(fields: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let known: HashMap<&str, &str> = HashMap::from([
        ("slp", "Pa"),
        ("sfcWind", "m s-1"),
        ("zg", "m"),
        ("orog", "m"),
        ("wind925", "m s-1"),
        ("wind850", "m s-1"),
        ("rvT63", "s-1"),
    ]);
    fields
        .into_iter()
        .map(|field| {
            let units = known.get(field).copied().unwrap_or_else(|| {
                warn!("no known units for tracked variable '{field}', writing '1'");
                "1"
            });
            (field.to_string(), units.to_string())
        })
        .collect()
}

/// CF-style metadata for one tracked variable, keyed on conventional name
/// fragments.
struct VariableMetadata {
    standard_name: Option<&'static str>,
    long_name: Option<&'static str>,
    description: Option<&'static str>,
}

fn variable_metadata(field: &str) -> VariableMetadata {
    let (standard_name, long_name, description) = if field.contains("slp") {
        (
            Some("air_pressure_at_mean_sea_level"),
            Some("Sea Level Pressure"),
            Some("Sea level pressure for tracked variable"),
        )
    } else if field.contains("sfcWind") {
        (
            Some("wind_speed"),
            Some("Near-surface Wind Speed"),
            Some("near-surface (usually 10 metres) wind speed"),
        )
    } else if field.contains("orog") {
        (
            Some("surface_altitude"),
            Some("Surface Altitude"),
            Some("Surface altitude (height above sea level)"),
        )
    } else if field.contains("wind") {
        (Some("wind_speed"), None, None)
    } else if field.contains("rv") {
        (Some("relative_vorticity"), None, None)
    } else if field.contains("zg") {
        (
            Some("geopotential_height"),
            Some("Geopotential Height"),
            Some("Geopotential height difference"),
        )
    } else {
        (None, None, None)
    };
    VariableMetadata {
        standard_name,
        long_name,
        description,
    }
}

/// Scalar auxiliary fields common to the whole track set, in stable order.
fn scalar_fields(tracks: &[Track]) -> Vec<String> {
    let Some(first) = tracks.first() else {
        return Vec::new();
    };
    first
        .aux
        .iter()
        .filter(|(name, values)| {
            let scalar = values
                .first()
                .map(|v| matches!(v, TrackValue::Scalar(_)))
                .unwrap_or(true);
            if !scalar {
                warn!("skipping profile variable '{name}' in netCDF archive");
            }
            scalar
        })
        .map(|(name, _)| name.clone())
        .sorted()
        .collect()
}

/// Write the track set to `path` as a netCDF-4 file.
///
/// `time_units` and `calendar` define the numeric encoding of point
/// timestamps; `variable_units` overrides the per-field units, with
/// [`guess_variable_units`] filling in when `None`.
pub fn save_tracks_netcdf(
    path: &Utf8Path,
    tracks: &[Track],
    calendar: Calendar,
    time_units: &TimeUnits,
    metadata: &ArchiveMetadata,
    variable_units: Option<&HashMap<String, String>>,
) -> Result<(), TrackError> {
    debug!("archiving {} tracks to {path}", tracks.len());
    let fields = scalar_fields(tracks);
    let guessed;
    let units_map = match variable_units {
        Some(map) => map,
        None => {
            guessed = guess_variable_units(fields.iter().map(String::as_str));
            &guessed
        }
    };

    // Flatten the per-track sequences into the record layout.
    let mut first_pt: Vec<i32> = Vec::new();
    let mut num_pts: Vec<i32> = Vec::new();
    let mut track_id: Vec<i32> = Vec::new();
    let mut index: Vec<i32> = Vec::new();
    let mut time: Vec<f64> = Vec::new();
    let mut lon: Vec<f32> = Vec::new();
    let mut lat: Vec<f32> = Vec::new();
    let mut field_values: HashMap<&str, Vec<f64>> =
        fields.iter().map(|f| (f.as_str(), Vec::new())).collect();

    for (track_index, track) in tracks.iter().enumerate() {
        first_pt.push(time.len() as i32);
        num_pts.push(track.n_points() as i32);
        track_id.push(track_index as i32);
        for point in 0..track.n_points() {
            index.push(point as i32);
            time.push(time_units.num_from_date(calendar, track.times[point]));
            lon.push(track.lon[point] as f32);
            lat.push(track.lat[point] as f32);
            for field in &fields {
                let value = track
                    .aux
                    .get(field.as_str())
                    .and_then(|values| values.get(point))
                    .and_then(TrackValue::as_scalar)
                    .ok_or_else(|| TrackError::MissingColumn(field.clone()))?;
                field_values
                    .get_mut(field.as_str())
                    .ok_or_else(|| TrackError::MissingColumn(field.clone()))?
                    .push(value);
            }
        }
    }

    let mut nc = netcdf::create(path.as_std_path())?;
    nc.add_attribute("title", metadata.title.as_str())?;
    nc.add_attribute("tracked_data_frequency", metadata.frequency.as_str())?;
    nc.add_attribute("institution_id", metadata.institution_id.as_str())?;
    nc.add_attribute("algorithm", metadata.algorithm.as_str())?;
    nc.add_attribute("algorithm_ref", metadata.algorithm_ref.as_str())?;
    nc.add_attribute("detect_cmd", metadata.detect_cmd.as_str())?;
    nc.add_attribute("stitch_cmd", metadata.stitch_cmd.as_str())?;

    nc.add_dimension("tracks", tracks.len())?;
    nc.add_dimension("record", time.len())?;

    {
        let mut var = nc.add_variable::<i32>("FIRST_PT", &["tracks"])?;
        var.put_attribute("units", "ordinal")?;
        var.put_attribute("long_name", "first_pt")?;
        var.put_attribute("description", "Index to first point of this track number")?;
        var.put_values(&first_pt, ..)?;
    }
    {
        let mut var = nc.add_variable::<i32>("NUM_PTS", &["tracks"])?;
        var.put_attribute("units", "ordinal")?;
        var.put_attribute("long_name", "num_pts")?;
        var.put_attribute("description", "Number of points for this track")?;
        var.put_values(&num_pts, ..)?;
    }
    {
        let mut var = nc.add_variable::<i32>("TRACK_ID", &["tracks"])?;
        var.put_attribute("units", "ordinal")?;
        var.put_attribute("long_name", "track_id")?;
        var.put_attribute("description", "Tropical cyclone track number")?;
        var.put_values(&track_id, ..)?;
    }
    {
        let mut var = nc.add_variable::<i32>("index", &["record"])?;
        var.put_attribute("units", "ordinal")?;
        var.put_attribute("long_name", "track_id")?;
        var.put_attribute("description", "Track sequence number (0-length of track-1)")?;
        var.put_values(&index, ..)?;
    }
    {
        let mut var = nc.add_variable::<f64>("time", &["record"])?;
        var.put_attribute("units", time_units.to_string().as_str())?;
        var.put_attribute("calendar", calendar.name())?;
        var.put_attribute("standard_name", "time")?;
        var.put_attribute("long_name", "time")?;
        var.put_values(&time, ..)?;
    }
    {
        let mut var = nc.add_variable::<f32>("lon", &["record"])?;
        var.put_attribute("units", "degrees_east")?;
        var.put_attribute("standard_name", "longitude")?;
        var.put_attribute("long_name", "longitude")?;
        var.put_attribute(
            "description",
            "Longitude (degrees east) associated with tracked variable",
        )?;
        var.put_values(&lon, ..)?;
    }
    {
        let mut var = nc.add_variable::<f32>("lat", &["record"])?;
        var.put_attribute("units", "degrees_north")?;
        var.put_attribute("standard_name", "latitude")?;
        var.put_attribute("long_name", "latitude")?;
        var.put_attribute(
            "description",
            "Latitude (degrees north) associated with tracked variable",
        )?;
        var.put_values(&lat, ..)?;
    }

    for field in &fields {
        let meta = variable_metadata(field);
        let mut var = nc.add_variable::<f64>(field, &["record"])?;
        if let Some(standard_name) = meta.standard_name {
            var.put_attribute("standard_name", standard_name)?;
        }
        if let Some(long_name) = meta.long_name {
            var.put_attribute("long_name", long_name)?;
        }
        if let Some(description) = meta.description {
            var.put_attribute("description", description)?;
        }
        let units = units_map.get(field.as_str()).cloned().unwrap_or_else(|| {
            warn!("no units supplied for '{field}', writing '1'");
            "1".to_string()
        });
        var.put_attribute("units", units.as_str())?;
        var.put_values(&field_values[field.as_str()], ..)?;
    }

    Ok(())
}
