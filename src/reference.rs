//! # Reference time series
//!
//! Step indices are defined relative to the time axis of the gridded file
//! the tracking was run on: the axis' first entry is step 1 and consecutive
//! entries are one tracking period apart. [`ReferenceSeries`] carries that
//! axis as an opaque ordered list of [`TrackTime`]s plus the calendar it is
//! expressed in, either supplied directly by the caller or loaded from the
//! companion netCDF file's `time` variable.
//!
//! [`TimeUnits`] parses the CF `"<unit> since <origin>"` encoding used both
//! by that `time` variable and by the archival writer when it serializes
//! point timestamps back to numbers.

use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;
use log::debug;

use crate::calendar::{Calendar, TrackTime};
use crate::constants::{StepIndex, HOURS_PER_DAY};
use crate::track_errors::TrackError;

/// Unit of a CF time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Days,
}

/// Parsed form of a CF time-units string such as
/// `"hours since 1950-01-01 00:00:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub origin: TrackTime,
}

impl FromStr for TimeUnits {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TrackError::InvalidTimeUnits(s.to_string());

        let mut parts = s.split_whitespace();
        let unit = match parts.next().ok_or_else(invalid)? {
            "hours" | "hour" => TimeUnit::Hours,
            "days" | "day" => TimeUnit::Days,
            _ => return Err(invalid()),
        };
        if parts.next() != Some("since") {
            return Err(invalid());
        }
        let date = parts.next().ok_or_else(invalid)?;
        let mut ymd = date.split('-');
        let year = parse_int(ymd.next(), s)?;
        let month = parse_int(ymd.next(), s)? as u32;
        let day = parse_int(ymd.next(), s)? as u32;
        if ymd.next().is_some() || month == 0 || day == 0 {
            return Err(invalid());
        }
        // Optional HH:MM:SS part; sub-hour origins are not supported.
        let hour = match parts.next() {
            None => 0,
            Some(clock) => {
                let field = clock.split(':').next().ok_or_else(invalid)?;
                field.parse::<u32>().map_err(|_| invalid())?
            }
        };

        Ok(TimeUnits {
            unit,
            origin: TrackTime::new(year as i32, month, day, hour),
        })
    }
}

impl fmt::Display for TimeUnits {
    /// Canonical CF rendering, e.g. `hours since 1950-01-01 00:00:00`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        };
        write!(
            f,
            "{unit} since {:04}-{:02}-{:02} {:02}:00:00",
            self.origin.year, self.origin.month, self.origin.day, self.origin.hour
        )
    }
}

fn parse_int(token: Option<&str>, units: &str) -> Result<i64, TrackError> {
    token
        .and_then(|t| t.parse::<i64>().ok())
        .ok_or_else(|| TrackError::InvalidTimeUnits(units.to_string()))
}

impl TimeUnits {
    /// Numeric axis value of `time` under `calendar` (the `date2num`
    /// direction).
    pub fn num_from_date(&self, calendar: Calendar, time: TrackTime) -> f64 {
        let hours = calendar.hours_between(self.origin, time);
        match self.unit {
            TimeUnit::Hours => hours as f64,
            TimeUnit::Days => hours as f64 / HOURS_PER_DAY as f64,
        }
    }

    /// Calendar date of a numeric axis value, rounded to the nearest whole
    /// hour (the resolution of tracked data).
    pub fn date_from_num(&self, calendar: Calendar, value: f64) -> TrackTime {
        let hours = match self.unit {
            TimeUnit::Hours => value,
            TimeUnit::Days => value * HOURS_PER_DAY as f64,
        };
        calendar.advance(self.origin, hours.round() as i64)
    }
}

/// The time axis the tracking was run against: an ordered list of absolute
/// time points (the first defines step 1) plus the calendar they follow.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSeries {
    pub times: Vec<TrackTime>,
    pub calendar: Calendar,
}

impl ReferenceSeries {
    pub fn new(times: Vec<TrackTime>, calendar: Calendar) -> Result<Self, TrackError> {
        if times.is_empty() {
            return Err(TrackError::EmptyReferenceSeries);
        }
        Ok(ReferenceSeries { times, calendar })
    }

    /// Build from a CF calendar name as found in file metadata.
    pub fn from_name(times: Vec<TrackTime>, calendar: &str) -> Result<Self, TrackError> {
        ReferenceSeries::new(times, Calendar::from_name(calendar)?)
    }

    /// Load the `time` axis of a gridded netCDF file, using its `units` and
    /// `calendar` attributes to decode the stored values. A missing
    /// `calendar` attribute defaults to `standard`, as CF prescribes.
    pub fn from_netcdf(path: &Utf8Path) -> Result<Self, TrackError> {
        debug!("loading reference time axis from {path}");
        let file = netcdf::open(path.as_std_path())?;
        let var = file
            .variable("time")
            .ok_or_else(|| TrackError::MissingTimeAxis(path.to_string()))?;

        let units: TimeUnits = attribute_string(&var, "units")
            .ok_or_else(|| TrackError::MissingTimeAxis(path.to_string()))?
            .parse()?;
        let calendar = match attribute_string(&var, "calendar") {
            Some(name) => Calendar::from_name(&name)?,
            None => Calendar::Standard,
        };

        let values: Vec<f64> = var.get_values(..)?;
        let times = values
            .iter()
            .map(|v| units.date_from_num(calendar, *v))
            .collect();
        ReferenceSeries::new(times, calendar)
    }

    /// First entry of the axis (step 1).
    pub fn origin(&self) -> TrackTime {
        self.times[0]
    }

    /// Integer step index of `time` for a tracking period of `period_hours`:
    /// `round(seconds_from_origin / (period_hours * 3600)) + 1`.
    pub fn step_index(&self, time: TrackTime, period_hours: i64) -> StepIndex {
        let hours = self.calendar.hours_between(self.origin(), time);
        (hours as f64 / period_hours as f64).round() as StepIndex + 1
    }
}

fn attribute_string(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
