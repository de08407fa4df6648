//! # Calendar-aware date arithmetic
//!
//! Climate-model output is indexed against one of several CF calendars, and
//! the supported set goes well beyond the civil calendar: fixed 360-day
//! years, years that never (or always) contain a leap day, pure Julian
//! years, and the mixed Julian/Gregorian calendar used by most reanalyses.
//! No general-purpose time crate expresses these, so the arithmetic lives
//! here.
//!
//! ## Overview
//! -----------------
//! - [`TrackTime`] — the `(year, month, day, hour)` timestamp attached to
//!   every track point. Ordered lexicographically, which matches
//!   chronological order within any single calendar.
//! - [`Calendar`] — one variant per supported calendar, resolved from its
//!   CF name through an immutable process-wide registry.
//! - [`Calendar::advance`] — the date/time exactly `period_hours` later,
//!   rolling month and year boundaries per the active calendar.
//! - [`Calendar::hours_between`] — signed hour difference between two
//!   timestamps, the primitive behind step-index computation.
//!
//! All functions are pure; the registry is read-only after startup and safe
//! to share across threads.
//!
//! ## Date algorithms
//! -----------------
//! Gregorian and Julian conversions use era-based day counts (146097-day and
//! 1461-day eras respectively), with the mixed `standard` calendar switching
//! from Julian to Gregorian rules at 1582-10-15, the same convention as
//! cftime. The fixed calendars (`360_day`, `noleap`, `all_leap`) reduce to
//! plain multiplications.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::constants::HOURS_PER_DAY;
use crate::track_errors::TrackError;

/// Calendar timestamp of one track point.
///
/// Lexicographic ordering equals chronological ordering, so these can be
/// compared directly when looking for overlap windows between tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl TrackTime {
    pub fn new(year: i32, month: u32, day: u32, hour: u32) -> Self {
        TrackTime {
            year,
            month,
            day,
            hour,
        }
    }
}

impl fmt::Display for TrackTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}Z",
            self.year, self.month, self.day, self.hour
        )
    }
}

/// Supported CF calendars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Calendar {
    /// Mixed Julian/Gregorian, switching at 1582-10-15 (`standard`,
    /// `gregorian`).
    Standard,
    /// Gregorian leap rules applied to all years (`proleptic_gregorian`).
    ProlepticGregorian,
    /// Leap year every fourth year (`julian`).
    Julian,
    /// No year contains a leap day (`noleap`, `365_day`).
    NoLeap,
    /// Every year contains a leap day (`all_leap`, `366_day`).
    AllLeap,
    /// Twelve 30-day months (`360_day`).
    Day360,
}

/// Immutable registry mapping CF calendar names to behaviours. Built once at
/// startup and read-only thereafter.
static CALENDARS: LazyLock<HashMap<&'static str, Calendar>> = LazyLock::new(|| {
    HashMap::from([
        ("standard", Calendar::Standard),
        ("gregorian", Calendar::Standard),
        ("proleptic_gregorian", Calendar::ProlepticGregorian),
        ("julian", Calendar::Julian),
        ("noleap", Calendar::NoLeap),
        ("365_day", Calendar::NoLeap),
        ("all_leap", Calendar::AllLeap),
        ("366_day", Calendar::AllLeap),
        ("360_day", Calendar::Day360),
    ])
});

const DAYS_PER_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Days elapsed before the start of each month in a 365-day year.
const CUMULATIVE_DAYS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// First day of the Gregorian reform in the mixed calendar.
const GREGORIAN_START: TrackTime = TrackTime {
    year: 1582,
    month: 10,
    day: 15,
    hour: 0,
};

fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

/// Era-based civil-date to day-count conversion for proleptic Gregorian
/// dates. Day zero is 0000-03-01; only differences matter here.
fn gregorian_days(year: i32, month: u32, day: u32) -> i64 {
    let y = year as i64 - if month <= 2 { 1 } else { 0 };
    let era = floor_div(y, 400);
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe
}

fn gregorian_date(days: i64) -> (i32, u32, u32) {
    let era = floor_div(days, 146097);
    let doe = days - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = y + if month <= 2 { 1 } else { 0 };
    (year as i32, month as u32, day as u32)
}

/// Julian-calendar analogue of [`gregorian_days`], built on 4-year eras.
fn julian_days(year: i32, month: u32, day: u32) -> i64 {
    let y = year as i64 - if month <= 2 { 1 } else { 0 };
    let era = floor_div(y, 4);
    let yoe = y - era * 4;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    era * 1461 + yoe * 365 + doy
}

fn julian_date(days: i64) -> (i32, u32, u32) {
    let era = floor_div(days, 1461);
    let doe = days - era * 1461;
    let yoe = (doe - doe / 1460) / 365;
    let y = yoe + era * 4;
    let doy = doe - 365 * yoe;
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = y + if month <= 2 { 1 } else { 0 };
    (year as i32, month as u32, day as u32)
}

/// Offset aligning the Julian day count onto the mixed-calendar day count so
/// that 1582-10-04 (Julian) is immediately followed by 1582-10-15
/// (Gregorian).
fn mixed_offset() -> i64 {
    gregorian_days(1582, 10, 15) - 1 - julian_days(1582, 10, 4)
}

impl Calendar {
    /// Resolve a CF calendar name (e.g. `"360_day"`, `"gregorian"`) against
    /// the static registry.
    ///
    /// Return
    /// ------
    /// * The matching [`Calendar`], or [`TrackError::InvalidCalendar`] for a
    ///   name outside the supported set.
    pub fn from_name(name: &str) -> Result<Self, TrackError> {
        CALENDARS
            .get(name.trim().to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| TrackError::InvalidCalendar(name.to_string()))
    }

    /// CF name of this calendar (the canonical alias).
    pub fn name(&self) -> &'static str {
        match self {
            Calendar::Standard => "standard",
            Calendar::ProlepticGregorian => "proleptic_gregorian",
            Calendar::Julian => "julian",
            Calendar::NoLeap => "noleap",
            Calendar::AllLeap => "all_leap",
            Calendar::Day360 => "360_day",
        }
    }

    pub fn is_leap_year(&self, year: i32) -> bool {
        match self {
            Calendar::NoLeap | Calendar::Day360 => false,
            Calendar::AllLeap => true,
            Calendar::Julian => year.rem_euclid(4) == 0,
            Calendar::ProlepticGregorian => gregorian_leap(year),
            // The reform year itself is handled by the day-count splice;
            // leap classification only matters for month lengths.
            Calendar::Standard => {
                if year < 1582 {
                    year.rem_euclid(4) == 0
                } else {
                    gregorian_leap(year)
                }
            }
        }
    }

    /// Number of days in `month` of `year` under this calendar.
    pub fn days_in_month(&self, year: i32, month: u32) -> u32 {
        match self {
            Calendar::Day360 => 30,
            _ => {
                if month == 2 && self.is_leap_year(year) {
                    29
                } else {
                    DAYS_PER_MONTH[(month - 1) as usize]
                }
            }
        }
    }

    /// Day count of a date from the calendar's internal epoch. Only
    /// differences between two values are meaningful.
    fn days_from_epoch(&self, year: i32, month: u32, day: u32) -> i64 {
        match self {
            Calendar::Day360 => year as i64 * 360 + (month as i64 - 1) * 30 + day as i64 - 1,
            Calendar::NoLeap => {
                year as i64 * 365 + CUMULATIVE_DAYS[(month - 1) as usize] + day as i64 - 1
            }
            Calendar::AllLeap => {
                let leap_shift = if month > 2 { 1 } else { 0 };
                year as i64 * 366 + CUMULATIVE_DAYS[(month - 1) as usize] + leap_shift + day as i64
                    - 1
            }
            Calendar::Julian => julian_days(year, month, day),
            Calendar::ProlepticGregorian => gregorian_days(year, month, day),
            Calendar::Standard => {
                let t = TrackTime::new(year, month, day, 0);
                if t >= GREGORIAN_START {
                    gregorian_days(year, month, day)
                } else {
                    julian_days(year, month, day) + mixed_offset()
                }
            }
        }
    }

    /// Inverse of [`Calendar::days_from_epoch`].
    fn date_from_epoch(&self, days: i64) -> (i32, u32, u32) {
        match self {
            Calendar::Day360 => {
                let year = floor_div(days, 360);
                let rem = days - year * 360;
                (year as i32, (rem / 30 + 1) as u32, (rem % 30 + 1) as u32)
            }
            Calendar::NoLeap => {
                let year = floor_div(days, 365);
                let mut rem = days - year * 365;
                let mut month = 12;
                for (i, cum) in CUMULATIVE_DAYS.iter().enumerate() {
                    if rem < *cum {
                        month = i;
                        break;
                    }
                }
                rem -= CUMULATIVE_DAYS[month - 1];
                (year as i32, month as u32, (rem + 1) as u32)
            }
            Calendar::AllLeap => {
                let year = floor_div(days, 366);
                let rem = days - year * 366;
                let mut month = 12;
                for m in 1..=12u32 {
                    let leap_shift = if m > 2 { 1 } else { 0 };
                    if rem < CUMULATIVE_DAYS[(m - 1) as usize] + leap_shift {
                        month = m as usize - 1;
                        break;
                    }
                }
                let leap_shift = if month > 2 { 1 } else { 0 };
                let day = rem - CUMULATIVE_DAYS[month - 1] - leap_shift + 1;
                (year as i32, month as u32, day as u32)
            }
            Calendar::Julian => julian_date(days),
            Calendar::ProlepticGregorian => gregorian_date(days),
            Calendar::Standard => {
                if days >= gregorian_days(1582, 10, 15) {
                    gregorian_date(days)
                } else {
                    julian_date(days - mixed_offset())
                }
            }
        }
    }

    /// Signed number of whole hours from `from` to `to`.
    pub fn hours_between(&self, from: TrackTime, to: TrackTime) -> i64 {
        let days = self.days_from_epoch(to.year, to.month, to.day)
            - self.days_from_epoch(from.year, from.month, from.day);
        days * HOURS_PER_DAY + to.hour as i64 - from.hour as i64
    }

    /// The date/time exactly `period_hours` after `time`, rolling month and
    /// year boundaries per this calendar (day 31 of a 30-day month rolls
    /// into the next month, 360-day February reaches day 30, and so on).
    pub fn advance(&self, time: TrackTime, period_hours: i64) -> TrackTime {
        let total_hours = time.hour as i64 + period_hours;
        let carry_days = floor_div(total_hours, HOURS_PER_DAY);
        let hour = total_hours.rem_euclid(HOURS_PER_DAY) as u32;
        let days = self.days_from_epoch(time.year, time.month, time.day) + carry_days;
        let (year, month, day) = self.date_from_epoch(days);
        TrackTime::new(year, month, day, hour)
    }
}

fn gregorian_leap(year: i32) -> bool {
    year.rem_euclid(4) == 0 && (year.rem_euclid(100) != 0 || year.rem_euclid(400) == 0)
}
