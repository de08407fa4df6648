//! # tempest_tracks
//!
//! Post-processing for cyclone tracks produced by an external
//! detect-and-stitch tracking tool. The tracker emits line-oriented text
//! files of storm trajectories, indexed against the time axis of the data
//! it was run on; this crate turns those files into clean, deduplicated,
//! archivable track sets.
//!
//! ## Pipeline
//! -----------------
//! 1. **Parse** — [`track_reader::load_tracks`] reads a stitched track file
//!    through a caller-supplied [`track::ColumnMap`], resolving each
//!    point's timestamp to a step index on a [`reference::ReferenceSeries`]
//!    and repairing missed time steps with the
//!    [gap filler](gap_filling::fill_gap).
//! 2. **Deduplicate** — adjacent detection windows overlap, so the same
//!    storm can be stitched twice; [`overlap::match_track_files`] pairs the
//!    duplicated segments and [`rewriter::reconcile`] rewrites both raw
//!    files so each storm appears exactly once.
//! 3. **Archive** — [`archive::save_tracks_netcdf`] serializes the final
//!    track set to a CF-compatible netCDF file, and [`analysis`] provides
//!    census summaries.
//!
//! ## Calendars
//! -----------------
//! Climate model output rarely follows the civil calendar, so all date
//! arithmetic goes through [`calendar::Calendar`], which implements the CF
//! calendar set (`standard`, `proleptic_gregorian`, `julian`, `noleap`,
//! `all_leap`, `360_day`).
//!
//! ## Example
//! -----------------
//! ```no_run
//! use camino::Utf8Path;
//! use tempest_tracks::calendar::{Calendar, TrackTime};
//! use tempest_tracks::reference::ReferenceSeries;
//! use tempest_tracks::track::ColumnMap;
//! use tempest_tracks::track_reader::load_tracks;
//!
//! # fn run() -> Result<(), tempest_tracks::track_errors::TrackError> {
//! let reference = ReferenceSeries::new(
//!     vec![TrackTime::new(2014, 12, 21, 0)],
//!     Calendar::Standard,
//! )?;
//! let tracks = load_tracks(
//!     Utf8Path::new("tracks_20141221.txt"),
//!     &reference,
//!     6,
//!     &ColumnMap::legacy(),
//! )?;
//! println!("{} tracks", tracks.len());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod archive;
pub mod calendar;
pub mod constants;
pub mod gap_filling;
pub mod overlap;
pub mod reference;
pub mod rewriter;
pub mod track;
pub mod track_errors;
pub mod track_reader;

pub use crate::calendar::{Calendar, TrackTime};
pub use crate::overlap::{MatchDescriptor, MatchMethod};
pub use crate::reference::{ReferenceSeries, TimeUnits};
pub use crate::track::{ColumnMap, Track, TrackValue};
pub use crate::track_errors::TrackError;
