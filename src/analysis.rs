//! # Track census helpers
//!
//! Small summaries over a loaded track set, used for run reports and for
//! sanity checks before archival.

use crate::track::Track;

/// Number of non-empty tracks in the set.
pub fn count_tracks(tracks: &[Track]) -> usize {
    tracks.iter().filter(|t| !t.is_empty()).count()
}

/// Hemisphere census `(southern, northern)` by genesis latitude: a track
/// belongs to the hemisphere of its first point, with the equator counted
/// as northern. Empty tracks are skipped.
pub fn count_hemispheric_tracks(tracks: &[Track]) -> (usize, usize) {
    let mut southern = 0;
    let mut northern = 0;
    for track in tracks {
        match track.lat.first() {
            Some(lat) if *lat < 0.0 => southern += 1,
            Some(_) => northern += 1,
            None => {}
        }
    }
    (southern, northern)
}
