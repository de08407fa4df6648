//! # Overlap matching between adjacent detection windows
//!
//! Adjacent detection-window files overlap in time, so one physical storm
//! can appear in both as independently stitched track segments. This module
//! decides whether two segments describe the same storm and classifies the
//! relationship so the [rewriter](crate::rewriter) can deduplicate the
//! underlying files.
//!
//! ## Matching
//! -----------------
//! Candidate pruning is temporal: two tracks can only match when their
//! timestamp ranges intersect ([`overlap_in_time`]). Timestamps are compared
//! as full calendar tuples, never as raw step indices, because the two files
//! are indexed against different reference series.
//!
//! The spatial criterion is exact grid-cell equality at every shared
//! timestamp — both files are expected to come from the same detection grid,
//! so no distance threshold is involved. For gridless column layouts the
//! fallback is bit-exact lon/lat equality. Both assumptions break down if
//! the files were produced on different grids; that reuse needs a distance
//! criterion this module deliberately does not invent.
//!
//! ## Classification
//! -----------------
//! With `early` the track that starts first and `late` the other:
//! - [`MatchMethod::Remove`] — `late` ends inside `early`'s range and
//!   contributes nothing new; its whole block is pure duplication.
//! - [`MatchMethod::Extend`] — `late` continues past `early`'s end and
//!   `early` led in before the shared window; only `late`'s trailing points
//!   are new.
//! - [`MatchMethod::ExtendOdd`] — as `Extend`, but the shared window starts
//!   at `early`'s very first point. Spliced identically; flagged because a
//!   missing lead-in usually means the window slicing clipped the storm.
//!
//! When several candidates overlap in time the first spatial match wins;
//! ambiguous multi-storm situations (splitting, merging) are not scored.

use std::fmt;

use itertools::Itertools;
use log::{debug, warn};

use crate::track::Track;

/// How a matched pair of track segments must be reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    /// The later segment is wholly contained in the earlier one.
    Remove,
    /// The later segment extends the earlier one past its end.
    Extend,
    /// Extension whose shared window starts at the earlier segment's first
    /// point (no independent lead-in).
    ExtendOdd,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchMethod::Remove => "remove",
            MatchMethod::Extend => "extend",
            MatchMethod::ExtendOdd => "extend_odd",
        })
    }
}

/// Spatial match between a reference track and one candidate.
///
/// `time_c` indexes the first point of `late` past `early`'s time range —
/// equivalently the number of leading `late` points duplicated by `early`
/// (all of them for [`MatchMethod::Remove`]). `time_p` indexes the first
/// shared timestamp within `early`, and `offset` carries the same value for
/// merge alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialOverlap {
    /// Index of the matched candidate within the candidate slice.
    pub candidate: usize,
    pub method: MatchMethod,
    pub time_c: usize,
    pub time_p: usize,
    pub offset: usize,
    /// Whether the reference track is the later of the pair.
    pub reference_is_late: bool,
}

/// Match between one track of the earlier file and one of the later file,
/// ready for file reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchDescriptor {
    /// Track index within the earlier file.
    pub early_index: usize,
    /// Track index within the later file.
    pub late_index: usize,
    pub method: MatchMethod,
    pub time_c: usize,
    pub time_p: usize,
    pub offset: usize,
}

/// Indices of the candidates whose point-time ranges intersect the
/// reference track's range.
///
/// Two tracks overlap in time iff each one's earliest timestamp is not
/// after the other's latest.
pub fn overlap_in_time(reference: &Track, candidates: &[Track]) -> Vec<usize> {
    let (Some(ref_first), Some(ref_last)) = (reference.first_time(), reference.last_time()) else {
        return Vec::new();
    };
    candidates
        .iter()
        .positions(|candidate| {
            matches!(
                (candidate.first_time(), candidate.last_time()),
                (Some(first), Some(last)) if first <= ref_last && ref_first <= last
            )
        })
        .collect()
}

/// Find the first candidate that describes the same storm as `reference`.
///
/// Candidates are pruned with [`overlap_in_time`], then evaluated in the
/// given order; the first whose every shared timestamp coincides spatially
/// with the reference wins. Returns `None` when no candidate matches.
pub fn overlap_in_space(reference: &Track, candidates: &[Track]) -> Option<SpatialOverlap> {
    for candidate_index in overlap_in_time(reference, candidates) {
        let candidate = &candidates[candidate_index];

        // The segment that starts first plays the `early` role.
        let reference_is_late = candidate.first_time() <= reference.first_time();
        let (early, late) = if reference_is_late {
            (candidate, reference)
        } else {
            (reference, candidate)
        };

        let Some(overlap) = shared_window(early, late) else {
            continue;
        };
        let Some(early_end) = early.last_time() else {
            continue;
        };
        let time_c = late
            .times
            .iter()
            .position(|t| *t > early_end)
            .unwrap_or(late.n_points());
        let time_p = overlap.first_shared_in_early;
        let method = if time_c == late.n_points() {
            MatchMethod::Remove
        } else if time_p == 0 {
            MatchMethod::ExtendOdd
        } else {
            MatchMethod::Extend
        };

        debug!(
            "storm match: candidate {candidate_index} {method} (time_c={time_c}, time_p={time_p})"
        );
        return Some(SpatialOverlap {
            candidate: candidate_index,
            method,
            time_c,
            time_p,
            offset: time_p,
            reference_is_late,
        });
    }
    None
}

struct SharedWindow {
    first_shared_in_early: usize,
}

/// Check that every timestamp present in both tracks coincides spatially,
/// returning the window bookkeeping, or `None` when the tracks disagree at
/// any shared point or share no timestamp at all.
fn shared_window(early: &Track, late: &Track) -> Option<SharedWindow> {
    let mut first_shared_in_early = None;
    for (late_idx, time) in late.times.iter().enumerate() {
        let Some(early_idx) = early.index_of_time(*time) else {
            continue;
        };
        if !same_location(early, early_idx, late, late_idx) {
            return None;
        }
        first_shared_in_early.get_or_insert(early_idx);
    }
    Some(SharedWindow {
        first_shared_in_early: first_shared_in_early?,
    })
}

/// Same storm location at one shared timestamp: exact grid-cell equality
/// when both tracks carry grid coordinates, bit-exact lon/lat otherwise.
fn same_location(early: &Track, early_idx: usize, late: &Track, late_idx: usize) -> bool {
    match (&early.grid_x, &early.grid_y, &late.grid_x, &late.grid_y) {
        (Some(egx), Some(egy), Some(lgx), Some(lgy)) => {
            egx[early_idx] == lgx[late_idx] && egy[early_idx] == lgy[late_idx]
        }
        _ => {
            early.lon[early_idx] == late.lon[late_idx]
                && early.lat[early_idx] == late.lat[late_idx]
        }
    }
}

/// Match every track of the later detection-window file against the earlier
/// file's tracks, producing the descriptors one reconciliation pass
/// consumes.
///
/// An earlier-file track is claimed by at most one match (first wins); a
/// pair whose early/late roles contradict the file order is skipped with a
/// warning, since block-level rewriting cannot splice in that direction.
pub fn match_track_files(early_tracks: &[Track], late_tracks: &[Track]) -> Vec<MatchDescriptor> {
    let mut matches: Vec<MatchDescriptor> = Vec::new();
    for (late_index, late) in late_tracks.iter().enumerate() {
        let Some(overlap) = overlap_in_space(late, early_tracks) else {
            continue;
        };
        if !overlap.reference_is_late {
            warn!(
                "track {late_index} of the later file starts before its earlier-file \
                 counterpart {}; skipping this pair",
                overlap.candidate
            );
            continue;
        }
        if matches
            .iter()
            .any(|m| m.early_index == overlap.candidate)
        {
            warn!(
                "earlier-file track {} already matched; skipping later-file track {late_index}",
                overlap.candidate
            );
            continue;
        }
        matches.push(MatchDescriptor {
            early_index: overlap.candidate,
            late_index,
            method: overlap.method,
            time_c: overlap.time_c,
            time_p: overlap.time_p,
            offset: overlap.offset,
        });
    }
    matches
}
