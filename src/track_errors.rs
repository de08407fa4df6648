use thiserror::Error;

/// Error taxonomy for track loading, reconciliation and archival.
///
/// Parsing failures are deterministic: the caller is expected to abort the
/// wider tracking pipeline rather than skip the offending file, since a
/// silently dropped track removes a real storm from the climatology.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("malformed track file {path}:{line}: {reason}")]
    MalformedTrackFile {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("unsupported calendar: {0}")]
    InvalidCalendar(String),

    #[error("column map is missing required field: {0}")]
    MissingColumn(String),

    #[error("invalid time units string: {0}")]
    InvalidTimeUnits(String),

    #[error("profile variable '{field}' changed length: expected {expected}, found {found}")]
    ProfileLengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("reference series contains no time points")]
    EmptyReferenceSeries,

    #[error("no usable time axis in {0}")]
    MissingTimeAxis(String),

    #[error("unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("netCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
}

impl PartialEq for TrackError {
    fn eq(&self, other: &Self) -> bool {
        use TrackError::*;
        match (self, other) {
            (
                MalformedTrackFile {
                    path: p1,
                    line: l1,
                    reason: r1,
                },
                MalformedTrackFile {
                    path: p2,
                    line: l2,
                    reason: r2,
                },
            ) => p1 == p2 && l1 == l2 && r1 == r2,
            (InvalidCalendar(a), InvalidCalendar(b)) => a == b,
            (MissingColumn(a), MissingColumn(b)) => a == b,
            (InvalidTimeUnits(a), InvalidTimeUnits(b)) => a == b,
            (
                ProfileLengthMismatch {
                    field: f1,
                    expected: e1,
                    found: n1,
                },
                ProfileLengthMismatch {
                    field: f2,
                    expected: e2,
                    found: n2,
                },
            ) => f1 == f2 && e1 == e2 && n1 == n2,
            (EmptyReferenceSeries, EmptyReferenceSeries) => true,
            (MissingTimeAxis(a), MissingTimeAxis(b)) => a == b,

            // Not comparable beyond the variant itself.
            (Io(_), Io(_)) => true,
            (Netcdf(_), Netcdf(_)) => true,

            _ => false,
        }
    }
}
