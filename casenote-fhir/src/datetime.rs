//! Fixed-width `YYYYMMDD[HH[MM[SS]]]` timestamp reading.
//!
//! The reader never fails on content: a component that is not a number becomes
//! zero, and a string shorter than a full date yields `None`. No time zone is
//! applied; offsets and fractional seconds past the seconds digits are ignored.

use std::str::FromStr;

use casenote_core::{FhirDate, FhirDateTime};

const DATE_WIDTH: usize = 8;

/// Date part of a positional timestamp.
pub fn normalize_date(raw: &str) -> Option<FhirDate> {
    let raw = raw.trim();
    if raw.len() < DATE_WIDTH {
        return None;
    }
    Some(FhirDate::new(
        read(raw, 0, 4),
        read(raw, 4, 6),
        read(raw, 6, 8),
    ))
}

/// Date and time of a positional timestamp; missing time components are zero.
pub fn normalize_date_time(raw: &str) -> Option<FhirDateTime> {
    let date = normalize_date(raw)?;
    let raw = raw.trim();
    Some(FhirDateTime::new(
        date,
        read(raw, 8, 10),
        read(raw, 10, 12),
        read(raw, 12, 14),
    ))
}

fn read<T: FromStr + Default>(raw: &str, start: usize, end: usize) -> T {
    raw.get(start..end.min(raw.len()))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or_default()
}
