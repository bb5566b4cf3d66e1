//! Time representation in nanoseconds.
//! Sync offsets may be negative, so a signed i64 is used throughout
//! rather than `std::time::Duration`.

/// Time in nanoseconds. Used both for positions (since the reference
/// clock's zero) and for offsets between clocks.
pub type Time = i64;

pub const NANOS_PER_SECOND: Time = 1_000_000_000;
pub const NANOS_PER_MILLI: Time = 1_000_000;

/// Time zero constant
pub const ZERO: Time = 0;

/// Convert seconds (f64) to nanoseconds
#[inline]
pub fn from_seconds(seconds: f64) -> Time {
    (seconds * NANOS_PER_SECOND as f64) as Time
}

/// Convert nanoseconds to seconds (f64)
#[inline]
pub fn to_seconds(nanos: Time) -> f64 {
    nanos as f64 / NANOS_PER_SECOND as f64
}

/// Convert milliseconds to nanoseconds
#[inline]
pub fn from_millis(millis: i64) -> Time {
    millis * NANOS_PER_MILLI
}

/// Convert nanoseconds to milliseconds
#[inline]
pub fn to_millis(nanos: Time) -> i64 {
    nanos / NANOS_PER_MILLI
}

/// Format a time as [-]HH:MM:SS.mmm for diagnostics
pub fn format_time(nanos: Time) -> String {
    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.abs();
    let total_seconds = abs / NANOS_PER_SECOND;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = to_millis(abs) % 1000;

    format!(
        "{}{:02}:{:02}:{:02}.{:03}",
        sign, hours, minutes, seconds, millis
    )
}
