/// Utility functions for timestamp formatting and rounding
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const API_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
const DISPLAY_DATETIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DISPLAY_CLOCK: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Format a UTC instant the way the telemetry API stores it
///
/// Produces `YYYY-MM-DDTHH:MM:SSZ`. The offset is normalised to UTC first so
/// the trailing `Z` is always truthful.
pub fn format_timestamp(dt: &OffsetDateTime) -> String {
    let utc = dt.to_offset(time::UtcOffset::UTC);
    utc.format(API_TIMESTAMP).unwrap_or_else(|_| utc.to_string())
}

/// Format a timestamp for the dashboard status line
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    dt.format(DISPLAY_DATETIME).unwrap_or_else(|_| dt.to_string())
}

/// HH:MM:SS, used in per-iteration log headers
pub fn format_clock(dt: &OffsetDateTime) -> String {
    dt.format(DISPLAY_CLOCK).unwrap_or_else(|_| dt.to_string())
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
