//! Civil time <-> UTC conversion against a user's IANA zone.
//!
//! Every function takes the zone name explicitly; nothing here reads a
//! process-wide "current timezone".

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TzError {
    #[error("invalid date/time: {0}")]
    InvalidDateTimeFormat(String),
    #[error("unknown timezone: {0:?}")]
    UnknownTimezone(String),
}

pub fn parse_zone(name: &str) -> Result<Tz, TzError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TzError::UnknownTimezone(String::new()));
    }
    name.parse::<Tz>()
        .map_err(|_| TzError::UnknownTimezone(name.to_string()))
}

/// Fixed-width check: `9` in `shape` matches an ASCII digit, anything else itself.
/// chrono alone would also take `9:05` or `2024-1-5`.
fn has_shape(value: &str, shape: &str) -> bool {
    value.len() == shape.len()
        && value
            .bytes()
            .zip(shape.bytes())
            .all(|(c, s)| if s == b'9' { c.is_ascii_digit() } else { c == s })
}

fn parse_civil(date: &str, time: &str) -> Result<NaiveDateTime, TzError> {
    let (date, time) = (date.trim(), time.trim());
    let d = Some(date)
        .filter(|d| has_shape(d, "9999-99-99"))
        .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
        .ok_or_else(|| TzError::InvalidDateTimeFormat(format!("date {date:?} is not YYYY-MM-DD")))?;
    let t = Some(time)
        .filter(|t| has_shape(t, "99:99"))
        .and_then(|t| NaiveTime::parse_from_str(t, TIME_FORMAT).ok())
        .ok_or_else(|| TzError::InvalidDateTimeFormat(format!("time {time:?} is not HH:MM")))?;
    Ok(d.and_time(t))
}

fn localize(naive: &NaiveDateTime, zone: Tz) -> Result<DateTime<Utc>, TzError> {
    // Fall-back overlaps resolve to the earlier instant; spring-forward gaps have none.
    zone.from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            TzError::InvalidDateTimeFormat(format!("{naive} does not exist in {}", zone.name()))
        })
}

/// Interprets `date` (`YYYY-MM-DD`) and `time` (`HH:MM`) as wall-clock time in
/// `tz_name` and returns the matching UTC instant.
pub fn to_utc(date: &str, time: &str, tz_name: &str) -> Result<DateTime<Utc>, TzError> {
    let naive = parse_civil(date, time)?;
    let zone = parse_zone(tz_name)?;
    localize(&naive, zone)
}

/// Like [`to_utc`], but a missing or unknown zone treats the civil time as
/// already being UTC instead of failing.
pub fn to_utc_or_utc(date: &str, time: &str, tz_name: &str) -> Result<DateTime<Utc>, TzError> {
    match to_utc(date, time, tz_name) {
        Err(e @ TzError::UnknownTimezone(_)) => {
            warn!(error = %e, "falling back to UTC for civil time conversion");
            Ok(parse_civil(date, time)?.and_utc())
        }
        other => other,
    }
}

/// Civil `(date, time)` strings for `instant` as seen in `tz_name`.
pub fn from_utc(instant: DateTime<Utc>, tz_name: &str) -> Result<(String, String), TzError> {
    let zone = parse_zone(tz_name)?;
    let local = instant.with_timezone(&zone);
    Ok((
        local.format(DATE_FORMAT).to_string(),
        local.format(TIME_FORMAT).to_string(),
    ))
}

/// Display helper: same as [`from_utc`] with the UTC fallback applied.
pub fn from_utc_or_utc(instant: DateTime<Utc>, tz_name: &str) -> (String, String) {
    from_utc(instant, tz_name).unwrap_or_else(|_| {
        (
            instant.format(DATE_FORMAT).to_string(),
            instant.format(TIME_FORMAT).to_string(),
        )
    })
}
