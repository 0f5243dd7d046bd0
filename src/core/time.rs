// Time helpers - parsing of user-supplied timestamps and dates

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

/// `yyyy/mm/dd hh:mm[:ss] [tz]`, the format the event forms use
static EVENT_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(\d{4})[/-](\d{1,2})[/-](\d{1,2})[ T](\d{1,2}):(\d{2})(?::(\d{2}))?\s*(Z|UTC|GMT|[+-]\d{2}:?\d{2})?$",
    )
    .expect("event time pattern is valid")
});

pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse an event start/end time. Accepts RFC 3339 or `yyyy/mm/dd hh:mm tz`
/// where `tz` is `Z`, `UTC`, `GMT` or a `+hh:mm` offset; a missing zone means UTC.
pub fn parse_event_time(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    let caps = EVENT_TIME.captures(input)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let date = NaiveDate::from_ymd_opt(number(1)? as i32, number(2)?, number(3)?)?;
    let time = NaiveTime::from_hms_opt(number(4)?, number(5)?, number(6).unwrap_or(0))?;
    let offset = match caps.get(7).map(|m| m.as_str()) {
        None => FixedOffset::east_opt(0)?,
        Some(zone) => parse_offset(zone)?,
    };

    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let upper = zone.to_ascii_uppercase();
    if matches!(upper.as_str(), "Z" | "UTC" | "GMT") {
        return FixedOffset::east_opt(0);
    }
    let sign = if upper.starts_with('-') { -1 } else { 1 };
    let digits: String = upper[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse a start/end time field, naming the field in the error
pub fn require_event_time(input: &str, field: &str) -> AppResult<DateTime<Utc>> {
    parse_event_time(input)
        .ok_or_else(|| AppError::BadValues(format!("Could Not Parse {}", field)))
}

/// Birthdates are entered as `yyyy/mm/dd`; ISO `yyyy-mm-dd` is accepted too
pub fn parse_birthdate(input: &str) -> AppResult<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d"))
        .map_err(|_| AppError::BadValues(format!("Could not parse birthdate '{}'", input)))
}
