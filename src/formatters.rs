use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

pub(crate) fn now_iso() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Accepts RFC 3339 and the offset-less ISO form the backend emits
/// (treated as UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn plural(n: i64, one: &str, unit: &str) -> String {
    if n <= 1 {
        one.to_string()
    } else {
        format!("{n} {unit}")
    }
}

pub fn relative_time_from(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let future = delta.num_milliseconds() < 0;
    let seconds = (delta.num_milliseconds().abs() as f64) / 1000.0;
    let minutes = seconds / 60.0;
    let hours = minutes / 60.0;
    let days = hours / 24.0;

    let phrase = if seconds < 45.0 {
        "a few seconds".to_string()
    } else if seconds < 90.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        plural(minutes.round() as i64, "a minute", "minutes")
    } else if minutes < 90.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        plural(hours.round() as i64, "an hour", "hours")
    } else if hours < 36.0 {
        "a day".to_string()
    } else if days < 26.0 {
        plural(days.round() as i64, "a day", "days")
    } else if days < 45.0 {
        "a month".to_string()
    } else if days < 320.0 {
        plural((days / 30.4).round() as i64, "a month", "months")
    } else if days < 548.0 {
        "a year".to_string()
    } else {
        plural((days / 365.0).round() as i64, "a year", "years")
    };

    if future {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

pub fn relative_time(value: &str) -> String {
    parse_timestamp(value)
        .map(|then| relative_time_from(then, Utc::now()))
        .unwrap_or_else(|| "--".to_string())
}

pub(crate) fn short_time_in<Tz: TimeZone>(value: &str, tz: &Tz) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    parse_timestamp(value).map(|dt| dt.with_timezone(tz).format("%H:%M").to_string())
}

pub(crate) fn medium_date_in<Tz: TimeZone>(value: &str, tz: &Tz) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    parse_timestamp(value).map(|dt| dt.with_timezone(tz).format("%b %-d, %Y").to_string())
}

pub fn short_time(value: &str) -> String {
    short_time_in(value, &Local).unwrap_or_else(|| value.to_string())
}

pub fn medium_date(value: &str) -> String {
    medium_date_in(value, &Local).unwrap_or_else(|| value.to_string())
}
