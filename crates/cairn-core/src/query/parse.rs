use crate::error::Error;
use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse a size filter such as `>100M`, `<=1G` or `=500K` into inclusive bounds.
///
/// Units are binary (K = 1024). `>` and `<` are exclusive, so they shift the
/// bound by one byte.
pub fn parse_size_filter(input: &str) -> Result<(Option<u64>, Option<u64>), Error> {
    let invalid = || {
        Error::InvalidFilter(format!(
            "invalid size format: {} (expected format: >100M, <1G, =500K)",
            input
        ))
    };

    let upper = input.trim().to_ascii_uppercase();
    let operator_len = upper
        .find(|c: char| !matches!(c, '>' | '<' | '='))
        .unwrap_or(upper.len());
    let (operator, rest) = upper.split_at(operator_len);
    let rest = rest.trim();

    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, unit) = rest.split_at(number_len);
    let value: f64 = number.parse().map_err(|_| invalid())?;

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1 << 10,
        "M" | "MB" => 1 << 20,
        "G" | "GB" => 1 << 30,
        "T" | "TB" => 1 << 40,
        _ => return Err(invalid()),
    };
    let bytes = (value * multiplier as f64) as u64;

    match operator {
        ">" => Ok((Some(bytes.saturating_add(1)), None)),
        ">=" => Ok((Some(bytes), None)),
        "<" => Ok((None, Some(bytes.saturating_sub(1)))),
        "<=" => Ok((None, Some(bytes))),
        "=" => Ok((Some(bytes), Some(bytes))),
        "" => Err(invalid()),
        other => Err(Error::InvalidFilter(format!("invalid operator: {}", other))),
    }
}

/// Parse an absolute or relative date against the current time.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, Error> {
    parse_date_at(input, Utc::now())
}

/// Parse `today`, `yesterday`, `N days|weeks|months|years ago`, `YYYY-MM-DD`,
/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` (UTC), relative to `now`.
pub fn parse_date_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();

    match lower.as_str() {
        "today" => return Ok(now),
        "yesterday" => return days_before(now, 1, input),
        _ => {}
    }

    if let Some(relative) = parse_relative(&lower, now) {
        return relative.ok_or_else(|| unparseable(input));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(unparseable(input))
}

/// `Some(None)` means the phrase was relative but the result is out of range.
fn parse_relative(lower: &str, now: DateTime<Utc>) -> Option<Option<DateTime<Utc>>> {
    let words: Vec<&str> = lower.split_whitespace().collect();
    let [count, unit, "ago"] = words.as_slice() else {
        return None;
    };
    let count: u32 = count.parse().ok()?;

    let result = match *unit {
        "day" | "days" => now.checked_sub_days(Days::new(count.into())),
        "week" | "weeks" => now.checked_sub_days(Days::new(u64::from(count) * 7)),
        "month" | "months" => now.checked_sub_months(Months::new(count)),
        "year" | "years" => count
            .checked_mul(12)
            .and_then(|months| now.checked_sub_months(Months::new(months))),
        _ => return None,
    };
    Some(result)
}

fn days_before(now: DateTime<Utc>, days: u64, input: &str) -> Result<DateTime<Utc>, Error> {
    now.checked_sub_days(Days::new(days))
        .ok_or_else(|| unparseable(input))
}

fn unparseable(input: &str) -> Error {
    Error::InvalidFilter(format!("unable to parse date: {}", input))
}
