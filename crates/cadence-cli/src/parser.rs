use anyhow::{anyhow, Result};
use cadence_core::models::WeekdaySet;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_english::{parse_date_string, Dialect};

/// Accepts `YYYY-MM-DD` or an English phrase such as "tomorrow" or "next friday".
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(input, Local::now(), Dialect::Us)
        .map(|dt| dt.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Accepts `YYYY-MM-DD HH:MM`, a bare date (midnight) or an English phrase.
pub fn parse_datetime(input: &str) -> Result<NaiveDateTime> {
    let trimmed = input.trim();
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    parse_date_string(input, Local::now(), Dialect::Us)
        .map(|dt| dt.naive_local())
        .map_err(|e| anyhow!("Failed to parse due date '{}': {}", input, e))
}

/// Accepts 24-hour (`14:30`) and 12-hour (`2:30 pm`) times.
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let normalized = input.trim().to_uppercase();
    let formats = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];
    formats
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&normalized, format).ok())
        .ok_or_else(|| anyhow!("Failed to parse time '{}'", input))
}

pub fn parse_weekdays(input: &str) -> Result<WeekdaySet> {
    let days: WeekdaySet = input.parse()?;
    if days.is_empty() {
        return Err(anyhow!("No weekdays given in '{}'", input));
    }
    Ok(days)
}
