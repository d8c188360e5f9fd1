//! Unix timestamp <-> RFC 3339 conversion

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Inputs of this many digits or more are read as milliseconds
const MILLIS_DIGITS: usize = 13;

/// Unix seconds/millis become RFC 3339 UTC; RFC 3339 becomes Unix seconds
pub fn convert(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("empty input"));
    }

    let digits = input.strip_prefix('-').unwrap_or(input);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        let value: i64 = input.parse().context("timestamp out of range")?;
        let (datetime, format) = if digits.len() >= MILLIS_DIGITS {
            (DateTime::<Utc>::from_timestamp_millis(value), SecondsFormat::Millis)
        } else {
            (DateTime::<Utc>::from_timestamp(value, 0), SecondsFormat::Secs)
        };
        let datetime = datetime.ok_or_else(|| anyhow!("timestamp out of range"))?;
        return Ok(datetime.to_rfc3339_opts(format, true));
    }

    let parsed = DateTime::parse_from_rfc3339(input)
        .with_context(|| format!("'{}' is neither a Unix timestamp nor RFC 3339", input))?;
    Ok(parsed.timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_and_millis() {
        assert_eq!(convert("0").unwrap(), "1970-01-01T00:00:00Z");
        assert_eq!(convert("1700000000").unwrap(), "2023-11-14T22:13:20Z");
        assert_eq!(convert("1700000000123").unwrap(), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_rfc3339_to_seconds() {
        assert_eq!(convert("2023-11-14T22:13:20Z").unwrap(), "1700000000");
        assert_eq!(convert("2023-11-15T00:13:20+02:00").unwrap(), "1700000000");
        assert!(convert("yesterday").is_err());
    }
}
