//! Calendar dates as prediction values.
//!
//! A prediction is the Unix timestamp (seconds) of UTC midnight on the
//! predicted day.

use chrono::{DateTime, NaiveDate};

use crate::error::{ForecastError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse `YYYY-MM-DD` into the timestamp of that day's UTC midnight.
pub fn parse_date(text: &str) -> Result<u64> {
    let date = NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| ForecastError::InvalidDate(format!("{}: {}", text, e)))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ForecastError::InvalidDate(text.to_string()))?;

    let secs = midnight.and_utc().timestamp();
    u32::try_from(secs)
        .map(u64::from)
        .map_err(|_| ForecastError::InvalidDate(format!("{} is outside the 32-bit range", text)))
}

/// Format a timestamp as the `YYYY-MM-DD` of its UTC day.
pub fn format_date(timestamp: u64) -> Result<String> {
    let secs = i64::try_from(timestamp)
        .map_err(|_| ForecastError::InvalidDate(timestamp.to_string()))?;
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .ok_or_else(|| ForecastError::InvalidDate(timestamp.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_dates() {
        assert_eq!(parse_date("2023-01-01").unwrap(), 1672531200);
        assert_eq!(parse_date("2023-01-02").unwrap(), 1672617600);
        assert_eq!(format_date(1672617600).unwrap(), "2023-01-02");
        assert_eq!(format_date(0).unwrap(), "1970-01-01");
    }

    #[test]
    fn test_time_of_day_is_dropped() {
        assert_eq!(format_date(1672531200 + 86_399).unwrap(), "2023-01-01");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_date("2023-13-01").is_err());
        assert!(parse_date("01/02/2023").is_err());
        assert!(parse_date("1969-12-31").is_err());
        assert!(parse_date("2106-02-08").is_err());
    }

    proptest! {
        #[test]
        fn prop_days_survive_formatting(day in 0u64..49_710) {
            let ts = day * 86_400;
            let text = format_date(ts).unwrap();
            prop_assert_eq!(parse_date(&text).unwrap(), ts);
        }
    }
}
