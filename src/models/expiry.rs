use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate};

const DAYS_PER_YEAR: f64 = 365.0;

/// Time to expiration in years: whole calendar days / 365.
/// Counts dates, not elapsed hours, so tomorrow's expiry is 1/365 at any
/// time of day. Expired or same-day contracts are rejected rather than clamped.
pub fn years_to_expiration(expiration: NaiveDate, today: NaiveDate) -> AppResult<f64> {
    let days = (expiration - today).num_days();
    if days <= 0 {
        return Err(AppError::invalid(format!(
            "expiration date must be in the future: {expiration} (today {today})"
        )));
    }
    Ok(days as f64 / DAYS_PER_YEAR)
}

pub fn parse_expiration(s: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| AppError::invalid(format!("expiration {s:?}: {e}")))
}

/// Unix seconds at 00:00 UTC of `date`, the key the market-data API uses for expirations.
pub fn date_to_unix(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

pub fn unix_to_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_one_year_out() {
        let t = years_to_expiration(date(2027, 1, 15), date(2026, 1, 15)).unwrap();
        assert!((t - 1.0).abs() < 1e-12, "t={t}");
    }

    #[test]
    fn test_short_dated() {
        let t = years_to_expiration(date(2026, 10, 23), date(2026, 10, 16)).unwrap();
        assert!((t - 7.0 / 365.0).abs() < 1e-12);
    }

    #[test]
    fn test_next_day_counts_as_one_day() {
        let t = years_to_expiration(date(2026, 10, 17), date(2026, 10, 16)).unwrap();
        assert_eq!(t, 1.0 / 365.0);
    }

    #[test]
    fn test_past_and_same_day_rejected() {
        let today = date(2026, 10, 16);
        assert!(matches!(years_to_expiration(today, today), Err(AppError::InvalidInput(_))));
        assert!(years_to_expiration(date(2026, 9, 1), today).is_err());
    }

    #[test]
    fn test_parse_expiration() {
        assert_eq!(parse_expiration("2026-12-18").unwrap(), date(2026, 12, 18));
        assert!(parse_expiration("12/18/2026").is_err());
    }

    #[test]
    fn test_unix_conversion() {
        let d = date(2026, 12, 18);
        let ts = date_to_unix(d);
        assert_eq!(ts % 86_400, 0);
        assert_eq!(unix_to_date(ts), Some(d));
        // Provider timestamps are not always midnight
        assert_eq!(unix_to_date(ts + 3600 * 16), Some(d));
    }
}
