use crate::error::{MetricsError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// A month label as it appears in the data, classified by format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthKey {
    /// "YYYY-MM"
    YearMonth { year: i32, month: u32 },
    /// "Jan".."Dec", month is 1-based
    Abbreviation(u32),
    Unrecognized(String),
}

impl MonthKey {
    pub fn parse(key: &str) -> Self {
        if let Ok((year, month)) = parse_year_month(key) {
            return MonthKey::YearMonth { year, month };
        }
        match month_abbreviation_index(key) {
            Some(month) => MonthKey::Abbreviation(month),
            None => MonthKey::Unrecognized(key.to_string()),
        }
    }

    /// (format class, position within class). Unrecognized keys share one
    /// position so callers must break ties themselves.
    pub fn sort_rank(&self) -> (u8, i64) {
        match self {
            MonthKey::YearMonth { year, month } => (0, *year as i64 * 100 + *month as i64),
            MonthKey::Abbreviation(month) => (1, *month as i64),
            MonthKey::Unrecognized(_) => (2, 0),
        }
    }
}

/// Parses a strict "YYYY-MM" key into (year, month).
pub fn parse_year_month(key: &str) -> Result<(i32, u32)> {
    let key = key.trim();
    // chrono accepts single-digit months and signed years; keys must be zero-padded.
    if key.len() != 7 || key.as_bytes()[4] != b'-' {
        return Err(MetricsError::InvalidMonthKey(format!(
            "'{}' is not in YYYY-MM format",
            key
        )));
    }

    let date = NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").map_err(|_| {
        MetricsError::InvalidMonthKey(format!("'{}' is not a valid YYYY-MM month", key))
    })?;

    Ok((date.year(), date.month()))
}

/// 1-based month for a three-letter abbreviation, case-insensitive.
pub fn month_abbreviation_index(key: &str) -> Option<u32> {
    let key = key.trim();
    MONTH_ABBREVIATIONS
        .iter()
        .position(|abbr| abbr.eq_ignore_ascii_case(key))
        .map(|idx| idx as u32 + 1)
}

pub fn year_month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn short_month_key(date: NaiveDate) -> String {
    MONTH_ABBREVIATIONS[date.month0() as usize].to_string()
}

/// Rounds half up (toward positive infinity) at the given number of decimals.
/// Non-finite input rounds to 0.
pub fn round_half_up(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor + 0.5).floor() / factor
}

/// `numerator / denominator`, or 0 when the denominator is zero or the
/// quotient is not finite.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Percentage of `part` in `whole`, rounded half up to a whole number.
pub fn whole_percentage(part: u64, whole: u64) -> f64 {
    round_half_up(safe_ratio(part as f64, whole as f64) * 100.0, 0)
}

/// Accepts "YYYY-MM-DD", RFC 3339 timestamps, and "YYYY-MM-DD HH:MM:SS".
pub fn parse_invoice_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(timestamp.date());
        }
    }

    Err(MetricsError::DateError(format!(
        "Unrecognized invoice date '{}'. Expected YYYY-MM-DD or an RFC 3339 timestamp",
        raw
    )))
}
