//! Display formatting for money and dates
//!
//! Amounts are held as integer cents (Kenya shillings, 2 decimal places).
//! Dates are printed in East Africa Time.

use crate::time::to_local;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Currency prefix used on every printed amount
pub const CURRENCY: &str = "KES";

/// Format cents as shillings with thousands separators
///
/// # Examples
///
/// ```
/// use kobu_common::format::format_kes;
///
/// assert_eq!(format_kes(123456789), "KES 1,234,567.89");
/// assert_eq!(format_kes(5), "KES 0.05");
/// assert_eq!(format_kes(-1200), "-KES 12.00");
/// ```
pub fn format_kes(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!(
        "{}{} {}.{:02}",
        sign,
        CURRENCY,
        group_thousands(abs / 100),
        abs % 100
    )
}

/// Format cents without the currency prefix (used in CSV exports)
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn group_thousands(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut groups = Vec::new();
    while n > 0 {
        groups.push(n % 1000);
        n /= 1000;
    }
    let mut out = groups.pop().map(|g| g.to_string()).unwrap_or_default();
    while let Some(g) = groups.pop() {
        out.push_str(&format!(",{:03}", g));
    }
    out
}

/// Parse a user-entered shilling amount into cents
///
/// Accepts an optional `KES`/`KSh` prefix, thousands separators and up to
/// two decimal places.
///
/// ```
/// use kobu_common::format::parse_kes;
///
/// assert_eq!(parse_kes("1,234.5").unwrap(), 123450);
/// assert_eq!(parse_kes("KES 1234.50").unwrap(), 123450);
/// assert_eq!(parse_kes("1234").unwrap(), 123400);
/// assert!(parse_kes("12.345").is_err());
/// ```
pub fn parse_kes(text: &str) -> Result<i64> {
    let invalid = || Error::InvalidInput(format!("Not a valid amount: {:?}", text));

    let mut s = text.trim();
    for prefix in ["KES", "KSh", "Ksh", "kes"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start();
            break;
        }
    }
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(invalid());
    }

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => frac.parse().map_err(|_| invalid())?,
    };
    let cents = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)?;

    Ok(if negative { -cents } else { cents })
}

/// Format a calendar date as `19 Oct 2026`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Format a UTC timestamp in East Africa Time as `19 Oct 2026 14:05`
pub fn format_datetime(ts: DateTime<Utc>) -> String {
    to_local(ts).format("%d %b %Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_kes_grouping() {
        assert_eq!(format_kes(0), "KES 0.00");
        assert_eq!(format_kes(99_999), "KES 999.99");
        assert_eq!(format_kes(100_000), "KES 1,000.00");
        assert_eq!(format_kes(100_000_000_00), "KES 100,000,000.00");
    }

    #[test]
    fn test_format_kes_handles_min_value() {
        // unsigned_abs avoids overflow on i64::MIN
        assert!(format_kes(i64::MIN).starts_with("-KES "));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(150_050), "1500.50");
        assert_eq!(format_amount(-7), "-0.07");
    }

    #[test]
    fn test_parse_kes_variants() {
        assert_eq!(parse_kes("KSh 2,500").unwrap(), 250_000);
        assert_eq!(parse_kes(".5").unwrap(), 50);
        assert_eq!(parse_kes("-10").unwrap(), -1000);
        assert_eq!(parse_kes("  0.01 ").unwrap(), 1);
    }

    #[test]
    fn test_parse_kes_rejects_garbage() {
        assert!(parse_kes("").is_err());
        assert!(parse_kes("KES").is_err());
        assert!(parse_kes("12a").is_err());
        assert!(parse_kes("1.2.3").is_err());
        assert!(parse_kes(".").is_err());
    }

    #[test]
    fn test_format_date() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 9).unwrap();
        assert_eq!(format_date(d), "09 Oct 2026");
    }

    #[test]
    fn test_format_datetime_uses_eat() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 19, 11, 5, 0).unwrap();
        assert_eq!(format_datetime(ts), "19 Oct 2026 14:05");
    }
}
