//! Pure date and money derivations.
//!
//! Every function here is total: bad input degrades to `None`, zero, or an
//! unchanged value, never a panic or an error.

use chrono::{Datelike, NaiveDate};

use crate::schema::MoneyValue;

/// Strict `YYYY-MM-DD` parse; anything else is `None`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Calendar-month difference, ignoring day-of-month. Negative when `end`
/// precedes `start`.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

/// Term length in months, `None` when either date is missing.
pub fn duration_months(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<i32> {
    Some(months_between(start?, end?))
}

/// Whole months from `start` until `today`; 0 when `start` is missing or in
/// the future.
pub fn elapsed_months(start: Option<NaiveDate>, today: NaiveDate) -> i32 {
    match start {
        Some(start) => months_between(start, today).max(0),
        None => 0,
    }
}

/// Whole months from `today` until `end`; 0 when `end` is missing or already
/// elapsed.
pub fn remaining_months(end: Option<NaiveDate>, today: NaiveDate) -> i32 {
    match end {
        Some(end) => months_between(today, end).max(0),
        None => 0,
    }
}

/// Corrects upstream data-entry swaps: when both dates are present and start
/// follows end, the pair is swapped; otherwise it is returned unchanged.
pub fn order_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match (start, end) {
        (Some(s), Some(e)) if s > e => (end, start),
        _ => (start, end),
    }
}

/// Monthly profit accrual from an annual percentage rate, rounded to two
/// decimals; 0 when the rate is zero or not finite.
pub fn monthly_profit(balance: f64, annual_percent: f64) -> f64 {
    if annual_percent == 0.0 || !annual_percent.is_finite() || !balance.is_finite() {
        return 0.0;
    }
    round2(balance * annual_percent / 100.0 / 12.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current principal amount of a balance: the explicit credit sub-field when
/// present, else the absolute signed value, else 0.
pub fn extract_balance(balance: Option<&MoneyValue>) -> f64 {
    let Some(balance) = balance else {
        return 0.0;
    };
    match balance.credit {
        Some(credit) if credit.is_finite() => credit,
        _ => match balance.value {
            Some(value) if value.is_finite() => value.abs(),
            _ => 0.0,
        },
    }
}

/// Thousands-grouped, two-decimal rendering; non-finite input formats as
/// `"0.00"`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "0.00".to_string();
    }
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{:02}", if negative { "-" } else { "" }, grouped, frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_strict() {
        assert_eq!(parse_date("2023-06-15"), Some(d(2023, 6, 15)));
        assert_eq!(parse_date(" 2023-06-15 "), Some(d(2023, 6, 15)));
        assert_eq!(parse_date("15/06/2023"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2023-13-01"), None);
    }

    #[test]
    fn test_months_between_ignores_day() {
        assert_eq!(months_between(d(2023, 1, 31), d(2023, 2, 1)), 1);
        assert_eq!(months_between(d(2022, 11, 5), d(2023, 2, 5)), 3);
        assert_eq!(months_between(d(2023, 5, 1), d(2023, 2, 1)), -3);
    }

    #[test]
    fn test_elapsed_and_remaining_clamp_at_zero() {
        let today = d(2024, 6, 1);
        assert_eq!(elapsed_months(Some(d(2024, 1, 15)), today), 5);
        assert_eq!(elapsed_months(Some(d(2025, 1, 15)), today), 0);
        assert_eq!(elapsed_months(None, today), 0);
        assert_eq!(remaining_months(Some(d(2025, 6, 1)), today), 12);
        assert_eq!(remaining_months(Some(d(2023, 6, 1)), today), 0);
        assert_eq!(remaining_months(None, today), 0);
    }

    #[test]
    fn test_order_dates_swaps_only_reversed_pairs() {
        let (s, e) = order_dates(Some(d(2024, 5, 1)), Some(d(2023, 5, 1)));
        assert_eq!(s, Some(d(2023, 5, 1)));
        assert_eq!(e, Some(d(2024, 5, 1)));

        let (s, e) = order_dates(Some(d(2023, 5, 1)), Some(d(2024, 5, 1)));
        assert_eq!(s, Some(d(2023, 5, 1)));
        assert_eq!(e, Some(d(2024, 5, 1)));

        let (s, e) = order_dates(None, Some(d(2024, 5, 1)));
        assert_eq!(s, None);
        assert_eq!(e, Some(d(2024, 5, 1)));
    }

    #[test]
    fn test_monthly_profit() {
        assert!((monthly_profit(120000.0, 12.0) - 1000.0).abs() < f64::EPSILON);
        assert_eq!(monthly_profit(100.0, 0.0), 0.0);
        // 100000 * 10.5% / 12 = 875.00
        assert!((monthly_profit(100000.0, 10.5) - 875.0).abs() < f64::EPSILON);
        // Rounds to 2 decimals: 10000 * 7 / 100 / 12 = 58.333...
        assert!((monthly_profit(10000.0, 7.0) - 58.33).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extract_balance_prefers_credit() {
        let m = MoneyValue {
            value: Some(-500.0),
            debit: None,
            credit: Some(500.0),
        };
        assert_eq!(extract_balance(Some(&m)), 500.0);

        let m = MoneyValue {
            value: Some(-300.0),
            debit: None,
            credit: None,
        };
        assert_eq!(extract_balance(Some(&m)), 300.0);

        let m = MoneyValue {
            value: Some(f64::NAN),
            debit: None,
            credit: None,
        };
        assert_eq!(extract_balance(Some(&m)), 0.0);
        assert_eq!(extract_balance(None), 0.0);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "0.00");
        assert_eq!(format_currency(1234567.891), "1,234,567.89");
        assert_eq!(format_currency(999.9), "999.90");
        assert_eq!(format_currency(-1234.5), "-1,234.50");
        assert_eq!(format_currency(f64::NAN), "0.00");
    }
}
