//! Calendar month bucket.

use core::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A calendar month, represented by its first day.
///
/// Serialized as an ISO date (`2023-12-01`) so it lines up with the month
/// timestamps stored next to it. Parsing accepts `YYYY-MM` or `YYYY-MM-DD`;
/// any day is truncated to the first of the month.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, DomainError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| DomainError::invalid_month(format!("{year}-{month:02}")))
    }

    /// Bucket a date into its month.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 of an existing month always exists.
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self::from_date(at.date())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// The month `n` months after this one (`n` may be negative).
    pub fn plus_months(&self, n: i32) -> Self {
        let index = self.index() + n;
        let year = index.div_euclid(12);
        let month = (index.rem_euclid(12) + 1) as u32;
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .unwrap_or(*self)
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: YearMonth) -> i32 {
        other.index() - self.index()
    }

    fn index(&self) -> i32 {
        self.year() * 12 + self.month() as i32 - 1
    }
}

impl core::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(value: NaiveDate) -> Self {
        Self::from_date(value)
    }
}

impl From<YearMonth> for NaiveDate {
    fn from(value: YearMonth) -> Self {
        value.0
    }
}

impl FromStr for YearMonth {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }
        NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| DomainError::invalid_month(format!("{s}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ym(y: i32, m: u32) -> YearMonth {
        YearMonth::new(y, m).unwrap()
    }

    #[test]
    fn truncates_dates_to_first_of_month() {
        let at = NaiveDate::from_ymd_opt(2023, 11, 27)
            .unwrap()
            .and_hms_opt(17, 45, 3)
            .unwrap();
        assert_eq!(YearMonth::from_datetime(at), ym(2023, 11));
        assert_eq!(YearMonth::from_datetime(at).to_string(), "2023-11-01");
    }

    #[test]
    fn parses_short_and_full_forms() {
        assert_eq!("2023-12".parse::<YearMonth>().unwrap(), ym(2023, 12));
        assert_eq!("2023-12-19".parse::<YearMonth>().unwrap(), ym(2023, 12));
        assert!("2023-13".parse::<YearMonth>().is_err());
        assert!("december".parse::<YearMonth>().is_err());
    }

    #[test]
    fn month_arithmetic_crosses_year_boundaries() {
        assert_eq!(ym(2023, 12).plus_months(1), ym(2024, 1));
        assert_eq!(ym(2024, 1).plus_months(-1), ym(2023, 12));
        assert_eq!(ym(2023, 3).plus_months(14), ym(2024, 5));
        assert_eq!(ym(2023, 11).months_until(ym(2024, 2)), 3);
        assert_eq!(ym(2024, 2).months_until(ym(2023, 11)), -3);
    }

    #[test]
    fn serde_uses_first_day_dates() {
        let json = serde_json::to_string(&ym(2023, 12)).unwrap();
        assert_eq!(json, "\"2023-12-01\"");
        let back: YearMonth = serde_json::from_str("\"2023-12-15\"").unwrap();
        assert_eq!(back, ym(2023, 12));
    }

    proptest! {
        #[test]
        fn plus_months_is_inverse_of_months_until(
            year in 1990i32..2100,
            month in 1u32..=12,
            delta in -240i32..240,
        ) {
            let start = ym(year, month);
            let moved = start.plus_months(delta);
            prop_assert_eq!(start.months_until(moved), delta);
            prop_assert_eq!(moved.plus_months(-delta), start);
        }
    }
}
